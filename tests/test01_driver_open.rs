mod common;

use common::{FIXTURE, fixture_driver};
use sqlite_stepper::prelude::*;

#[test]
fn empty_dsn_opens_an_empty_database() -> Result<(), Box<dyn std::error::Error>> {
    let driver = Driver::default();
    let conn = driver.open("")?;

    let mut cursor = conn.query("SELECT 1 AS foo", &BindParams::none())?;
    assert_eq!(cursor.columns()?, vec!["foo".to_string()]);
    let row = cursor.next_row()?.expect("one row");
    assert_eq!(row.get("foo"), Some(&RowValues::Int(1)));
    assert!(cursor.next_row()?.is_none());

    let tables = conn.exec_batch("SELECT name FROM sqlite_master")?;
    assert!(tables.is_empty());
    Ok(())
}

#[test]
fn prepare_reports_the_engine_message() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Driver::default().open("")?;
    let err = conn.prepare("an invalid statement").unwrap_err();
    assert!(matches!(err, DriverError::PrepareError(_)));
    assert_eq!(err.engine_message(), Some("near \"an\": syntax error"));
    Ok(())
}

#[test]
fn unknown_source_is_not_found() {
    let driver = Driver::default();
    let err = driver.open("missing.db").unwrap_err();
    assert!(matches!(err, DriverError::SourceNotFoundError(ref name) if name == "missing.db"));
    assert!(err.is_source_not_found());
}

#[test]
fn registered_source_opens_once() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    let rows = conn.exec_batch("SELECT count(*) AS n FROM test")?;
    assert_eq!(rows[0].values(), vec![vec![RowValues::Int(2)]]);

    let err = driver.open(FIXTURE).unwrap_err();
    assert!(matches!(err, DriverError::SourceAlreadyConsumedError(_)));
    assert!(err.is_source_not_found());
    Ok(())
}

#[test]
fn begin_always_fails() -> Result<(), Box<dyn std::error::Error>> {
    let mut conn = Driver::default().open("")?;
    assert!(matches!(
        conn.begin(),
        Err(DriverError::TransactionsUnsupportedError)
    ));
    conn.close()?;
    assert!(matches!(
        conn.begin(),
        Err(DriverError::TransactionsUnsupportedError)
    ));
    Ok(())
}

#[test]
fn close_is_idempotent_and_invalidates_statements() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let mut conn = driver.open(FIXTURE)?;
    let mut stmt = conn.prepare("SELECT name FROM test")?;

    conn.close()?;
    conn.close()?;
    assert!(conn.is_closed());

    let err = conn.prepare("SELECT 1").unwrap_err();
    assert!(matches!(err, DriverError::ConnectionError(ref msg) if msg == "database is closed"));
    assert!(stmt.step().is_err());
    assert_eq!(stmt.rows_modified(), None);
    // the engine already freed it
    stmt.close()?;
    stmt.close()?;
    Ok(())
}

#[test]
fn options_enable_foreign_keys() -> Result<(), Box<dyn std::error::Error>> {
    let driver = Driver::default();
    let conn = DriverOptionsBuilder::new("").foreign_keys(true).open(&driver)?;
    let rows = conn.exec_batch("PRAGMA foreign_keys")?;
    assert_eq!(rows[0].values(), vec![vec![RowValues::Int(1)]]);

    conn.run(
        "CREATE TABLE parent (id INTEGER PRIMARY KEY);
         CREATE TABLE child (parent_id INTEGER REFERENCES parent(id));",
    )?;
    let err = conn
        .exec(
            "INSERT INTO child (parent_id) VALUES (?)",
            &BindParams::positional(vec![RowValues::Int(7)]),
        )
        .unwrap_err();
    assert!(matches!(err, DriverError::StepError(_)));
    Ok(())
}

#[test]
fn unreadable_image_fails_validation() -> Result<(), Box<dyn std::error::Error>> {
    let driver = Driver::default();
    driver.registry().register_source("junk", vec![0x5a_u8; 4096])?;
    let err = driver.open("junk").unwrap_err();
    assert!(matches!(err, DriverError::ConnectionError(_)));

    driver.registry().register_source("junk", vec![0x5a_u8; 4096])?;
    let conn = DriverOptionsBuilder::new("junk")
        .validate_image(false)
        .open(&driver)?;
    assert!(conn.prepare("SELECT * FROM sqlite_master").is_err());
    Ok(())
}
