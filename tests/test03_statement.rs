mod common;

use common::{FIXTURE, Script, ScriptedEngine, fixture_driver};
use sqlite_stepper::prelude::*;

#[test]
fn rebinding_restarts_from_the_first_row() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    let mut stmt = conn.prepare("SELECT name FROM test ORDER BY id")?;
    assert_eq!(stmt.parameter_count(), 0);
    assert_eq!(stmt.placeholder_style(), PlaceholderStyle::None);

    stmt.bind(&BindParams::none())?;
    assert!(stmt.step()?);
    assert_eq!(stmt.fetch()?, vec![RowValues::Text("Bob".into())]);
    assert!(stmt.step()?);
    assert_eq!(stmt.fetch()?, vec![RowValues::Text("Alice".into())]);

    stmt.bind(&BindParams::none())?;
    assert!(stmt.step()?);
    let row = stmt.fetch_row()?;
    assert_eq!(row.column_names.as_slice(), ["name".to_string()]);
    assert_eq!(row.get("name"), Some(&RowValues::Text("Bob".into())));
    Ok(())
}

#[test]
fn exhausted_statement_stays_exhausted_until_reset() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    let mut stmt = conn.prepare("SELECT id FROM test")?;

    assert!(stmt.step()?);
    assert!(stmt.step()?);
    assert!(!stmt.step()?);
    assert!(!stmt.step()?);
    assert!(!stmt.step()?);

    stmt.reset()?;
    assert!(stmt.step()?);
    Ok(())
}

#[test]
fn reset_keeps_bindings_until_freed() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    let mut stmt = conn.prepare("SELECT name FROM test WHERE id = ?")?;
    assert_eq!(stmt.parameter_count(), 1);

    stmt.bind(&BindParams::positional(vec![RowValues::Int(2)]))?;
    assert!(stmt.step()?);
    stmt.reset()?;
    assert!(stmt.step()?);
    assert_eq!(stmt.fetch()?, vec![RowValues::Text("Alice".into())]);

    stmt.reset()?;
    stmt.free_bindings()?;
    // unbound parameters are NULL
    assert!(!stmt.step()?);
    Ok(())
}

#[test]
fn exec_reports_rows_affected() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    let mut insert = conn.prepare("INSERT INTO test (id, name) VALUES (?, ?)")?;

    for (id, name) in [(3, "Carol"), (4, "Dan")] {
        let res = insert.exec(&BindParams::positional(vec![
            RowValues::Int(id),
            RowValues::Text(name.into()),
        ]))?;
        assert_eq!(res.rows_affected()?, 1);
        assert!(matches!(
            res.last_insert_id(),
            Err(DriverError::Unimplemented(_))
        ));
    }

    let res = conn.exec("UPDATE test SET name = upper(name)", &BindParams::none())?;
    assert_eq!(res.rows_affected()?, 4);
    assert_eq!(conn.rows_modified()?, 4);
    Ok(())
}

#[test]
fn exec_reports_no_count_for_schema_changes_or_queries() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    conn.exec("UPDATE test SET name = upper(name)", &BindParams::none())?;

    // the UPDATE's count must not leak into statements that change no rows
    for sql in [
        "CREATE TABLE other (y INTEGER)",
        "SELECT id FROM test",
        "PRAGMA user_version = 3",
    ] {
        let res = conn.exec(sql, &BindParams::none())?;
        assert!(
            matches!(res.rows_affected(), Err(DriverError::Unimplemented(_))),
            "{sql}"
        );
    }

    let res = conn.exec("DELETE FROM test WHERE id = 99", &BindParams::none())?;
    assert_eq!(res.rows_affected()?, 0);
    Ok(())
}

#[test]
fn run_once_rewinds_after_its_step() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    let mut stmt = conn.prepare("DELETE FROM test WHERE id = ?")?;

    stmt.run_once(Some(&BindParams::positional(vec![RowValues::Int(1)])))?;
    // same bindings, nothing left to delete
    stmt.run_once(None)?;
    assert_eq!(stmt.rows_modified(), Some(0));

    let rows = conn.exec_batch("SELECT name FROM test")?;
    assert_eq!(rows[0].values(), vec![vec![RowValues::Text("Alice".into())]]);
    Ok(())
}

#[test]
fn failed_step_poisons_the_statement() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    let mut stmt = conn.prepare("INSERT INTO test (id, name) VALUES (?, ?)")?;

    let err = stmt
        .exec(&BindParams::positional(vec![
            RowValues::Int(1),
            RowValues::Text("duplicate".into()),
        ]))
        .unwrap_err();
    assert!(matches!(err, DriverError::StepError(_)));
    assert!(err.engine_message().is_some_and(|m| m.contains("UNIQUE")));

    assert!(matches!(
        stmt.bind(&BindParams::positional(vec![
            RowValues::Int(9),
            RowValues::Text("fresh".into()),
        ])),
        Err(DriverError::BindError(_))
    ));
    assert!(matches!(stmt.step(), Err(DriverError::StepError(_))));
    stmt.close()?;
    Ok(())
}

#[test]
fn too_many_positional_values_fail_to_bind() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let conn = driver.open(FIXTURE)?;
    let mut stmt = conn.prepare("SELECT name FROM test WHERE id = ?")?;
    let err = stmt
        .bind(&BindParams::positional(vec![RowValues::Int(1), RowValues::Int(2)]))
        .unwrap_err();
    assert!(matches!(err, DriverError::BindError(_)));
    Ok(())
}

#[test]
fn client_types_round_trip_through_the_engine() -> Result<(), Box<dyn std::error::Error>> {
    let conn = Driver::default().open("")?;
    conn.run("CREATE TABLE t (flag INTEGER, at TEXT, doc TEXT, data BLOB, missing TEXT)")?;
    let at = chrono::NaiveDate::from_ymd_opt(2024, 5, 6)
        .and_then(|d| d.and_hms_opt(7, 8, 9))
        .expect("valid timestamp");
    conn.exec(
        "INSERT INTO t VALUES (?, ?, ?, ?, ?)",
        &BindParams::positional(vec![
            RowValues::Bool(true),
            RowValues::Timestamp(at),
            RowValues::JSON(serde_json::json!({"k": [1, 2]})),
            RowValues::Blob(vec![0, 1, 2]),
            RowValues::Null,
        ]),
    )?;

    let row = conn
        .query("SELECT * FROM t", &BindParams::none())?
        .next_row()?
        .expect("one row");
    assert_eq!(row.get("flag").and_then(RowValues::as_bool), Some(true));
    assert_eq!(row.get("at").and_then(RowValues::as_timestamp), Some(at));
    assert_eq!(
        row.get("doc").and_then(RowValues::as_text),
        Some("{\"k\":[1,2]}")
    );
    assert_eq!(row.get("data").and_then(RowValues::as_blob), Some(&[0_u8, 1, 2][..]));
    assert!(row.get("missing").is_some_and(RowValues::is_null));
    Ok(())
}

#[test]
fn prepare_close_cycles_release_statements() -> Result<(), Box<dyn std::error::Error>> {
    let driver = fixture_driver()?;
    let mut conn = driver.open(FIXTURE)?;
    for _ in 0..500 {
        let mut stmt = conn.prepare("SELECT id, name FROM test")?;
        stmt.close()?;
        stmt.close()?;
    }
    conn.close()?;

    let (driver, calls) = ScriptedEngine::driver(Script::counting(2));
    let conn = driver.open("")?;
    for i in 0..500 {
        let mut stmt = conn.prepare("SELECT n")?;
        if i % 2 == 0 {
            stmt.close()?;
            stmt.close()?;
        }
    }
    assert_eq!(calls.prepares.get(), 500);
    assert_eq!(calls.frees.get(), calls.prepares.get());
    Ok(())
}
