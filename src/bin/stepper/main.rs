mod args;
mod logging;

use std::error::Error;
use std::fs::{self, File};

use clap::Parser;
use serde_json::{Value, json};
use sqlite_stepper::prelude::*;
use tracing::Level;

use crate::args::Args;
use crate::logging::LogWriter;

const CLI_SOURCE: &str = "stepper-cli";

fn main() {
    let args = Args::parse();
    let writer = LogWriter::new(args.log.clone()).unwrap_or_else(|err| {
        eprintln!("failed to open log file: {err}");
        std::process::exit(1);
    });

    tracing_subscriber::fmt()
        .with_writer(writer)
        .with_target(false)
        .with_max_level(if args.verbose { Level::DEBUG } else { Level::WARN })
        .init();

    if let Err(err) = run(args) {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let mut options = match &args.config {
        Some(path) => DriverOptions::from_json(&fs::read_to_string(path)?)?,
        None => DriverOptions::default(),
    };
    options.foreign_keys |= args.foreign_keys;

    let driver = Driver::default();
    if let Some(path) = &args.db {
        driver
            .registry()
            .register_reader(CLI_SOURCE, File::open(path)?)?;
        options.source = Source::Registered(CLI_SOURCE.to_string());
    }
    let mut conn = driver.open_with(&options)?;

    for sql in &args.runs {
        conn.run(sql)?;
    }
    if let Some(sql) = &args.query {
        let output = query_json(&conn, sql, BindParams::positional(args.params.clone()))?;
        println!("{}", serde_json::to_string_pretty(&output)?);
    }
    if let Some(path) = &args.export {
        let image = conn.export()?;
        fs::write(path, &image)?;
        tracing::info!(path = %path.display(), bytes = image.len(), "exported database");
    }
    conn.close()?;
    Ok(())
}

fn query_json(conn: &Connection, sql: &str, params: BindParams) -> Result<Value, DriverError> {
    let mut cursor = conn.query(sql, &params)?;
    let columns = match cursor.columns() {
        Ok(columns) => columns,
        Err(DriverError::NoRowsError) => Vec::new(),
        Err(err) => return Err(err),
    };
    let mut rows = Vec::new();
    let mut values = Vec::new();
    while cursor.next_into(&mut values)? == Advance::Row {
        rows.push(Value::Array(values.iter().map(RowValues::to_json).collect()));
    }
    Ok(json!({ "columns": columns, "rows": rows }))
}
