use std::path::PathBuf;

use clap::Parser;
use sqlite_stepper::RowValues;

#[derive(Parser, Debug)]
#[command(author, version, about = "Run SQL against an in-memory SQLite database, one row at a time")]
pub(crate) struct Args {
    /// Database image to load; an empty database is used when omitted
    #[arg(long)]
    pub(crate) db: Option<PathBuf>,
    /// JSON file with driver options
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,
    #[arg(long)]
    pub(crate) foreign_keys: bool,
    /// SQL run before the query; may be repeated
    #[arg(long = "run", value_name = "SQL")]
    pub(crate) runs: Vec<String>,
    /// Query whose rows are printed as JSON
    #[arg(long, value_name = "SQL")]
    pub(crate) query: Option<String>,
    /// Positional parameter for the query; may be repeated
    #[arg(long = "param", value_name = "VALUE", value_parser = parse_param)]
    pub(crate) params: Vec<RowValues>,
    /// Write the database image here after running
    #[arg(long)]
    pub(crate) export: Option<PathBuf>,
    /// Also write log lines to this file
    #[arg(long)]
    pub(crate) log: Option<PathBuf>,
    #[arg(short, long)]
    pub(crate) verbose: bool,
}

/// `null`, integers and finite floats keep their type; anything else is text.
pub(crate) fn parse_param(raw: &str) -> Result<RowValues, String> {
    if raw.eq_ignore_ascii_case("null") {
        return Ok(RowValues::Null);
    }
    if let Ok(i) = raw.parse::<i64>() {
        return Ok(RowValues::Int(i));
    }
    if let Ok(f) = raw.parse::<f64>()
        && f.is_finite()
    {
        return Ok(RowValues::Float(f));
    }
    Ok(RowValues::Text(raw.to_string()))
}
