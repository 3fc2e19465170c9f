//! Row-at-a-time access to an in-process SQLite engine.
//!
//! A [`Driver`] opens [`Connection`]s, either empty or from serialized images held in a
//! [`SourceRegistry`]. Statements are stepped one row at a time through a [`RowCursor`];
//! every call into the engine goes through [`foreign::capture`], which turns whatever the
//! engine throws into a [`DriverError`].
//!
//! ```rust
//! use sqlite_stepper::prelude::*;
//!
//! # fn main() -> Result<(), DriverError> {
//! let driver = Driver::default();
//! let conn = driver.open("")?;
//! conn.run("CREATE TABLE test (id INTEGER, name TEXT); INSERT INTO test VALUES (1, 'Bob');")?;
//!
//! let mut rows = conn.query("SELECT name FROM test WHERE id = ?", &BindParams::positional(vec![RowValues::Int(1)]))?;
//! assert_eq!(rows.columns()?, vec!["name".to_string()]);
//! let row = rows.next_row()?.expect("one row");
//! assert_eq!(row.get("name").and_then(RowValues::as_text), Some("Bob"));
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod connection;
pub mod cursor;
pub mod driver;
pub mod error;
pub mod foreign;
mod params;
pub mod prelude;
pub mod registry;
pub mod results;
pub mod statement;
pub mod types;

pub use config::{DriverOptions, DriverOptionsBuilder, Source};
pub use connection::Connection;
pub use cursor::{CursorState, RowCursor};
pub use driver::Driver;
pub use error::DriverError;
pub use registry::SourceRegistry;
pub use results::{ExecResult, ResultSet, Row};
pub use statement::Statement;
pub use types::{Advance, BindParams, PlaceholderStyle, RowValues};
