//! Convenient imports for common functionality.
//!
//! ```rust
//! use sqlite_stepper::prelude::*;
//! ```

pub use crate::config::{DriverOptions, DriverOptionsBuilder, Source};
pub use crate::connection::Connection;
pub use crate::cursor::{CursorState, RowCursor};
pub use crate::driver::Driver;
pub use crate::error::DriverError;
pub use crate::registry::SourceRegistry;
pub use crate::results::{ExecResult, ResultSet, Row};
pub use crate::statement::Statement;
pub use crate::types::{Advance, BindParams, PlaceholderStyle, RowValues};
