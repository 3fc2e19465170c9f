// Foreign engine boundary.
//
// The engine is driven through two object-safe traits shaped like the engine's own
// API: a database that prepares/runs/exports and a statement that binds and steps one
// row at a time. Engine calls "throw" by returning a boxed error (or by unwinding);
// nothing outside `guard` is allowed to look at a `Thrown` value.
//
// - guard: converts thrown values and panics into `ForeignError`
// - sqlite: the SQLite engine

pub mod guard;
#[allow(unsafe_code)]
pub mod sqlite;

use thiserror::Error;

pub use guard::capture;
pub use sqlite::SqliteEngine;

/// Anything an engine call can throw.
pub type Thrown = Box<dyn std::error::Error + 'static>;

/// Failure reported by the engine itself: SQL syntax, constraints, range errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct EngineException {
    pub code: i32,
    pub message: String,
}

impl EngineException {
    #[must_use]
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

/// Failure of the host side around the engine: encoding, allocation, dead handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct RuntimeException(pub String);

/// A normalized foreign failure. Produced only by [`capture`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ForeignError {
    #[error("{message}")]
    Engine { code: i32, message: String },
    #[error("{0}")]
    Runtime(String),
    #[error("{0}")]
    Unknown(String),
}

impl ForeignError {
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::Engine { message, .. } => message,
            Self::Runtime(message) | Self::Unknown(message) => message,
        }
    }
}

/// Scalar values as the engine stores them.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

/// Parameters in the shape the engine binds them.
#[derive(Debug, Clone, PartialEq)]
pub enum ForeignParams {
    Positional(Vec<ForeignValue>),
    Named(Vec<(String, ForeignValue)>),
}

/// Rows produced by one statement of a multi-statement execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignResult {
    pub columns: Vec<String>,
    pub values: Vec<Vec<ForeignValue>>,
}

/// Creates engine database instances.
pub trait ForeignEngine {
    /// A new, empty database.
    fn create(&self) -> Result<Box<dyn ForeignDatabase>, Thrown>;

    /// A database initialised from a serialized image. The engine takes the bytes.
    fn load(&self, image: Vec<u8>) -> Result<Box<dyn ForeignDatabase>, Thrown>;
}

/// One live database instance.
pub trait ForeignDatabase {
    fn prepare(&mut self, sql: &str) -> Result<Box<dyn ForeignStatement>, Thrown>;

    /// Run `sql`; without params every `;`-separated statement runs, with params only one.
    fn run(&mut self, sql: &str, params: Option<&ForeignParams>) -> Result<(), Thrown>;

    /// Run every statement in `sql`, collecting the rows of the ones that return any.
    fn exec(&mut self, sql: &str) -> Result<Vec<ForeignResult>, Thrown>;

    /// Rows changed by the most recent INSERT, UPDATE or DELETE.
    fn rows_modified(&self) -> Result<i64, Thrown>;

    fn export(&mut self) -> Result<Vec<u8>, Thrown>;

    /// Close the database, freeing every statement it still owns.
    fn close(&mut self) -> Result<(), Thrown>;
}

/// One compiled statement.
pub trait ForeignStatement {
    /// Names of the declared parameters in index order; `None` for anonymous `?`.
    fn parameter_names(&self) -> Result<Vec<Option<String>>, Thrown>;

    /// Whether running the statement reports a changed-row count: INSERT, UPDATE,
    /// DELETE. Schema changes, pragmas and queries do not.
    fn modifies_rows(&self) -> Result<bool, Thrown>;

    /// Reset the statement and bind a new parameter set. `Ok(false)` means the engine
    /// refused without saying why.
    fn bind(&mut self, params: &ForeignParams) -> Result<bool, Thrown>;

    /// Advance one row. `Ok(false)` once the statement is done.
    fn step(&mut self) -> Result<bool, Thrown>;

    /// Values of the current row. Only meaningful after `step` returned `true`.
    fn get(&mut self) -> Result<Vec<ForeignValue>, Thrown>;

    /// Names of the result columns. Only meaningful after `step` returned `true`.
    fn column_names(&mut self) -> Result<Vec<String>, Thrown>;

    fn reset(&mut self) -> Result<(), Thrown>;

    /// Release memory held by bound parameters.
    fn freemem(&mut self) -> Result<(), Thrown>;

    fn free(&mut self) -> Result<bool, Thrown>;
}
