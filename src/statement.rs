use std::cell::RefCell;
use std::fmt;
use std::rc::Weak;
use std::sync::Arc;

use crate::cursor::RowCursor;
use crate::error::DriverError;
use crate::foreign::{ForeignDatabase, ForeignError, ForeignStatement, capture};
use crate::params::{convert_params, convert_row};
use crate::results::{ExecResult, Row};
use crate::types::{BindParams, PlaceholderStyle, RowValues};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Position {
    NotStarted,
    AtRow,
    Exhausted,
    /// A step or bind failed; the statement has to be prepared again.
    Failed,
}

/// A compiled query against one open database.
///
/// The statement keeps only a weak link to its database, used for engine-level helpers
/// such as [`Statement::rows_modified`]. Closing the connection invalidates the
/// statement; later calls fail instead of reaching freed engine state.
pub struct Statement {
    sql: String,
    inner: Option<Box<dyn ForeignStatement>>,
    engine: Weak<RefCell<Box<dyn ForeignDatabase>>>,
    style: PlaceholderStyle,
    parameter_count: usize,
    modifies_rows: bool,
    position: Position,
}

fn statement_closed() -> ForeignError {
    ForeignError::Runtime("Statement closed".to_string())
}

fn statement_failed() -> ForeignError {
    ForeignError::Runtime("statement failed earlier; prepare it again".to_string())
}

impl Statement {
    pub(crate) fn prepare(
        engine: &std::rc::Rc<RefCell<Box<dyn ForeignDatabase>>>,
        sql: &str,
    ) -> Result<Self, DriverError> {
        let mut inner = capture("prepare", || engine.borrow_mut().prepare(sql))
            .map_err(DriverError::prepare)?;
        let described = capture("parameter_names", || inner.parameter_names()).and_then(
            |names| capture("modifies_rows", || inner.modifies_rows()).map(|m| (names, m)),
        );
        let (names, modifies_rows) = match described {
            Ok(described) => described,
            Err(err) => {
                let _ = capture("free", || inner.free());
                return Err(DriverError::prepare(err));
            }
        };
        tracing::trace!(sql, parameters = names.len(), "prepared statement");
        Ok(Self {
            sql: sql.to_owned(),
            inner: Some(inner),
            engine: std::rc::Rc::downgrade(engine),
            style: PlaceholderStyle::from_parameter_names(&names),
            parameter_count: names.len(),
            modifies_rows,
            position: Position::NotStarted,
        })
    }

    /// The SQL text this statement was compiled from.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Number of placeholders the engine found in the SQL text.
    #[must_use]
    pub fn parameter_count(&self) -> usize {
        self.parameter_count
    }

    #[must_use]
    pub fn placeholder_style(&self) -> PlaceholderStyle {
        self.style
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_none()
    }

    fn live(
        &mut self,
        phase: fn(ForeignError) -> DriverError,
    ) -> Result<&mut Box<dyn ForeignStatement>, DriverError> {
        self.inner.as_mut().ok_or_else(|| phase(statement_closed()))
    }

    /// Replace the bound parameter set and rewind the statement.
    ///
    /// # Errors
    /// `ParameterError` when the set's kind does not match the statement's placeholders;
    /// `BindError` when the engine refuses the values (arity, unknown names), after which
    /// the statement is unusable.
    pub fn bind(&mut self, params: &BindParams) -> Result<(), DriverError> {
        if !self.style.accepts(params) {
            let kind = match params {
                BindParams::Positional(_) => "positional",
                BindParams::Named(_) => "named",
            };
            return Err(DriverError::ParameterError(format!(
                "{kind} parameters cannot be bound to a statement with {:?} placeholders",
                self.style
            )));
        }
        if self.position == Position::Failed {
            return Err(DriverError::BindError(statement_failed()));
        }
        let foreign = convert_params(params);
        let inner = self.live(DriverError::bind)?;
        match capture("bind", || inner.bind(&foreign)) {
            Ok(true) => {
                self.position = Position::NotStarted;
                Ok(())
            }
            Ok(false) => {
                self.position = Position::Failed;
                Err(DriverError::BindError(ForeignError::Runtime(
                    "Unknown error binding parameters".to_string(),
                )))
            }
            Err(err) => {
                self.position = Position::Failed;
                Err(DriverError::bind(err))
            }
        }
    }

    /// Advance to the next row. `Ok(false)` is the end of the rows and repeats on every
    /// later call without reaching the engine.
    ///
    /// # Errors
    /// `StepError` when the engine fails mid-execution; the statement is unusable after.
    pub fn step(&mut self) -> Result<bool, DriverError> {
        match self.position {
            Position::Exhausted => return Ok(false),
            Position::Failed => return Err(DriverError::StepError(statement_failed())),
            Position::NotStarted | Position::AtRow => {}
        }
        let inner = self.live(DriverError::step)?;
        let stepped = capture("step", || inner.step());
        tracing::trace!(sql = %self.sql, ?stepped, "step");
        match stepped {
            Ok(true) => {
                self.position = Position::AtRow;
                Ok(true)
            }
            Ok(false) => {
                self.position = Position::Exhausted;
                Ok(false)
            }
            Err(err) => {
                self.position = Position::Failed;
                Err(DriverError::step(err))
            }
        }
    }

    /// Values of the current row. Only valid right after [`Statement::step`] returned `true`.
    ///
    /// # Errors
    /// `FetchError` when the engine cannot produce the row.
    pub fn fetch(&mut self) -> Result<Vec<RowValues>, DriverError> {
        let inner = self.live(DriverError::fetch)?;
        capture("get", || inner.get())
            .map(convert_row)
            .map_err(DriverError::fetch)
    }

    /// Column names of the current row. Only valid once positioned at a row.
    ///
    /// # Errors
    /// `FetchError` when the engine cannot report the names.
    pub fn column_names(&mut self) -> Result<Vec<String>, DriverError> {
        let inner = self.live(DriverError::fetch)?;
        capture("getColumnNames", || inner.column_names()).map_err(DriverError::fetch)
    }

    /// The current row with its column names, as one [`Row`].
    ///
    /// # Errors
    /// `FetchError` when either the names or the values cannot be read.
    pub fn fetch_row(&mut self) -> Result<Row, DriverError> {
        let names = self.column_names()?;
        let values = self.fetch()?;
        Ok(Row::new(Arc::new(names), values))
    }

    /// Rewind to before the first row. Bound values stay bound.
    ///
    /// # Errors
    /// `StepError` when the engine throws while resetting.
    pub fn reset(&mut self) -> Result<(), DriverError> {
        let inner = self.live(DriverError::step)?;
        capture("reset", || inner.reset()).map_err(DriverError::step)?;
        // a failed statement stays failed
        if self.position != Position::Failed {
            self.position = Position::NotStarted;
        }
        Ok(())
    }

    /// Release the memory held by bound parameter values.
    ///
    /// # Errors
    /// `BindError` when the engine throws while clearing the bindings.
    pub fn free_bindings(&mut self) -> Result<(), DriverError> {
        let inner = self.live(DriverError::bind)?;
        capture("freemem", || inner.freemem()).map_err(DriverError::bind)
    }

    /// Bind `params` when given, step exactly once ignoring any row, then rewind.
    ///
    /// # Errors
    /// Any bind or step failure.
    pub fn run_once(&mut self, params: Option<&BindParams>) -> Result<(), DriverError> {
        match params {
            Some(params) => self.bind(params)?,
            None if self.position != Position::NotStarted => self.reset()?,
            None => {}
        }
        self.step()?;
        self.reset()
    }

    /// Run the statement for its side effects. Only INSERT, UPDATE and DELETE report a
    /// changed-row count; for anything else it is unavailable.
    ///
    /// # Errors
    /// Any bind or step failure.
    pub fn exec(&mut self, params: &BindParams) -> Result<ExecResult, DriverError> {
        self.run_once(Some(params))?;
        let affected = if self.modifies_rows {
            self.rows_modified()
        } else {
            None
        };
        Ok(ExecResult::new(affected))
    }

    /// Bind `params` and return a cursor over the rows. The statement stays owned by the
    /// caller; closing the cursor only rewinds it.
    ///
    /// # Errors
    /// Any bind failure.
    pub fn query(&mut self, params: &BindParams) -> Result<RowCursor<'_>, DriverError> {
        self.bind(params)?;
        Ok(RowCursor::borrowed(self))
    }

    /// Rows changed by the database's most recent write, if the database is still open.
    #[must_use]
    pub fn rows_modified(&self) -> Option<u64> {
        let engine = self.engine.upgrade()?;
        let count = capture("getRowsModified", || engine.borrow().rows_modified()).ok()?;
        u64::try_from(count).ok()
    }

    /// Free the engine statement. Closing twice is a no-op.
    ///
    /// # Errors
    /// `CloseError` when the engine fails to release the statement.
    pub fn close(&mut self) -> Result<(), DriverError> {
        let Some(mut inner) = self.inner.take() else {
            return Ok(());
        };
        match capture("free", || inner.free()) {
            Ok(true) => Ok(()),
            Ok(false) => Err(DriverError::CloseError(ForeignError::Runtime(
                "Error freeing statement memory".to_string(),
            ))),
            Err(err) => Err(DriverError::close(err)),
        }
    }
}

impl Drop for Statement {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(sql = %self.sql, error = %err, "failed to free statement on drop");
        }
    }
}

impl fmt::Debug for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statement")
            .field("sql", &self.sql)
            .field("style", &self.style)
            .field("position", &self.position)
            .field("closed", &self.inner.is_none())
            .finish()
    }
}
