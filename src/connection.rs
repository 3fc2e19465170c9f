use std::cell::RefCell;
use std::convert::Infallible;
use std::fmt;
use std::rc::Rc;

use crate::cursor::RowCursor;
use crate::error::DriverError;
use crate::foreign::{ForeignDatabase, capture};
use crate::params::convert_row;
use crate::results::{ExecResult, ResultSet};
use crate::statement::Statement;
use crate::types::BindParams;

type SharedEngine = Rc<RefCell<Box<dyn ForeignDatabase>>>;

/// One open database.
///
/// Statements prepared from a connection hold a weak link back to it. Closing the
/// connection frees every statement the engine still knows about; statement calls after
/// that fail.
pub struct Connection {
    engine: Option<SharedEngine>,
}

impl Connection {
    pub(crate) fn new(db: Box<dyn ForeignDatabase>) -> Self {
        Self {
            engine: Some(Rc::new(RefCell::new(db))),
        }
    }

    fn engine(&self) -> Result<&SharedEngine, DriverError> {
        self.engine.as_ref().ok_or_else(DriverError::closed)
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.engine.is_none()
    }

    /// Compile `sql` into a statement.
    ///
    /// # Errors
    /// `PrepareError` carrying the engine's message, e.g. `near "an": syntax error`.
    pub fn prepare(&self, sql: &str) -> Result<Statement, DriverError> {
        Statement::prepare(self.engine()?, sql)
    }

    /// Prepare, bind and run one statement for its side effects.
    ///
    /// # Errors
    /// Any prepare, bind or step failure.
    pub fn exec(&self, sql: &str, params: &BindParams) -> Result<ExecResult, DriverError> {
        let mut stmt = self.prepare(sql)?;
        let result = stmt.exec(params);
        let closed = stmt.close();
        let result = result?;
        closed?;
        Ok(result)
    }

    /// Prepare and bind one statement, returning a cursor that owns it.
    ///
    /// # Errors
    /// Any prepare or bind failure.
    pub fn query(&self, sql: &str, params: &BindParams) -> Result<RowCursor<'static>, DriverError> {
        let mut stmt = self.prepare(sql)?;
        stmt.bind(params)?;
        Ok(RowCursor::owned(stmt))
    }

    /// Transactions are not available on this engine.
    ///
    /// # Errors
    /// Always `TransactionsUnsupportedError`, whether or not the connection is open.
    pub fn begin(&self) -> Result<Infallible, DriverError> {
        Err(DriverError::TransactionsUnsupportedError)
    }

    /// Run every `;`-separated statement in `sql`, discarding rows.
    ///
    /// # Errors
    /// `StepError` for the first statement that fails; earlier ones stay applied.
    pub fn run(&self, sql: &str) -> Result<(), DriverError> {
        let engine = self.engine()?;
        capture("run", || engine.borrow_mut().run(sql, None)).map_err(DriverError::step)
    }

    /// Run every statement in `sql`, returning the rows of each statement that produced any.
    ///
    /// # Errors
    /// `StepError` for the first statement that fails.
    pub fn exec_batch(&self, sql: &str) -> Result<Vec<ResultSet>, DriverError> {
        let engine = self.engine()?;
        let results =
            capture("exec", || engine.borrow_mut().exec(sql)).map_err(DriverError::step)?;
        Ok(results
            .into_iter()
            .map(|result| {
                let mut set = ResultSet::new(result.columns);
                for values in result.values {
                    set.add_row_values(convert_row(values));
                }
                set
            })
            .collect())
    }

    /// Serialize the whole database to an image that can be registered and opened again.
    ///
    /// # Errors
    /// `ConnectionError` when the engine cannot serialize.
    pub fn export(&self) -> Result<Vec<u8>, DriverError> {
        let engine = self.engine()?;
        capture("export", || engine.borrow_mut().export()).map_err(DriverError::connection)
    }

    /// Rows changed by the most recent write.
    ///
    /// # Errors
    /// `ConnectionError` on a closed connection.
    pub fn rows_modified(&self) -> Result<u64, DriverError> {
        let engine = self.engine()?;
        let count = capture("getRowsModified", || engine.borrow().rows_modified())
            .map_err(DriverError::connection)?;
        u64::try_from(count)
            .map_err(|_| DriverError::ConnectionError(format!("negative row count {count}")))
    }

    /// Close the database. Closing twice is a no-op.
    ///
    /// # Errors
    /// `CloseError` when the engine fails to close.
    pub fn close(&mut self) -> Result<(), DriverError> {
        let Some(engine) = self.engine.take() else {
            return Ok(());
        };
        let result = capture("close", || engine.borrow_mut().close()).map_err(DriverError::close);
        tracing::info!(ok = result.is_ok(), "closed database");
        result
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            tracing::warn!(error = %err, "failed to close database on drop");
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("closed", &self.engine.is_none())
            .finish()
    }
}
