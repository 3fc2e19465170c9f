use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::DriverError;
use crate::results::{Row, build_index};
use crate::statement::Statement;
use crate::types::{Advance, RowValues};

/// Where a cursor stands relative to its statement's rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CursorState {
    /// Nothing stepped yet.
    Fresh,
    /// One row was stepped ahead to learn the column names and has not been handed out.
    Positioned,
    /// Rows are being handed out; the statement sits on the last one returned.
    Streaming,
    Exhausted,
    Closed,
}

enum Slot<'s> {
    Borrowed(&'s mut Statement),
    Owned(Statement),
}

impl Slot<'_> {
    fn get(&mut self) -> &mut Statement {
        match self {
            Slot::Borrowed(stmt) => stmt,
            Slot::Owned(stmt) => stmt,
        }
    }
}

#[derive(Debug, Clone)]
struct Columns {
    names: Arc<Vec<String>>,
    index: Arc<HashMap<String, usize>>,
}

/// Forward-only iteration over the rows of a bound statement.
///
/// Column names are only available from the engine once it is positioned at a row, so
/// asking for them before the first [`RowCursor::next_into`] steps one row ahead and keeps
/// it for the next call. The names are read from the engine at most once per cursor.
///
/// A cursor borrowed from [`Statement::query`] only rewinds the statement when closed. A
/// cursor from [`crate::Connection::query`] owns its statement and frees it on drop.
pub struct RowCursor<'s> {
    stmt: Slot<'s>,
    state: CursorState,
    columns: Option<Columns>,
}

impl<'s> RowCursor<'s> {
    pub(crate) fn borrowed(stmt: &'s mut Statement) -> Self {
        Self::new(Slot::Borrowed(stmt))
    }

    fn new(stmt: Slot<'s>) -> Self {
        Self {
            stmt,
            state: CursorState::Fresh,
            columns: None,
        }
    }

    #[must_use]
    pub fn state(&self) -> CursorState {
        self.state
    }

    /// Ordered column names of the result.
    ///
    /// # Errors
    /// `NoRowsError` when the query produced no rows before the names were learned;
    /// `StepError` or `FetchError` when stepping ahead fails, after which the cursor ends;
    /// `CursorClosedError` after [`RowCursor::close`].
    pub fn columns(&mut self) -> Result<Vec<String>, DriverError> {
        if let Some(columns) = &self.columns {
            return Ok(columns.names.to_vec());
        }
        match self.state {
            CursorState::Closed => return Err(DriverError::CursorClosedError),
            CursorState::Exhausted => return Err(DriverError::NoRowsError),
            CursorState::Fresh => {
                tracing::debug!("stepping ahead to read column names");
                if !self.step()? {
                    return Err(DriverError::NoRowsError);
                }
                self.state = CursorState::Positioned;
            }
            CursorState::Positioned | CursorState::Streaming => {}
        }
        let columns = self.resolve_columns()?;
        Ok(columns.names.to_vec())
    }

    /// Copy the next row into `dest`, replacing its contents.
    ///
    /// `Advance::EndOfRows` is returned once the rows run out and on every later call,
    /// including after [`RowCursor::close`].
    ///
    /// # Errors
    /// `StepError` or `FetchError` for the first failure; the cursor then reports end of rows.
    pub fn next_into(&mut self, dest: &mut Vec<RowValues>) -> Result<Advance, DriverError> {
        match self.state {
            CursorState::Closed | CursorState::Exhausted => return Ok(Advance::EndOfRows),
            CursorState::Positioned => {}
            CursorState::Fresh | CursorState::Streaming => {
                if !self.step()? {
                    return Ok(Advance::EndOfRows);
                }
            }
        }
        self.state = CursorState::Streaming;
        let resolved = self.resolve_columns().map(|_| ());
        let values = match resolved.and_then(|()| self.stmt.get().fetch()) {
            Ok(values) => values,
            Err(err) => {
                tracing::debug!(error = %err, "row fetch failed; cursor exhausted");
                self.state = CursorState::Exhausted;
                return Err(err);
            }
        };
        dest.clear();
        dest.extend(values);
        Ok(Advance::Row)
    }

    /// The next row with its column names, or `None` at the end.
    ///
    /// # Errors
    /// Same as [`RowCursor::next_into`].
    pub fn next_row(&mut self) -> Result<Option<Row>, DriverError> {
        let mut values = Vec::new();
        match self.next_into(&mut values)? {
            Advance::EndOfRows => Ok(None),
            Advance::Row => {
                // resolved by next_into before any row is handed out
                let columns = self.columns.clone().ok_or(DriverError::NoRowsError)?;
                Ok(Some(Row::with_index(columns.names, columns.index, values)))
            }
        }
    }

    /// Stop iterating and rewind the statement so it can be bound and queried again.
    /// Closing twice is a no-op.
    pub fn close(&mut self) {
        let previous = std::mem::replace(&mut self.state, CursorState::Closed);
        match previous {
            CursorState::Closed | CursorState::Fresh => {}
            CursorState::Positioned | CursorState::Streaming | CursorState::Exhausted => {
                if let Err(err) = self.stmt.get().reset() {
                    tracing::warn!(error = %err, "failed to reset statement on cursor close");
                }
            }
        }
        if previous != CursorState::Closed {
            tracing::debug!(?previous, "cursor closed");
        }
    }

    /// Step once, moving to `Exhausted` on the end of rows or on failure.
    fn step(&mut self) -> Result<bool, DriverError> {
        match self.stmt.get().step() {
            Ok(true) => Ok(true),
            Ok(false) => {
                tracing::debug!("cursor exhausted");
                self.state = CursorState::Exhausted;
                Ok(false)
            }
            Err(err) => {
                tracing::debug!(error = %err, "step failed; cursor exhausted");
                self.state = CursorState::Exhausted;
                Err(err)
            }
        }
    }

    fn resolve_columns(&mut self) -> Result<&Columns, DriverError> {
        if self.columns.is_none() {
            let names = match self.stmt.get().column_names() {
                Ok(names) => names,
                Err(err) => {
                    self.state = CursorState::Exhausted;
                    return Err(err);
                }
            };
            let index = Arc::new(build_index(&names));
            self.columns = Some(Columns {
                names: Arc::new(names),
                index,
            });
        }
        self.columns.as_ref().ok_or(DriverError::NoRowsError)
    }
}

impl RowCursor<'static> {
    pub(crate) fn owned(stmt: Statement) -> Self {
        Self::new(Slot::Owned(stmt))
    }
}

impl Iterator for RowCursor<'_> {
    type Item = Result<Row, DriverError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_row().transpose()
    }
}

impl Drop for RowCursor<'_> {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for RowCursor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RowCursor")
            .field("state", &self.state)
            .field("columns", &self.columns.as_ref().map(|c| &c.names))
            .field("owns_statement", &matches!(self.stmt, Slot::Owned(_)))
            .finish()
    }
}
