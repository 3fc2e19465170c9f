use crate::error::DriverError;

/// Outcome of running a statement for its side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ExecResult {
    rows_affected: Option<u64>,
}

impl ExecResult {
    #[must_use]
    pub(crate) fn new(rows_affected: Option<u64>) -> Self {
        Self { rows_affected }
    }

    /// Rows changed by the statement.
    ///
    /// # Errors
    /// `Unimplemented` when the count could not be read, e.g. because the database was
    /// closed in between.
    pub fn rows_affected(&self) -> Result<u64, DriverError> {
        self.rows_affected
            .ok_or_else(|| DriverError::Unimplemented("RowsAffected not available".to_string()))
    }

    /// The engine does not report insert ids.
    ///
    /// # Errors
    /// Always `Unimplemented`.
    pub fn last_insert_id(&self) -> Result<i64, DriverError> {
        Err(DriverError::Unimplemented(
            "LastInsertId not available".to_string(),
        ))
    }
}
