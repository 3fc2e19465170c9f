use thiserror::Error;

use crate::foreign::ForeignError;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("prepare error: {0}")]
    PrepareError(ForeignError),

    #[error("bind error: {0}")]
    BindError(ForeignError),

    #[error("step error: {0}")]
    StepError(ForeignError),

    #[error("fetch error: {0}")]
    FetchError(ForeignError),

    #[error("cannot read column names; nothing to fetch")]
    NoRowsError,

    #[error("cursor is closed")]
    CursorClosedError,

    #[error("transactions not supported")]
    TransactionsUnsupportedError,

    #[error("source `{0}` does not exist; call register_source() first")]
    SourceNotFoundError(String),

    #[error("source `{0}` was already consumed by an earlier open")]
    SourceAlreadyConsumedError(String),

    #[error("source `{0}` already registered")]
    SourceAlreadyRegisteredError(String),

    #[error("close error: {0}")]
    CloseError(ForeignError),

    #[error("unknown foreign error: {0}")]
    UnknownForeignError(String),

    #[error("Parameter conversion error: {0}")]
    ParameterError(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl DriverError {
    /// Unknown exception shapes keep their own kind whatever phase saw them.
    fn classify(err: ForeignError, phase: fn(ForeignError) -> Self) -> Self {
        match err {
            ForeignError::Unknown(description) => Self::UnknownForeignError(description),
            other => phase(other),
        }
    }

    pub(crate) fn prepare(err: ForeignError) -> Self {
        Self::classify(err, Self::PrepareError)
    }

    pub(crate) fn bind(err: ForeignError) -> Self {
        Self::classify(err, Self::BindError)
    }

    pub(crate) fn step(err: ForeignError) -> Self {
        Self::classify(err, Self::StepError)
    }

    pub(crate) fn fetch(err: ForeignError) -> Self {
        Self::classify(err, Self::FetchError)
    }

    pub(crate) fn close(err: ForeignError) -> Self {
        Self::classify(err, Self::CloseError)
    }

    /// Failures of database-level calls (open, run, export) have no phase of their own.
    pub(crate) fn connection(err: ForeignError) -> Self {
        Self::classify(err, |e| Self::ConnectionError(e.to_string()))
    }

    pub(crate) fn closed() -> Self {
        Self::ConnectionError("database is closed".to_string())
    }

    /// The message the engine attached to this failure, if it came from the engine.
    #[must_use]
    pub fn engine_message(&self) -> Option<&str> {
        match self {
            Self::PrepareError(e)
            | Self::BindError(e)
            | Self::StepError(e)
            | Self::FetchError(e)
            | Self::CloseError(e) => Some(e.message()),
            _ => None,
        }
    }

    /// True for both an unknown source name and a source that was consumed already.
    #[must_use]
    pub fn is_source_not_found(&self) -> bool {
        matches!(
            self,
            Self::SourceNotFoundError(_) | Self::SourceAlreadyConsumedError(_)
        )
    }
}
