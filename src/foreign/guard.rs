use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use super::{EngineException, ForeignError, RuntimeException, Thrown};

/// Run one engine call and normalize whatever it throws.
///
/// Engine and runtime exceptions keep their message; a panic carrying a string is a
/// runtime failure. Every other shape is reported as [`ForeignError::Unknown`] so it
/// can never be dropped on the floor.
///
/// # Errors
/// Returns the normalized [`ForeignError`] when the call throws or panics.
pub fn capture<T, F>(call: &'static str, f: F) -> Result<T, ForeignError>
where
    F: FnOnce() -> Result<T, Thrown>,
{
    let err = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(Ok(value)) => return Ok(value),
        Ok(Err(thrown)) => classify_thrown(thrown),
        Err(payload) => classify_panic(payload.as_ref()),
    };
    tracing::debug!(call, error = ?err, "foreign call failed");
    Err(err)
}

fn classify_thrown(thrown: Thrown) -> ForeignError {
    let thrown = match thrown.downcast::<EngineException>() {
        Ok(e) => {
            let EngineException { code, message } = *e;
            return ForeignError::Engine { code, message };
        }
        Err(other) => other,
    };
    match thrown.downcast::<RuntimeException>() {
        Ok(e) => ForeignError::Runtime((*e).0),
        Err(other) => ForeignError::Unknown(other.to_string()),
    }
}

fn classify_panic(payload: &(dyn Any + Send)) -> ForeignError {
    if let Some(message) = payload.downcast_ref::<&str>() {
        ForeignError::Runtime((*message).to_string())
    } else if let Some(message) = payload.downcast_ref::<String>() {
        ForeignError::Runtime(message.clone())
    } else {
        ForeignError::Unknown("engine panicked with a non-string payload".to_string())
    }
}
