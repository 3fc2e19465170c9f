use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::rc::Rc;

use crate::error::DriverError;

#[derive(Debug, Default)]
struct Sources {
    pending: HashMap<String, Vec<u8>>,
    consumed: HashSet<String>,
}

/// Named database images waiting to be opened.
///
/// Each registration is single-use: the first open of a name takes the bytes and removes
/// the entry. Clones share the same entries.
///
/// ```rust
/// use sqlite_stepper::prelude::*;
///
/// let registry = SourceRegistry::new();
/// registry.register_source("fixture", Vec::new()).unwrap();
/// assert!(registry.is_pending("fixture"));
/// let image = registry.consume_source("fixture").unwrap();
/// assert!(image.is_empty());
/// assert!(registry.consume_source("fixture").unwrap_err().is_source_not_found());
/// ```
#[derive(Debug, Clone, Default)]
pub struct SourceRegistry {
    sources: Rc<RefCell<Sources>>,
}

impl SourceRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `image` under `name`. A consumed name may be registered again.
    ///
    /// # Errors
    /// `SourceAlreadyRegisteredError` while an earlier registration of `name` is still pending.
    pub fn register_source(
        &self,
        name: impl Into<String>,
        image: impl Into<Vec<u8>>,
    ) -> Result<(), DriverError> {
        let name = name.into();
        if name.is_empty() {
            return Err(DriverError::ConfigError(
                "source name must not be empty".to_string(),
            ));
        }
        let mut sources = self.sources.borrow_mut();
        if sources.pending.contains_key(&name) {
            return Err(DriverError::SourceAlreadyRegisteredError(name));
        }
        let image = image.into();
        tracing::debug!(source = %name, bytes = image.len(), "registered source");
        sources.consumed.remove(&name);
        sources.pending.insert(name, image);
        Ok(())
    }

    /// Read a whole image from `reader` and register it under `name`.
    ///
    /// # Errors
    /// `ConfigError` when reading fails, otherwise as [`SourceRegistry::register_source`].
    pub fn register_reader(
        &self,
        name: impl Into<String>,
        mut reader: impl Read,
    ) -> Result<(), DriverError> {
        let name = name.into();
        let mut image = Vec::new();
        reader.read_to_end(&mut image).map_err(|e| {
            DriverError::ConfigError(format!("failed to read source `{name}`: {e}"))
        })?;
        self.register_source(name, image)
    }

    /// Take the image registered under `name`, removing the entry.
    ///
    /// # Errors
    /// `SourceNotFoundError` for a name never registered, `SourceAlreadyConsumedError` for
    /// one an earlier open already took.
    pub fn consume_source(&self, name: &str) -> Result<Vec<u8>, DriverError> {
        let mut sources = self.sources.borrow_mut();
        if let Some(image) = sources.pending.remove(name) {
            sources.consumed.insert(name.to_string());
            return Ok(image);
        }
        if sources.consumed.contains(name) {
            Err(DriverError::SourceAlreadyConsumedError(name.to_string()))
        } else {
            Err(DriverError::SourceNotFoundError(name.to_string()))
        }
    }

    #[must_use]
    pub fn is_pending(&self, name: &str) -> bool {
        self.sources.borrow().pending.contains_key(name)
    }
}
