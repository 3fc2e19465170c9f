use std::fmt;

use serde::{Deserialize, Serialize};

use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::DriverError;

/// Where a new database comes from.
///
/// Serialized as its DSN: the empty string for an empty database, otherwise the name of
/// a registered source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Source {
    #[default]
    Empty,
    Registered(String),
}

impl Source {
    #[must_use]
    pub fn from_dsn(dsn: &str) -> Self {
        if dsn.is_empty() {
            Self::Empty
        } else {
            Self::Registered(dsn.to_string())
        }
    }
}

impl From<String> for Source {
    fn from(dsn: String) -> Self {
        if dsn.is_empty() {
            Self::Empty
        } else {
            Self::Registered(dsn)
        }
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        match source {
            Source::Empty => String::new(),
            Source::Registered(name) => name,
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Empty => f.write_str("<empty>"),
            Source::Registered(name) => f.write_str(name),
        }
    }
}

/// Options for opening a database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriverOptions {
    pub source: Source,
    /// Run `PRAGMA foreign_keys = ON` right after opening.
    pub foreign_keys: bool,
    /// Read the schema of a loaded image once, so a corrupt image fails at open.
    pub validate_image: bool,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            source: Source::Empty,
            foreign_keys: false,
            validate_image: true,
        }
    }
}

impl DriverOptions {
    #[must_use]
    pub fn new(source: Source) -> Self {
        Self {
            source,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_dsn(dsn: &str) -> Self {
        Self::new(Source::from_dsn(dsn))
    }

    /// Parse options from JSON; missing fields keep their defaults.
    ///
    /// # Errors
    /// `ConfigError` when the text is not valid options JSON.
    pub fn from_json(text: &str) -> Result<Self, DriverError> {
        serde_json::from_str(text)
            .map_err(|e| DriverError::ConfigError(format!("invalid driver options: {e}")))
    }
}

/// Fluent builder for [`DriverOptions`].
#[derive(Debug, Clone)]
pub struct DriverOptionsBuilder {
    opts: DriverOptions,
}

impl DriverOptionsBuilder {
    #[must_use]
    pub fn new(dsn: &str) -> Self {
        Self {
            opts: DriverOptions::from_dsn(dsn),
        }
    }

    #[must_use]
    pub fn source(mut self, source: Source) -> Self {
        self.opts.source = source;
        self
    }

    #[must_use]
    pub fn foreign_keys(mut self, foreign_keys: bool) -> Self {
        self.opts.foreign_keys = foreign_keys;
        self
    }

    #[must_use]
    pub fn validate_image(mut self, validate_image: bool) -> Self {
        self.opts.validate_image = validate_image;
        self
    }

    #[must_use]
    pub fn finish(self) -> DriverOptions {
        self.opts
    }

    /// Open a database with these options.
    ///
    /// # Errors
    /// See [`Driver::open_with`].
    pub fn open(self, driver: &Driver) -> Result<Connection, DriverError> {
        driver.open_with(&self.finish())
    }
}
