use std::fmt;

use crate::config::{DriverOptions, Source};
use crate::connection::Connection;
use crate::error::DriverError;
use crate::foreign::{ForeignEngine, SqliteEngine, capture};
use crate::registry::SourceRegistry;

/// Opens connections, either empty or from images in a [`SourceRegistry`].
pub struct Driver {
    registry: SourceRegistry,
    engine: Box<dyn ForeignEngine>,
}

impl Driver {
    /// A driver over the bundled SQLite engine.
    #[must_use]
    pub fn new(registry: SourceRegistry) -> Self {
        Self::with_engine(registry, SqliteEngine)
    }

    /// A driver over another engine implementation.
    #[must_use]
    pub fn with_engine(registry: SourceRegistry, engine: impl ForeignEngine + 'static) -> Self {
        Self {
            registry,
            engine: Box::new(engine),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SourceRegistry {
        &self.registry
    }

    /// Open the database named by `dsn`. The empty DSN opens a new, empty database; any
    /// other DSN must name a pending registered source, which this open consumes.
    ///
    /// # Errors
    /// `SourceNotFoundError` or `SourceAlreadyConsumedError` for an unusable name;
    /// `ConnectionError` when the engine cannot create or load the database.
    pub fn open(&self, dsn: &str) -> Result<Connection, DriverError> {
        self.open_with(&DriverOptions::from_dsn(dsn))
    }

    /// Open a database with explicit options.
    ///
    /// # Errors
    /// As [`Driver::open`], plus `ConnectionError` when the loaded image fails validation
    /// and `StepError` when enabling foreign keys fails.
    pub fn open_with(&self, options: &DriverOptions) -> Result<Connection, DriverError> {
        let db = match &options.source {
            Source::Empty => capture("create", || self.engine.create()),
            Source::Registered(name) => {
                let image = self.registry.consume_source(name)?;
                capture("load", move || self.engine.load(image))
            }
        }
        .map_err(DriverError::connection)?;
        let conn = Connection::new(db);

        if options.validate_image && options.source != Source::Empty {
            conn.exec_batch("SELECT count(*) FROM sqlite_master")
                .map_err(|e| {
                    DriverError::ConnectionError(format!(
                        "source `{}` is not a readable database: {e}",
                        options.source
                    ))
                })?;
        }
        if options.foreign_keys {
            conn.run("PRAGMA foreign_keys = ON")?;
        }
        tracing::info!(source = %options.source, "opened database");
        Ok(conn)
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new(SourceRegistry::new())
    }
}

impl fmt::Debug for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Driver")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
