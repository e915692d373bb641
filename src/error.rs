//! Application-wide error types.
//!
//! This module provides a unified error hierarchy for the application.
//! Subsystems use specific error types via `thiserror`
//! ([`ConfigError`](crate::config::ConfigError),
//! [`CatalogError`](crate::catalog::CatalogError), ...), while the CLI uses
//! `anyhow` for convenient error propagation.
//!
//! Per-release and per-track failures during a run are not errors at this
//! level: they are reported as outcomes by the
//! [`Downloader`](crate::download::Downloader) so siblings can continue.

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level application error.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Ledger database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Ledger schema migration error
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// Input that is not a recognisable release URL
    #[error("Not a release reference: {0}")]
    InvalidReference(String),

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Create an invalid reference error.
    pub fn invalid_reference(input: impl Into<String>) -> Self {
        Self::InvalidReference(input.into())
    }

    /// Add context to an error.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to Results.
pub trait ResultExt<T> {
    /// Add context to an error result.
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, sqlx::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Database(e).context(ctx))
    }
}
