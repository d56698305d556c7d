//! Crate-wide error types.
//!
//! Library modules raise specific error enums ([`crate::providers::ResolveError`],
//! [`crate::acquire::AcquireError`]); this module provides the top-level aggregate
//! that callers of the public API see.
//!
//! # Design
//!
//! - [`Error`]: top-level error enum, one variant per subsystem
//! - Module-specific errors convert in via `#[from]`
//! - [`ResultExt`] adds human context without losing the source chain

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error for the track-asset coordination core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Filesystem I/O (scratch directory, analysis file cache) failed.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The resolver chain exhausted every source for an asset.
    #[error("resolve error: {0}")]
    Resolve(#[from] crate::providers::ResolveError),

    /// The database/analysis acquisition path failed.
    #[error("acquire error: {0}")]
    Acquire(#[from] crate::acquire::AcquireError),

    /// A finder (or the acquirer) was asked to do something while not running.
    #[error("{0} is not running")]
    NotRunning(&'static str),

    /// Configuration could not be parsed or validated.
    #[error("configuration error: {0}")]
    Config(String),

    /// Generic error with added context, preserving the original source.
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Build a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Build a not-running state violation for the named component.
    pub fn not_running(component: &'static str) -> Self {
        Self::NotRunning(component)
    }

    /// Attach human-readable context to an error, keeping the chain intact.
    pub fn context(self, ctx: impl Into<String>) -> Self {
        Self::WithContext {
            context: ctx.into(),
            source: Box::new(self),
        }
    }
}

/// Extension trait for adding context to any `Result<T, Error>`.
pub trait ResultExt<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T>;
}

impl<T> ResultExt<T> for Result<T> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.context(ctx))
    }
}

impl<T> ResultExt<T> for std::result::Result<T, std::io::Error> {
    fn with_context(self, ctx: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::Io(e).context(ctx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_running_message_names_component() {
        let err = Error::not_running("album art finder");
        assert!(err.to_string().contains("album art finder"));
    }

    #[test]
    fn context_preserves_source_message() {
        let err = Error::config("bad retry_limit").context("loading config.toml");
        let msg = err.to_string();
        assert!(msg.contains("loading config.toml"));
        assert!(msg.contains("bad retry_limit"));
    }
}
