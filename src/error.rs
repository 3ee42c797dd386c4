//! Error types for jarcell
//!
//! All modules use `JarcellResult<T>` as their return type.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for jarcell operations
pub type JarcellResult<T> = Result<T, JarcellError>;

/// All errors that can occur in jarcell
#[derive(Error, Debug)]
pub enum JarcellError {
    // Classpath resolution errors
    #[error("Cannot resolve {path} as a file URL: {reason}")]
    UrlConversion { path: PathBuf, reason: String },

    #[error("Failed to open classpath entry {path}: {source}")]
    EntryOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive {path}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    // Lookup errors
    #[error("Invalid class name: {name}")]
    InvalidClassName { name: String },

    #[error("Classpath source {path} is already released")]
    SourceReleased { path: PathBuf },

    // Lifecycle errors
    #[error("Resolver is closed")]
    ResolverClosed,

    #[error("Failed to release loading contexts: {0}")]
    Release(ReleaseReport),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl JarcellError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

/// A single classpath source that failed to release
#[derive(Debug, Clone)]
pub struct ReleaseFailure {
    /// Location of the source, as a URL string
    pub origin: String,

    /// Why the release failed
    pub reason: String,
}

/// Aggregated outcome of a shutdown that could not release every source.
///
/// Every held context is offered its release call before this report is
/// assembled; the report enumerates all failures, not just the first.
#[derive(Debug, Clone)]
pub struct ReleaseReport {
    /// One entry per source that failed to release
    pub failures: Vec<ReleaseFailure>,
}

impl fmt::Display for ReleaseReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} source(s) failed to release: ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{} ({})", failure.origin, failure.reason)?;
        }
        Ok(())
    }
}
