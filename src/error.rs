//! Error types produced while loading, parsing, and rendering ElSql bundles.
//!
//! # Error Handling Strategy
//!
//! Every failure mode in this crate is fatal to the current parse or render
//! call: there are no partial results and nothing is retried. All of them are
//! collected into a single [`ElsqlError`] enum so callers can match on
//! `kind`-like variants with `?` rather than juggling several error types
//! across the loader, parser, and renderer.

use std::path::PathBuf;

/// Everything that can go wrong while loading, parsing, or rendering an
/// ElSql bundle.
#[derive(Debug, thiserror::Error)]
pub enum ElsqlError {
    /// The base `<type>.elsql` resource could not be found by the resource
    /// source.
    #[error("resource not found: {0}")]
    ResourceNotFound(String),

    /// An I/O error occurred while reading a resource.
    #[error("io error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The parser rejected a line of source text.
    #[error("parse error in resource {resource_index} at line {line}: {message}")]
    Parse {
        /// Index into the list of layered resources (0 = base, 1 = overlay, ...).
        resource_index: usize,
        /// 1-indexed line number within that resource.
        line: usize,
        message: String,
    },

    /// `get_sql` or `@INCLUDE` referenced a fragment name that does not
    /// exist in the bundle.
    #[error("unknown fragment: {0}")]
    UnknownFragment(String),

    /// `@VALUE`, `@LOOP`, or a `@INCLUDE(:var)` needed a parameter that the
    /// parameter source does not have.
    #[error("missing variable: {0}")]
    MissingVariable(String),

    /// A variable was present but had the wrong shape for its use (e.g.
    /// `@LOOP`'s count variable was not an integer).
    #[error("type error for variable {name}: {message}")]
    TypeError { name: String, message: String },

    /// An `@INCLUDE` chain referenced a fragment that was already being
    /// rendered higher up the same call stack.
    #[error("cyclic include detected: {0}")]
    CyclicInclude(String),
}

impl ElsqlError {
    pub(crate) fn parse(resource_index: usize, line: usize, message: impl Into<String>) -> Self {
        ElsqlError::Parse {
            resource_index,
            line,
            message: message.into(),
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ElsqlError>;
