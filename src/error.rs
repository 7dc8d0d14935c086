//! Error taxonomy for the EOL/keyword substitution engine.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced at the boundary of the substitution engine.
///
/// `InvalidTemplate` is deliberately absent: a malformed keyword expansion
/// template code never fails, it degrades to literal output (see
/// [`crate::keywords::format_template`]).
#[derive(Debug, Error)]
pub enum SubstError {
    /// The chunk transducer observed two different line-ending styles in the
    /// same stream while `repair` was not requested.
    #[error("File '{}' has inconsistent newlines", path.as_deref().map(|p| p.display().to_string()).unwrap_or_else(|| "<stream>".to_string()))]
    InconsistentEol {
        /// Source path, when known (the driver fills this in; a bare stream
        /// translation has no path to attach).
        path: Option<PathBuf>,
    },

    /// `eol-style` property carried a value that isn't one of
    /// `native`/`LF`/`CR`/`CRLF`.
    #[error("unrecognized eol-style value '{value}'")]
    UnknownEol {
        /// The offending raw property value.
        value: String,
    },

    /// A special-file kind tag this implementation does not know how to
    /// materialize (only `link` is defined).
    #[error("unsupported special file type '{identifier}'")]
    Unsupported {
        /// The offending identifier token, echoed back to the caller.
        identifier: String,
    },

    /// An operation was attempted on a [`crate::stream::TranslatedStream`]
    /// after it was closed.
    #[error("operation on closed stream")]
    ClosedStream,

    /// Underlying I/O failure, annotated with the path and verb in flight.
    #[error("{op} {path}: {source}", path = path.display())]
    Io {
        /// What we were trying to do (`"open"`, `"rename"`, `"read link"`, ...).
        op: &'static str,
        /// The path involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },
}

impl SubstError {
    pub(crate) fn io(op: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SubstError::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Attach a source path to an `InconsistentEol` error, as the driver
    /// does when a bare stream translation bubbles one up (§4.7 point 6).
    pub fn with_path(self, path: impl Into<PathBuf>) -> Self {
        match self {
            SubstError::InconsistentEol { .. } => SubstError::InconsistentEol {
                path: Some(path.into()),
            },
            other => other,
        }
    }
}

impl From<SubstError> for std::io::Error {
    fn from(err: SubstError) -> Self {
        match err {
            SubstError::Io { source, .. } => source,
            other => std::io::Error::other(other),
        }
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, SubstError>;
