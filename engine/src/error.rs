//! Error types for the archive engine.
//!
//! `EngineError` covers both the synchronous argument checks performed when an
//! operation is constructed and the runtime failures delivered later through
//! the operation's event stream.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors produced while validating, counting, packing or extracting.
///
/// Filesystem failures keep the underlying `io::Error` so the system message
/// reaches the caller verbatim, together with the failing step and path.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed arguments. Only ever returned synchronously from a constructor.
    #[error("{reason}")]
    InvalidArgument { reason: String },

    /// A pack was requested with an empty entry-name list.
    #[error("Nothing to pack!")]
    NothingToPack,

    /// The archive parsed cleanly but holds no entries.
    #[error("No entries found")]
    NoEntries,

    /// Missing source, permission denied, failed cleanup and similar.
    #[error("{source}, {op} '{}'", .path.display())]
    Filesystem {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The decompressed stream is not a valid tar archive.
    #[error("Invalid tar header. Maybe the tar is corrupted or it needs to be gunzipped?")]
    InvalidTarHeader {
        #[source]
        source: io::Error,
    },

    /// The gzip layer could not be decoded.
    #[error("Invalid gzip data: {source}")]
    InvalidGzip {
        #[source]
        source: io::Error,
    },

    /// The background worker could not be started, exited abnormally, or its
    /// terminal event was already consumed.
    #[error("Operation worker failed: {message}")]
    Worker { message: String },
}

/// Coarse classification of an [`EngineError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidArgument,
    NothingToPack,
    NoEntries,
    Filesystem,
    ArchiveFormat,
    Worker,
}

impl EngineError {
    pub(crate) fn invalid_argument(reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            reason: reason.into(),
        }
    }

    pub(crate) fn filesystem(op: &'static str, path: &Path, source: io::Error) -> Self {
        Self::Filesystem {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument { .. } => ErrorKind::InvalidArgument,
            Self::NothingToPack => ErrorKind::NothingToPack,
            Self::NoEntries => ErrorKind::NoEntries,
            Self::Filesystem { .. } => ErrorKind::Filesystem,
            Self::InvalidTarHeader { .. } | Self::InvalidGzip { .. } => ErrorKind::ArchiveFormat,
            Self::Worker { .. } => ErrorKind::Worker,
        }
    }

    /// Extract the OS error code from this error, if available.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Self::Filesystem { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}
