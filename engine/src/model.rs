//! Core data model for archive operations.
//!
//! This module defines the main data structures shared by the engines and the
//! public facade:
//! - OperationKind, OperationState: what an operation does and where it is
//! - Destination: where a pack writes its archive
//! - OperationEvent, OperationSummary: what an operation reports
//! - AbortFlag: the cooperative cancellation flag

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::EngineError;

/// The two operations the engine knows how to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    /// Assemble a gzip-compressed tar archive from a directory subset
    Pack,
    /// Expand a (gzip-compressed) tar archive into a directory
    Extract,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Pack => write!(f, "pack"),
            OperationKind::Extract => write!(f, "extract"),
        }
    }
}

impl FromStr for OperationKind {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pack" => Ok(OperationKind::Pack),
            "extract" => Ok(OperationKind::Extract),
            other => Err(EngineError::invalid_argument(format!(
                "unknown operation '{}': pack or extract only",
                other
            ))),
        }
    }
}

/// Lifecycle of a single operation.
///
/// `Erroring` is entered from `Counting` or `Transferring` and always leads
/// straight to `Ended`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationState {
    /// Validated, worker not yet running
    Created,
    /// Establishing the progress denominator
    Counting,
    /// Streaming entries
    Transferring,
    /// Pipeline finished, terminal event about to be delivered
    Ending,
    /// A failure is being reported
    Erroring,
    /// Terminal; nothing more will be emitted
    Ended,
}

impl OperationState {
    /// Returns true if this state is terminal (no further changes expected).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationState::Ended)
    }
}

/// Where a pack writes its archive.
///
/// A path is created (or truncated) by the engine and removed again if the
/// pack is cancelled. A writer belongs to the caller and is never removed.
pub enum Destination {
    Path(PathBuf),
    Writer(Box<dyn Write + Send>),
}

impl Destination {
    /// Wrap a caller-owned writer.
    pub fn writer<W: Write + Send + 'static>(writer: W) -> Self {
        Destination::Writer(Box::new(writer))
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            Destination::Path(path) => Some(path),
            Destination::Writer(_) => None,
        }
    }
}

impl fmt::Debug for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Destination::Writer(_) => f.write_str("Writer(..)"),
        }
    }
}

impl From<PathBuf> for Destination {
    fn from(path: PathBuf) -> Self {
        Destination::Path(path)
    }
}

impl From<&Path> for Destination {
    fn from(path: &Path) -> Self {
        Destination::Path(path.to_path_buf())
    }
}

impl From<&PathBuf> for Destination {
    fn from(path: &PathBuf) -> Self {
        Destination::Path(path.clone())
    }
}

impl From<&str> for Destination {
    fn from(path: &str) -> Self {
        Destination::Path(PathBuf::from(path))
    }
}

impl From<String> for Destination {
    fn from(path: String) -> Self {
        Destination::Path(PathBuf::from(path))
    }
}

/// A lifecycle notification delivered by a running operation.
#[derive(Debug)]
pub enum OperationEvent {
    /// Counting succeeded and streaming begins
    Start,
    /// One entry was processed; carries its name relative to the archive root
    File(String),
    /// The integer percentage changed
    Progress(u8),
    /// Terminal failure
    Error(EngineError),
    /// Terminal success (or a cleanly cancelled pack)
    End(OperationSummary),
}

impl OperationEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OperationEvent::Error(_) | OperationEvent::End(_))
    }
}

/// Counters an engine hands back when its work finishes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferStats {
    /// Entries processed during streaming
    pub processed: u64,
    /// Progress denominator from the pre-pass
    pub total: u64,
    /// True if the cancel flag was honoured
    pub cancelled: bool,
}

/// Outcome of an operation that reached `end`.
#[derive(Debug, Clone)]
pub struct OperationSummary {
    pub id: Uuid,
    pub kind: OperationKind,
    pub processed: u64,
    pub total: u64,
    pub cancelled: bool,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl OperationSummary {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Cooperative cancellation flag shared between a handle and its worker.
#[derive(Debug, Clone, Default)]
pub struct AbortFlag(Arc<AtomicBool>);

impl AbortFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
