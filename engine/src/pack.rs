//! Pack engine.
//!
//! Counts the requested entries, then streams them through a tar encoder and a
//! gzip encoder into the destination, reporting one `file` notification per
//! entry. Cancellation is honoured when counting finishes and again once the
//! archive has been fully written.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use flate2::write::GzEncoder;
use flate2::Compression;
use tracing::{debug, info, warn};

use crate::error::EngineError;
use crate::fs_ops;
use crate::model::{AbortFlag, Destination, TransferStats};
use crate::progress::{OperationObserver, ProgressTracker};

/// Everything a pack needs, captured when the operation is constructed.
#[derive(Debug)]
pub struct PackRequest {
    /// Directory the entry names are relative to
    pub source: PathBuf,
    /// Archive file path or caller-owned writer
    pub destination: Destination,
    /// Top-level entries to include, in order
    pub names: Vec<String>,
}

/// Label used in errors when writing to a caller-owned writer fails.
const WRITER_LABEL: &str = "<writer>";

/// Run a pack to completion.
///
/// # Errors
/// Returns NothingToPack for an empty name list, Filesystem for walk, read,
/// write or cleanup failures. Once an error is returned no success has been
/// reported for this pack.
pub fn run_pack(
    request: PackRequest,
    abort: &AbortFlag,
    observer: &dyn OperationObserver,
) -> Result<TransferStats, EngineError> {
    let PackRequest {
        source,
        destination,
        names,
    } = request;

    if names.is_empty() {
        return Err(EngineError::NothingToPack);
    }

    let total = fs_ops::count_entries(&source, names.as_slice())?;

    if abort.is_set() {
        info!("pack cancelled before streaming; no archive created");
        return Ok(TransferStats {
            processed: 0,
            total,
            cancelled: true,
        });
    }

    observer.on_start();

    let cleanup_path = destination.as_path().map(Path::to_path_buf);
    let mut tracker = ProgressTracker::new(total);
    write_archive(&source, destination, &names, &mut tracker, observer)?;

    let stats = TransferStats {
        processed: tracker.processed(),
        total,
        cancelled: abort.is_set(),
    };

    if stats.cancelled {
        match cleanup_path {
            Some(path) => {
                warn!(archive = %path.display(), "pack cancelled; removing archive");
                fs_ops::remove_destination(&path)?;
            }
            None => debug!("pack cancelled; destination writer belongs to caller"),
        }
    }

    Ok(stats)
}

fn write_archive(
    source: &Path,
    destination: Destination,
    names: &[String],
    tracker: &mut ProgressTracker,
    observer: &dyn OperationObserver,
) -> Result<(), EngineError> {
    let (sink, label): (Box<dyn Write + Send>, PathBuf) = match destination {
        Destination::Path(path) => {
            let file = File::create(&path).map_err(|e| EngineError::filesystem("open", &path, e))?;
            (Box::new(BufWriter::new(file)), path)
        }
        Destination::Writer(writer) => (writer, PathBuf::from(WRITER_LABEL)),
    };

    let mut builder = tar::Builder::new(GzEncoder::new(sink, Compression::default()));
    builder.follow_symlinks(false);

    for name in names {
        let root = source.join(name);
        for entry in fs_ops::walker(&root) {
            let entry = entry.map_err(|e| fs_ops::walk_error(e, &root))?;
            let archive_name = fs_ops::archive_name(source, &entry);
            let display_name = archive_name.to_string_lossy().into_owned();

            if let Some(percent) = tracker.advance() {
                observer.on_progress(percent);
            }
            observer.on_file(&display_name);

            builder
                .append_path_with_name(entry.path(), &archive_name)
                .map_err(|e| EngineError::filesystem("append", entry.path(), e))?;
        }
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| EngineError::filesystem("write", &label, e))?;
    let mut sink = encoder
        .finish()
        .map_err(|e| EngineError::filesystem("write", &label, e))?;
    sink.flush()
        .map_err(|e| EngineError::filesystem("write", &label, e))?;

    debug!(entries = tracker.processed(), "archive written");
    Ok(())
}
