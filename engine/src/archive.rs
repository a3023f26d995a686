//! Archive reading.
//!
//! Opens an archive for reading, transparently gunzipping it when it starts
//! with the gzip magic bytes, and pre-parses it to count its entries.

use std::error::Error as StdError;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

use flate2::read::GzDecoder;
use tracing::debug;

use crate::error::EngineError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

pub(crate) type ArchiveReader = tar::Archive<Box<dyn Read>>;

/// Marks an I/O error as coming from the gzip layer so it can be told apart
/// from tar-level failures after passing through the tar decoder.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct DecompressError(io::Error);

struct Gunzip<R: Read>(GzDecoder<R>);

impl<R: Read> Read for Gunzip<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0
            .read(buf)
            .map_err(|e| io::Error::new(e.kind(), DecompressError(e)))
    }
}

/// Open `path` as a tar stream, decompressing it if it is gzipped.
///
/// # Errors
/// Returns EngineError::Filesystem if the file cannot be opened or read.
pub(crate) fn open(path: &Path) -> Result<ArchiveReader, EngineError> {
    let file = File::open(path).map_err(|e| EngineError::filesystem("open", path, e))?;
    let mut reader = BufReader::new(file);

    let gzipped = reader
        .fill_buf()
        .map_err(|e| EngineError::filesystem("read", path, e))?
        .starts_with(&GZIP_MAGIC);

    let stream: Box<dyn Read> = if gzipped {
        Box::new(Gunzip(GzDecoder::new(reader)))
    } else {
        Box::new(reader)
    };
    Ok(tar::Archive::new(stream))
}

/// True if `err`, or anything it wraps, was raised by the gzip layer.
pub(crate) fn is_decompress_error(err: &io::Error) -> bool {
    let mut current = err.get_ref().map(|e| e as &(dyn StdError + 'static));
    while let Some(e) = current {
        if e.is::<DecompressError>() {
            return true;
        }
        current = match e.downcast_ref::<io::Error>() {
            Some(inner) => inner.get_ref().map(|e| e as &(dyn StdError + 'static)),
            None => e.source(),
        };
    }
    false
}

/// Classify a failure raised while decoding the archive stream.
pub(crate) fn format_error(err: io::Error) -> EngineError {
    if is_decompress_error(&err) {
        EngineError::InvalidGzip { source: err }
    } else {
        EngineError::InvalidTarHeader { source: err }
    }
}

/// Count the entries of an archive without writing anything.
///
/// Each entry's content is drained before the next header is read. A clean
/// archive with no entries is reported as `NoEntries`.
///
/// # Errors
/// Returns EngineError::Filesystem if the archive cannot be opened,
/// InvalidGzip/InvalidTarHeader if it cannot be decoded, and NoEntries if it
/// is empty.
pub fn count_entries(path: &Path) -> Result<u64, EngineError> {
    let mut archive = open(path)?;
    let mut count = 0u64;

    for entry in archive.entries().map_err(format_error)? {
        let mut entry = entry.map_err(format_error)?;
        io::copy(&mut entry, &mut io::sink()).map_err(format_error)?;
        count += 1;
    }

    debug!(archive = %path.display(), count, "parsed archive");
    if count == 0 {
        return Err(EngineError::NoEntries);
    }
    Ok(count)
}
