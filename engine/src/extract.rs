//! Extract engine.
//!
//! Pre-parses the archive to learn how many entries it holds, then unpacks it
//! beneath the destination directory with one `file` notification per entry.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::archive;
use crate::error::EngineError;
use crate::model::TransferStats;
use crate::progress::{OperationObserver, ProgressTracker};

/// Everything an extraction needs, captured when the operation is constructed.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// Archive to read (gzip-compressed or plain tar)
    pub archive: PathBuf,
    /// Directory the entries are unpacked into; created if missing
    pub destination: PathBuf,
}

/// Run an extraction to completion.
///
/// # Errors
/// Returns the pre-parse error (Filesystem, InvalidGzip, InvalidTarHeader,
/// NoEntries) before anything is written, or the first error hit while
/// unpacking.
pub fn run_extract(
    request: ExtractRequest,
    observer: &dyn OperationObserver,
) -> Result<TransferStats, EngineError> {
    let ExtractRequest {
        archive: archive_path,
        destination,
    } = request;

    let total = archive::count_entries(&archive_path)?;

    observer.on_start();

    fs::create_dir_all(&destination)
        .map_err(|e| EngineError::filesystem("mkdir", &destination, e))?;

    let mut reader = archive::open(&archive_path)?;
    let mut tracker = ProgressTracker::new(total);

    for entry in reader.entries().map_err(archive::format_error)? {
        let mut entry = entry.map_err(archive::format_error)?;
        let name = entry
            .path()
            .map_err(archive::format_error)?
            .to_string_lossy()
            .into_owned();

        let unpacked = entry.unpack_in(&destination).map_err(|e| {
            if archive::is_decompress_error(&e) {
                archive::format_error(e)
            } else {
                EngineError::filesystem("write", &destination.join(&name), e)
            }
        })?;
        if !unpacked {
            warn!(entry = %name, "skipped entry outside the destination");
        }

        if let Some(percent) = tracker.advance() {
            observer.on_progress(percent);
        }
        observer.on_file(&name);
    }

    debug!(entries = tracker.processed(), "archive extracted");
    Ok(TransferStats {
        processed: tracker.processed(),
        total,
        cancelled: false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::tests::{gzip_bytes, tar_bytes};
    use crate::error::ErrorKind;
    use crate::model::{AbortFlag, Destination};
    use crate::pack::tests::RecordingObserver;
    use crate::pack::{run_pack, PackRequest};
    use std::path::Path;

    fn write_archive(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).expect("Failed to write archive");
        path
    }

    #[test]
    fn test_extract_reports_every_entry() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let tar = tar_bytes(&[("a.txt", "alpha"), ("b.txt", "beta"), ("c.txt", "gamma")]);
        let from = write_archive(temp_dir.path(), "abc.tar.gz", &gzip_bytes(&tar));
        let to = temp_dir.path().join("out");
        let observer = RecordingObserver::new();

        let stats = run_extract(
            ExtractRequest {
                archive: from,
                destination: to.clone(),
            },
            &observer,
        )
        .expect("Failed to extract");

        assert_eq!(stats.processed, 3);
        assert_eq!(stats.total, 3);
        assert_eq!(
            observer.get_calls(),
            vec![
                "start",
                "progress:33",
                "file:a.txt",
                "progress:67",
                "file:b.txt",
                "progress:100",
                "file:c.txt",
            ]
        );
        assert_eq!(fs::read_to_string(to.join("b.txt")).unwrap(), "beta");
    }

    #[test]
    fn test_extract_plain_tar() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let from = write_archive(temp_dir.path(), "plain.tar", &tar_bytes(&[("x.txt", "x")]));
        let to = temp_dir.path().join("out");

        run_extract(
            ExtractRequest {
                archive: from,
                destination: to.clone(),
            },
            &RecordingObserver::new(),
        )
        .expect("Failed to extract");

        assert_eq!(fs::read_to_string(to.join("x.txt")).unwrap(), "x");
    }

    #[test]
    fn test_extract_missing_archive() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let observer = RecordingObserver::new();

        let err = run_extract(
            ExtractRequest {
                archive: temp_dir.path().join("hello.tar.gz"),
                destination: temp_dir.path().join("hello"),
            },
            &observer,
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Filesystem);
        assert!(err.to_string().contains("No such file"));
        assert!(observer.get_calls().is_empty(), "no start before a parse error");
        assert!(!temp_dir.path().join("hello").exists());
    }

    #[test]
    fn test_extract_gzip_that_is_not_tar() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let page = "NAME awk - pattern scanning and processing language\n".repeat(20);
        let from = write_archive(temp_dir.path(), "awk.1.gz", &gzip_bytes(page.as_bytes()));
        let observer = RecordingObserver::new();

        let err = run_extract(
            ExtractRequest {
                archive: from,
                destination: temp_dir.path().join("out"),
            },
            &observer,
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "Invalid tar header. Maybe the tar is corrupted or it needs to be gunzipped?"
        );
        assert!(observer.get_calls().is_empty());
    }

    #[test]
    fn test_extract_empty_archive() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let from = write_archive(temp_dir.path(), "empty.tar.gz", &gzip_bytes(&tar_bytes(&[])));

        let err = run_extract(
            ExtractRequest {
                archive: from,
                destination: temp_dir.path().join("out"),
            },
            &RecordingObserver::new(),
        )
        .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::NoEntries);
    }

    #[test]
    fn test_round_trip_preserves_contents() {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp dir");
        let src = temp_dir.path().join("src");
        let tree = src.join("tree");
        fs::create_dir_all(tree.join("sub").join("leaf")).expect("Failed to create tree");
        fs::write(tree.join("top.txt"), "top level").expect("Failed to write file");
        fs::write(tree.join("sub").join("bin.dat"), [0u8, 159, 146, 150, 255])
            .expect("Failed to write file");
        fs::write(tree.join("sub").join("leaf").join("big.txt"), "line\n".repeat(10_000))
            .expect("Failed to write file");
        fs::write(src.join("single.txt"), "single").expect("Failed to write file");

        let archive = temp_dir.path().join("tree.tar.gz");
        let packed = run_pack(
            PackRequest {
                source: src.clone(),
                destination: Destination::from(archive.clone()),
                names: vec!["tree".to_string(), "single.txt".to_string()],
            },
            &AbortFlag::new(),
            &RecordingObserver::new(),
        )
        .expect("Failed to pack");

        let out = temp_dir.path().join("out");
        let observer = RecordingObserver::new();
        let extracted = run_extract(
            ExtractRequest {
                archive,
                destination: out.clone(),
            },
            &observer,
        )
        .expect("Failed to extract");

        assert_eq!(packed.processed, extracted.processed);
        assert_eq!(observer.files().len() as u64, extracted.total);
        for relative in ["tree/top.txt", "tree/sub/bin.dat", "tree/sub/leaf/big.txt", "single.txt"] {
            let original = fs::read(src.join(relative)).expect("Failed to read original");
            let restored = fs::read(out.join(relative)).expect("Failed to read restored");
            assert_eq!(original, restored, "{} differs after round trip", relative);
        }
        assert!(out.join("tree").join("sub").join("leaf").is_dir());
    }
}
