//! tarbox - Command-line interface for the archive engine.
//!
//! Packs a file or directory into `<name>.tar.gz`, or extracts an archive into
//! the working directory, printing the percentage as it goes.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Parser};
use tarbox_engine::{operation, Destination, OperationEvent, OperationKind, OperationSummary};
use tracing::{debug, info};
use tracing_subscriber::{fmt, EnvFilter};

/// tarbox - pack and extract tar.gz archives
#[derive(Parser, Debug)]
#[command(name = "tarbox")]
#[command(version)]
#[command(about = "Pack and extract gzip-compressed tar archives with progress")]
struct Args {
    /// Pack the file or directory matching PATTERN into PATTERN.tar.gz
    #[arg(short, long, value_name = "PATTERN", conflicts_with = "extract", required_unless_present = "extract")]
    pack: Option<String>,

    /// Extract the archive matching PATTERN into the working directory
    #[arg(short = 'x', long, value_name = "PATTERN")]
    extract: Option<String>,

    /// Working directory (defaults to the current directory)
    #[arg(short = 'C', long, value_name = "DIR")]
    directory: Option<PathBuf>,

    /// Archive path for --pack (defaults to DIR/NAME.tar.gz)
    #[arg(short, long, value_name = "PATH", requires = "pack")]
    output: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Do not print progress
    #[arg(short, long)]
    quiet: bool,
}

/// Prints the percentage in place on stdout.
struct CliProgress {
    quiet: bool,
}

impl CliProgress {
    fn new(quiet: bool) -> Self {
        CliProgress { quiet }
    }

    fn progress(&self, percent: u8) {
        if self.quiet {
            return;
        }
        print!("\r{}%", percent);
        let _ = std::io::stdout().flush();
    }

    fn end(&self) {
        if !self.quiet {
            println!();
        }
    }

    fn format_duration(elapsed: chrono::Duration) -> String {
        let secs = elapsed.num_seconds().max(0);
        let mins = secs / 60;
        let secs = secs % 60;

        if mins > 0 {
            format!("{}m {}s", mins, secs)
        } else {
            format!("{}.{:03}s", secs, elapsed.num_milliseconds().max(0) % 1000)
        }
    }
}

fn init_logging(verbose: u8) {
    let log_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));
    fmt::Subscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);
    debug!("Parsed CLI arguments: {:?}", args);

    let exit_code = match run_cli(&args) {
        Ok(_) => 0,
        Err(e) => {
            eprintln!("{:#}", e);
            2
        }
    };

    std::process::exit(exit_code);
}

/// Main CLI logic - separated for testability
fn run_cli(args: &Args) -> Result<OperationSummary> {
    let cwd = match &args.directory {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("cannot determine the current directory")?,
    };

    let (kind, pattern) = match (&args.pack, &args.extract) {
        (Some(pattern), None) => ("pack", pattern),
        (None, Some(pattern)) => ("extract", pattern),
        _ => bail!("exactly one of --pack or --extract is required"),
    };
    let kind = operation(kind)?;
    let matched = resolve_pattern(&cwd, pattern)?;

    let op = match kind {
        OperationKind::Pack => {
            let name = entry_name(&cwd, &matched)?;
            let to = match &args.output {
                Some(output) => output.clone(),
                None => default_archive(&cwd, &name)?,
            };
            info!(source = %cwd.display(), archive = %to.display(), "packing {}", name);
            kind.launch(&cwd, Destination::from(to), &[name])?
        }
        OperationKind::Extract => {
            info!(archive = %matched.display(), into = %cwd.display(), "extracting");
            let no_names: [&str; 0] = [];
            kind.launch(&matched, &cwd, &no_names)?
        }
    };

    let progress = CliProgress::new(args.quiet);
    for event in op.events().iter() {
        match event {
            OperationEvent::Start => debug!("streaming started"),
            OperationEvent::File(name) => info!("{}", name),
            OperationEvent::Progress(percent) => progress.progress(percent),
            OperationEvent::End(summary) => {
                progress.end();
                info!(
                    "{} finished: {} entries in {}",
                    summary.kind,
                    summary.processed,
                    CliProgress::format_duration(summary.elapsed())
                );
                return Ok(summary);
            }
            OperationEvent::Error(err) => return Err(err.into()),
        }
    }

    bail!("operation stopped without reporting a result")
}

/// Entry name of `matched` relative to `cwd`; the directory itself is `.`.
fn entry_name(cwd: &Path, matched: &Path) -> Result<String> {
    let relative = matched
        .strip_prefix(cwd)
        .map_err(|_| anyhow!("{} is outside {}", matched.display(), cwd.display()))?;
    let name = relative.to_string_lossy();
    if name.is_empty() || name == "." {
        Ok(".".to_string())
    } else {
        Ok(name.into_owned())
    }
}

/// `DIR/NAME.tar.gz`, or `PARENT/DIRNAME.tar.gz` when packing the directory
/// itself so the archive is not written into the tree being packed.
fn default_archive(cwd: &Path, name: &str) -> Result<PathBuf> {
    if name != "." {
        return Ok(cwd.join(format!("{}.tar.gz", name)));
    }
    match (cwd.parent(), cwd.file_name()) {
        (Some(parent), Some(dir)) => {
            Ok(parent.join(format!("{}.tar.gz", dir.to_string_lossy())))
        }
        _ => bail!("cannot name an archive for {}; pass --output", cwd.display()),
    }
}

/// Resolve a glob pattern relative to `cwd`, returning the first match.
fn resolve_pattern(cwd: &Path, pattern: &str) -> Result<PathBuf> {
    let full = if Path::new(pattern).is_absolute() {
        pattern.to_string()
    } else {
        format!(
            "{}/{}",
            glob::Pattern::escape(&cwd.to_string_lossy()),
            pattern
        )
    };

    let mut matches = glob::glob(&full).with_context(|| format!("invalid pattern '{}'", pattern))?;
    match matches.next() {
        Some(found) => found.with_context(|| format!("cannot read match for '{}'", pattern)),
        None => bail!("file not found"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn args(pack: Option<&str>, extract: Option<&str>, dir: &Path) -> Args {
        Args {
            pack: pack.map(str::to_string),
            extract: extract.map(str::to_string),
            directory: Some(dir.to_path_buf()),
            output: None,
            verbose: 0,
            quiet: true,
        }
    }

    #[test]
    fn test_cli_packs_into_default_archive() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src_dir.path().join("test.txt"), "hello").expect("Failed to write file");

        let summary = run_cli(&args(Some("test.txt"), None, src_dir.path())).expect("CLI pack failed");

        assert_eq!(summary.processed, 1);
        assert!(src_dir.path().join("test.txt.tar.gz").exists());
    }

    #[test]
    fn test_cli_round_trip() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        let dst_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir(src_dir.path().join("docs")).expect("Failed to create dir");
        std::fs::write(src_dir.path().join("docs").join("a.md"), "# a").expect("Failed to write file");

        let mut pack_args = args(Some("docs"), None, src_dir.path());
        pack_args.output = Some(dst_dir.path().join("docs.tar.gz"));
        run_cli(&pack_args).expect("CLI pack failed");

        let summary =
            run_cli(&args(None, Some("*.tar.gz"), dst_dir.path())).expect("CLI extract failed");

        assert_eq!(summary.kind, OperationKind::Extract);
        assert_eq!(summary.processed, 2);
        let restored = std::fs::read_to_string(dst_dir.path().join("docs").join("a.md"))
            .expect("Failed to read extracted file");
        assert_eq!(restored, "# a");
    }

    #[test]
    fn test_cli_packs_working_directory() {
        let root = TempDir::new().expect("Failed to create temp dir");
        let src_dir = root.path().join("project");
        std::fs::create_dir(&src_dir).expect("Failed to create dir");
        std::fs::write(src_dir.join("a.txt"), "a").expect("Failed to write file");

        let summary = run_cli(&args(Some("."), None, &src_dir)).expect("CLI pack failed");

        assert_eq!(summary.processed, 2);
        assert!(root.path().join("project.tar.gz").exists());
    }

    #[test]
    fn test_entry_name_of_working_directory() {
        let cwd = Path::new("/work/project");
        assert_eq!(entry_name(cwd, &cwd.join(".")).unwrap(), ".");
        assert_eq!(entry_name(cwd, cwd).unwrap(), ".");
        assert_eq!(entry_name(cwd, &cwd.join("docs")).unwrap(), "docs");
        assert!(entry_name(cwd, Path::new("/elsewhere")).is_err());
    }

    #[test]
    fn test_cli_rejects_missing_file() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");

        let err = run_cli(&args(Some("nothing-*"), None, src_dir.path())).unwrap_err();
        assert_eq!(err.to_string(), "file not found");
    }

    #[test]
    fn test_cli_reports_extract_errors() {
        let src_dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(src_dir.path().join("broken.tar.gz"), "not an archive at all")
            .expect("Failed to write file");

        let result = run_cli(&args(None, Some("broken.tar.gz"), src_dir.path()));
        assert!(result.is_err(), "CLI should fail on a broken archive");
    }

    #[test]
    fn test_cli_flags_are_exclusive() {
        assert!(Args::try_parse_from(["tarbox"]).is_err());
        assert!(Args::try_parse_from(["tarbox", "-p", "a", "-x", "b"]).is_err());
        assert!(Args::try_parse_from(["tarbox", "-x", "b", "-o", "out.tar.gz"]).is_err());

        let parsed = Args::try_parse_from(["tarbox", "-vv", "-x", "a.tar.gz"]).expect("valid args");
        assert_eq!(parsed.verbose, 2);
        assert_eq!(parsed.extract.as_deref(), Some("a.tar.gz"));
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(CliProgress::format_duration(chrono::Duration::milliseconds(1500)), "1.500s");
        assert_eq!(CliProgress::format_duration(chrono::Duration::seconds(125)), "2m 5s");
    }
}
