//! # tarbox engine - archive pack/extract library
//!
//! Packs named files and directories from a source directory into a
//! gzip-compressed tar archive, and extracts such archives into a directory.
//! Designed as the foundation for the `tarbox` CLI and other front ends.
//!
//! ## Overview
//!
//! Both operations run in two phases:
//! - a pre-pass that counts entries (walking the source tree, or parsing the
//!   archive) to establish the progress denominator
//! - a streaming pass that writes or unpacks entries, reporting each entry
//!   name and every change of the integer percentage
//!
//! A pack can be cancelled; a cancelled pack removes the archive it wrote.
//!
//! ## Basic Usage
//!
//! ```no_run
//! use tarbox_engine::{pack, OperationEvent};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let op = pack("/home/me/project", "/tmp/project.tar.gz", &["src", "Cargo.toml"])?;
//!
//! for event in op.events().iter() {
//!     match event {
//!         OperationEvent::Progress(percent) => println!("{}%", percent),
//!         OperationEvent::File(name) => println!("{}", name),
//!         OperationEvent::Error(err) => return Err(err.into()),
//!         _ => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - **model**: Core data structures (OperationKind, OperationEvent, Destination, ...)
//! - **error**: Error types and handling
//! - **fs_ops**: Tree walking, entry counting, archive removal
//! - **archive**: Archive opening and pre-parse
//! - **pack** / **extract**: The two engines
//! - **operation**: Public facade (construction, events, cancel)
//! - **progress**: Observer trait and progress tracking

pub mod archive;
pub mod error;
pub mod extract;
pub mod fs_ops;
pub mod model;
pub mod operation;
pub mod pack;
pub mod progress;

// Re-export main types and functions
pub use error::{EngineError, ErrorKind};
pub use model::{
    AbortFlag, Destination, OperationEvent, OperationKind, OperationState, OperationSummary,
    TransferStats,
};
pub use operation::{extract, operation, pack, Operation};
pub use progress::{OperationObserver, ProgressTracker};
