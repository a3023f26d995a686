//! Operation orchestration module.
//!
//! This module provides the public entry points:
//! - `pack` / `extract`: validate arguments and start an operation
//! - `operation`: resolve an operation kind by name
//! - `Operation`: the handle used to observe events and cancel
//!
//! Arguments are validated synchronously. The work itself runs on a worker
//! thread and every notification is queued on a channel that exists before
//! the worker starts, so a caller reading events later never misses one.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, error, info, info_span};
use uuid::Uuid;

use crate::error::EngineError;
use crate::extract::{run_extract, ExtractRequest};
use crate::model::{
    AbortFlag, Destination, OperationEvent, OperationKind, OperationState, OperationSummary,
    TransferStats,
};
use crate::pack::{run_pack, PackRequest};
use crate::progress::OperationObserver;

/// Handle to a running pack or extract.
///
/// Dropping the handle does not stop the worker; it runs to completion and its
/// remaining events are discarded.
#[derive(Debug)]
pub struct Operation {
    id: Uuid,
    kind: OperationKind,
    abort: AbortFlag,
    state: Arc<Mutex<OperationState>>,
    events: Receiver<OperationEvent>,
    worker: Option<JoinHandle<()>>,
}

/// Start packing `names` (relative to `source`) into `destination`.
///
/// The name list is copied, so the caller may reuse or change it afterwards.
///
/// # Errors
/// Returns EngineError::InvalidArgument if `source` or a destination path is
/// empty. Every other failure arrives as `OperationEvent::Error`.
pub fn pack<P, D, S>(source: P, destination: D, names: &[S]) -> Result<Operation, EngineError>
where
    P: AsRef<Path>,
    D: Into<Destination>,
    S: AsRef<str>,
{
    let source = validate_source(source.as_ref())?;
    let destination = destination.into();
    if let Some(path) = destination.as_path() {
        validate_destination(path)?;
    }

    let request = PackRequest {
        source,
        destination,
        names: names.iter().map(|n| n.as_ref().to_owned()).collect(),
    };
    Operation::spawn(OperationKind::Pack, move |abort, observer| {
        run_pack(request, abort, observer)
    })
}

/// Start extracting `archive` into the `destination` directory.
///
/// # Errors
/// Returns EngineError::InvalidArgument if either path is empty. Every other
/// failure arrives as `OperationEvent::Error`.
pub fn extract<P, Q>(archive: P, destination: Q) -> Result<Operation, EngineError>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let request = ExtractRequest {
        archive: validate_source(archive.as_ref())?,
        destination: validate_destination(destination.as_ref())?,
    };
    Operation::spawn(OperationKind::Extract, move |_abort, observer| {
        run_extract(request, observer)
    })
}

/// Resolve an operation kind by name (`"pack"` or `"extract"`).
///
/// # Errors
/// Returns EngineError::InvalidArgument for any other name.
pub fn operation(name: &str) -> Result<OperationKind, EngineError> {
    name.parse()
}

impl OperationKind {
    /// Start an operation of this kind.
    ///
    /// For `Extract`, `names` is ignored and the destination must be a path.
    pub fn launch<P, D, S>(self, from: P, to: D, names: &[S]) -> Result<Operation, EngineError>
    where
        P: AsRef<Path>,
        D: Into<Destination>,
        S: AsRef<str>,
    {
        match self {
            OperationKind::Pack => pack(from, to, names),
            OperationKind::Extract => match to.into() {
                Destination::Path(dir) => extract(from, dir),
                Destination::Writer(_) => Err(EngineError::invalid_argument(
                    "extract destination must be a directory path",
                )),
            },
        }
    }
}

fn validate_source(path: &Path) -> Result<PathBuf, EngineError> {
    if path.as_os_str().is_empty() {
        return Err(EngineError::invalid_argument("source path must not be empty"));
    }
    Ok(path.to_path_buf())
}

fn validate_destination(path: &Path) -> Result<PathBuf, EngineError> {
    if path.as_os_str().is_empty() {
        return Err(EngineError::invalid_argument(
            "destination path must not be empty",
        ));
    }
    Ok(path.to_path_buf())
}

/// Observer that forwards engine notifications onto the event channel.
struct ChannelObserver {
    sender: Sender<OperationEvent>,
    state: Arc<Mutex<OperationState>>,
}

impl ChannelObserver {
    fn set_state(&self, state: OperationState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    /// Deliver the terminal event. The state is `Ended` before it is sent.
    fn finish(&self, event: OperationEvent) {
        self.set_state(OperationState::Ended);
        let _ = self.sender.send(event);
    }
}

impl OperationObserver for ChannelObserver {
    fn on_start(&self) {
        self.set_state(OperationState::Transferring);
        let _ = self.sender.send(OperationEvent::Start);
    }

    fn on_file(&self, name: &str) {
        debug!(entry = name, "entry processed");
        let _ = self.sender.send(OperationEvent::File(name.to_string()));
    }

    fn on_progress(&self, percent: u8) {
        let _ = self.sender.send(OperationEvent::Progress(percent));
    }
}

impl Operation {
    fn spawn<F>(kind: OperationKind, work: F) -> Result<Self, EngineError>
    where
        F: FnOnce(&AbortFlag, &dyn OperationObserver) -> Result<TransferStats, EngineError>
            + Send
            + 'static,
    {
        let id = Uuid::new_v4();
        let abort = AbortFlag::new();
        let state = Arc::new(Mutex::new(OperationState::Created));
        let (sender, events) = unbounded();

        let observer = ChannelObserver {
            sender,
            state: Arc::clone(&state),
        };
        let worker_abort = abort.clone();

        let worker = thread::Builder::new()
            .name(format!("tarbox-{}", kind))
            .spawn(move || {
                let span = info_span!("operation", %id, %kind);
                let _enter = span.enter();

                let started_at = Utc::now();
                observer.set_state(OperationState::Counting);
                info!("operation started");

                match work(&worker_abort, &observer) {
                    Ok(stats) => {
                        observer.set_state(OperationState::Ending);
                        info!(
                            processed = stats.processed,
                            total = stats.total,
                            cancelled = stats.cancelled,
                            "operation finished"
                        );
                        observer.finish(OperationEvent::End(OperationSummary {
                            id,
                            kind,
                            processed: stats.processed,
                            total: stats.total,
                            cancelled: stats.cancelled,
                            started_at,
                            finished_at: Utc::now(),
                        }));
                    }
                    Err(err) => {
                        observer.set_state(OperationState::Erroring);
                        error!(error = %err, "operation failed");
                        observer.finish(OperationEvent::Error(err));
                    }
                }
            })
            .map_err(|e| EngineError::Worker {
                message: e.to_string(),
            })?;

        Ok(Operation {
            id,
            kind,
            abort,
            state,
            events,
            worker: Some(worker),
        })
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    /// Current lifecycle state.
    pub fn state(&self) -> OperationState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(OperationState::Ended)
    }

    /// Event stream. Ends (disconnects) after the terminal event.
    pub fn events(&self) -> &Receiver<OperationEvent> {
        &self.events
    }

    /// Request cancellation of a pack.
    ///
    /// Checked when counting finishes and after the archive has been written;
    /// a pipeline already in flight is not interrupted. No effect on an
    /// extract, or once the operation has ended.
    pub fn cancel(&self) {
        if self.kind != OperationKind::Pack || self.state().is_terminal() {
            return;
        }
        debug!(id = %self.id, "cancel requested");
        self.abort.set();
    }

    pub fn is_cancelled(&self) -> bool {
        self.abort.is_set()
    }

    /// Block until the operation ends, discarding intermediate events.
    ///
    /// `wait` reads the same stream as [`Operation::events`]: use one or the
    /// other. Once the terminal event has been taken from `events()`, `wait`
    /// has nothing left to return.
    ///
    /// # Errors
    /// Returns the error delivered by the operation, or EngineError::Worker if
    /// no terminal event was left on the stream.
    pub fn wait(mut self) -> Result<OperationSummary, EngineError> {
        let outcome = self
            .events
            .iter()
            .find_map(|event| match event {
                OperationEvent::End(summary) => Some(Ok(summary)),
                OperationEvent::Error(err) => Some(Err(err)),
                _ => None,
            })
            .unwrap_or_else(|| {
                Err(EngineError::Worker {
                    message: "no terminal event left on the stream (already consumed through events())"
                        .to_string(),
                })
            });

        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
        outcome
    }
}
