//! Progress reporting.
//!
//! This module defines the OperationObserver trait, which decouples the pack
//! and extract engines from how notifications are delivered (channel, CLI,
//! tests), and the ProgressTracker that turns processed-entry counts into
//! percentages.

/// Trait for receiving notifications from a running engine.
///
/// All methods are called synchronously on the worker executing the
/// operation. Terminal outcomes are not part of this trait: the engines
/// return them as `Result`.
pub trait OperationObserver: Send {
    /// Called once counting has succeeded and streaming begins.
    fn on_start(&self);

    /// Called exactly once per processed entry with its relative name.
    fn on_file(&self, name: &str);

    /// Called when the integer percentage changes.
    fn on_progress(&self, percent: u8);
}

/// Tracks processed entries against a known total.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    processed: u64,
    total: u64,
    last_percent: u8,
}

impl ProgressTracker {
    pub fn new(total: u64) -> Self {
        ProgressTracker {
            processed: 0,
            total,
            last_percent: 0,
        }
    }

    /// Record one more processed entry.
    ///
    /// Returns the new percentage if it differs from the last one reported.
    pub fn advance(&mut self) -> Option<u8> {
        self.processed += 1;

        let percent = self.percent();
        if percent != self.last_percent {
            self.last_percent = percent;
            Some(percent)
        } else {
            None
        }
    }

    /// `round(processed * 100 / total)`, half rounded up, clamped to 100.
    fn percent(&self) -> u8 {
        if self.total == 0 || self.processed >= self.total {
            return 100;
        }
        let scaled = (self.processed * 200 + self.total) / (self.total * 2);
        scaled.min(100) as u8
    }

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn last_percent(&self) -> u8 {
        self.last_percent
    }
}
