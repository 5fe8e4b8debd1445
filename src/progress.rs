//! Construction milestones and cooperative cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Stages of building a filter from a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Milestone {
    /// The circuit graph is frozen for decomposition
    GraphBuilt,
    /// The topology tree is ready
    TreeBuilt,
    /// The WDF tree is ready to process samples
    WdfTreeBuilt,
    /// The test sine has been generated
    WavePrepared,
}

/// Receives construction and offline-processing progress.
///
/// Observers are called from the construction context only, never from
/// the audio thread.
pub trait ProgressObserver {
    /// A construction stage completed.
    fn milestone(&mut self, milestone: Milestone);

    /// Offline processing advanced to `done` of `total` samples.
    fn samples_processed(&mut self, _done: usize, _total: usize) {}
}

/// Observer that ignores everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn milestone(&mut self, _milestone: Milestone) {}
}

/// Observer that logs milestones through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn milestone(&mut self, milestone: Milestone) {
        tracing::info!(?milestone, "construction milestone");
    }

    fn samples_processed(&mut self, done: usize, total: usize) {
        tracing::debug!("processed {done}/{total} samples");
    }
}

impl<F: FnMut(Milestone)> ProgressObserver for F {
    fn milestone(&mut self, milestone: Milestone) {
        self(milestone)
    }
}

/// Shared flag checked between construction milestones.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Takes effect at the next milestone boundary.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    /// Clear a previous request.
    pub fn reset(&self) {
        self.cancelled.store(false, Ordering::Relaxed);
    }
}
