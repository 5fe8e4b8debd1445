//! Lock-free handoff of built trees to the audio thread.
//!
//! Trees are built on a construction thread, then published through a
//! bounded channel. The [`RealtimeProcessor`] checks for a new tree at the
//! start of each block, swaps it in, and sends the old tree back so it is
//! dropped by the publisher. Controls shared with the audio thread are
//! atomics.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};

use crate::error::{Result, WdfError};
use crate::wdf::WdfTree;

/// Retired trees the audio thread can hand back before the publisher
/// collects them.
const RETIRED_CAPACITY: usize = 4;

/// Controls read by the audio thread.
#[derive(Debug)]
pub struct SharedControls {
    enabled: AtomicBool,
    /// `f32` bits
    volume: AtomicU32,
    faults: AtomicU64,
}

impl Default for SharedControls {
    fn default() -> Self {
        Self {
            enabled: AtomicBool::new(true),
            volume: AtomicU32::new(1.0f32.to_bits()),
            faults: AtomicU64::new(0),
        }
    }
}

impl SharedControls {
    pub fn filter_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn volume(&self) -> f32 {
        f32::from_bits(self.volume.load(Ordering::Relaxed))
    }

    pub fn set_volume(&self, volume: f32) {
        self.volume.store(volume.to_bits(), Ordering::Relaxed);
    }

    /// Samples that held their previous output after a nonlinear fault.
    pub fn faults(&self) -> u64 {
        self.faults.load(Ordering::Relaxed)
    }

    fn add_faults(&self, count: u64) {
        if count > 0 {
            self.faults.fetch_add(count, Ordering::Relaxed);
        }
    }
}

/// Create a connected publisher/processor pair.
///
/// `initial` is installed in the processor directly; without one the
/// processor passes audio through (scaled by volume) until a tree arrives.
pub fn channel(initial: Option<WdfTree>) -> (TreePublisher, RealtimeProcessor) {
    let (tree_tx, tree_rx) = bounded(1);
    let (retired_tx, retired_rx) = bounded(RETIRED_CAPACITY);
    let controls = Arc::new(SharedControls::default());

    let publisher = TreePublisher {
        trees: tree_tx,
        retired: retired_rx,
        controls: Arc::clone(&controls),
    };
    let processor = RealtimeProcessor {
        tree: initial.map(Box::new),
        incoming: tree_rx,
        retired: retired_tx,
        unreturned: None,
        controls,
    };
    (publisher, processor)
}

/// Construction-side end of the handoff.
#[derive(Debug)]
pub struct TreePublisher {
    trees: Sender<Box<WdfTree>>,
    retired: Receiver<Box<WdfTree>>,
    controls: Arc<SharedControls>,
}

impl TreePublisher {
    /// Offer a freshly built tree to the processor.
    ///
    /// Fails with `SwapPending` while a previous tree has not been picked up
    /// and `ProcessorGone` once the processor has been dropped.
    pub fn publish(&self, tree: WdfTree) -> Result<()> {
        // Drain first so retired trees never pile up
        self.collect_retired();
        match self.trees.try_send(Box::new(tree)) {
            Ok(()) => {
                tracing::info!("published wdf tree");
                Ok(())
            }
            Err(TrySendError::Full(_)) => Err(WdfError::SwapPending),
            Err(TrySendError::Disconnected(_)) => Err(WdfError::ProcessorGone),
        }
    }

    /// Drop trees the processor has swapped out. Returns how many.
    pub fn collect_retired(&self) -> usize {
        let mut count = 0;
        while self.retired.try_recv().is_ok() {
            count += 1;
        }
        if count > 0 {
            tracing::debug!("dropped {count} retired tree(s)");
        }
        count
    }

    pub fn controls(&self) -> &SharedControls {
        &self.controls
    }

    pub fn set_volume(&self, volume: f32) {
        self.controls.set_volume(volume);
    }

    pub fn set_filter_enabled(&self, enabled: bool) {
        self.controls.set_filter_enabled(enabled);
    }

    pub fn faults(&self) -> u64 {
        self.controls.faults()
    }
}

/// Audio-side end of the handoff. Never blocks, locks or allocates in
/// [`process_block`](Self::process_block).
#[derive(Debug)]
pub struct RealtimeProcessor {
    tree: Option<Box<WdfTree>>,
    incoming: Receiver<Box<WdfTree>>,
    retired: Sender<Box<WdfTree>>,
    /// Retired tree waiting for room on the return channel
    unreturned: Option<Box<WdfTree>>,
    controls: Arc<SharedControls>,
}

impl RealtimeProcessor {
    pub fn has_tree(&self) -> bool {
        self.tree.is_some()
    }

    pub fn controls(&self) -> &SharedControls {
        &self.controls
    }

    /// Filter one block. `output` must be at least as long as `input`.
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        self.pick_up();

        let volume = self.controls.volume();
        let enabled = self.controls.filter_enabled();
        let mut faults = 0u64;

        match self.tree.as_deref_mut() {
            Some(tree) if enabled => {
                for (x, y) in input.iter().zip(output.iter_mut()) {
                    let (value, degraded) = tree.process_holding(*x);
                    if degraded {
                        faults += 1;
                    }
                    *y = value * volume;
                }
            }
            _ => {
                for (x, y) in input.iter().zip(output.iter_mut()) {
                    *y = x * volume;
                }
            }
        }
        self.controls.add_faults(faults);
    }

    fn pick_up(&mut self) {
        if let Some(old) = self.unreturned.take() {
            self.return_tree(old);
        }
        // A new tree waits in the channel until the retired slot is free
        if self.unreturned.is_some() {
            return;
        }
        match self.incoming.try_recv() {
            Ok(tree) => {
                if let Some(old) = self.tree.replace(tree) {
                    self.return_tree(old);
                }
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => {}
        }
    }

    fn return_tree(&mut self, old: Box<WdfTree>) {
        match self.retired.try_send(old) {
            Ok(()) => {}
            Err(TrySendError::Full(old)) => self.unreturned = Some(old),
            // Publisher is gone; nobody else can free it
            Err(TrySendError::Disconnected(old)) => drop(old),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::{CircuitGraph, ComponentOptions};
    use crate::components::{Component, Resistor, VoltageSource};
    use crate::solver::NewtonRaphson;
    use crate::topology::decompose;

    fn divider(bottom: f64) -> WdfTree {
        let mut g = CircuitGraph::new();
        g.create_edge(
            "V1",
            Component::VoltageSource(VoltageSource::ac(100.0, 1.0).with_resistance(0.0)),
            ComponentOptions::input(),
        )
        .unwrap();
        g.create_edge("R1", Component::Resistor(Resistor::new(1e3)), ComponentOptions::default())
            .unwrap();
        g.create_edge("R2", Component::Resistor(Resistor::new(bottom)), ComponentOptions::output())
            .unwrap();
        g.connect("in", "0", "V1").unwrap();
        g.connect("in", "out", "R1").unwrap();
        g.connect("out", "0", "R2").unwrap();
        let topo = decompose(&g).unwrap();
        crate::wdf::build(&g, &topo, 1.0 / 48000.0, NewtonRaphson::new()).unwrap()
    }

    #[test]
    fn test_passthrough_without_tree() {
        let (publisher, mut processor) = channel(None);
        publisher.set_volume(0.5);
        let mut out = [0.0f32; 3];
        processor.process_block(&[1.0, 2.0, -4.0], &mut out);
        assert_eq!(out, [0.5, 1.0, -2.0]);
        assert!(!processor.has_tree());
    }

    #[test]
    fn test_swap_at_block_boundary() {
        let (publisher, mut processor) = channel(Some(divider(1e3)));
        let mut out = [0.0f32; 1];

        processor.process_block(&[1.0], &mut out);
        assert!((out[0] - 0.5).abs() < 1e-6);

        // 3k over 1k gives 0.75
        publisher.publish(divider(3e3)).unwrap();
        processor.process_block(&[1.0], &mut out);
        assert!((out[0] - 0.75).abs() < 1e-6);

        assert_eq!(publisher.collect_retired(), 1);
    }

    #[test]
    fn test_second_publish_is_pending() {
        let (publisher, _processor) = channel(None);
        publisher.publish(divider(1e3)).unwrap();
        assert!(matches!(
            publisher.publish(divider(2e3)),
            Err(WdfError::SwapPending)
        ));
    }

    #[test]
    fn test_processor_gone() {
        let (publisher, processor) = channel(None);
        drop(processor);
        assert!(matches!(
            publisher.publish(divider(1e3)),
            Err(WdfError::ProcessorGone)
        ));
    }

    #[test]
    fn test_full_return_channel_defers_swap() {
        let (publisher, mut processor) = channel(Some(divider(1e3)));
        for _ in 0..RETIRED_CAPACITY {
            processor.retired.try_send(Box::new(divider(1e3))).unwrap();
        }
        let mut out = [0.0f32; 1];

        // Swapped in; the old tree cannot be returned yet
        publisher.trees.try_send(Box::new(divider(2e3))).unwrap();
        processor.process_block(&[1.0], &mut out);
        assert!((out[0] - 2.0 / 3.0).abs() < 1e-6);
        assert!(processor.unreturned.is_some());

        // Not picked up while the retired slot is occupied
        publisher.trees.try_send(Box::new(divider(3e3))).unwrap();
        processor.process_block(&[1.0], &mut out);
        assert!((out[0] - 2.0 / 3.0).abs() < 1e-6);
        assert_eq!(processor.incoming.len(), 1);

        assert_eq!(publisher.collect_retired(), RETIRED_CAPACITY);
        processor.process_block(&[1.0], &mut out);
        assert!((out[0] - 0.75).abs() < 1e-6);
        assert!(processor.unreturned.is_none());
        assert_eq!(publisher.collect_retired(), 2);
    }

    #[test]
    fn test_bypass() {
        let (publisher, mut processor) = channel(Some(divider(1e3)));
        publisher.set_filter_enabled(false);
        let mut out = [0.0f32; 2];
        processor.process_block(&[0.8, -0.2], &mut out);
        assert_eq!(out, [0.8, -0.2]);
        assert_eq!(publisher.faults(), 0);
    }
}
