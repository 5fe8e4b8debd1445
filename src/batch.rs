//! Offline processing of whole buffers.
//!
//! The batch driver runs exactly the same per-sample evaluation as the
//! real-time path, so both produce identical output for identical input.

use crate::audio::{AudioDecoder, AudioSink, BLOCK_SIZE};
use crate::error::{Result, WdfError};
use crate::progress::ProgressObserver;
use crate::wdf::WdfTree;

/// Samples between two progress reports.
pub const PROGRESS_INTERVAL: usize = 441;

/// Summary of one offline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Samples processed
    pub samples: usize,
    /// Samples that held the previous output after a nonlinear fault
    pub degraded: usize,
}

/// Filter `input` into `output` (equal length).
pub fn process_into(tree: &mut WdfTree, input: &[f32], output: &mut [f32]) -> Result<BatchReport> {
    process_observed(tree, input, output, &mut crate::progress::NoProgress)
}

/// Filter `input` into a new buffer.
pub fn process_buffer(tree: &mut WdfTree, input: &[f32]) -> Result<(Vec<f32>, BatchReport)> {
    let mut output = vec![0.0; input.len()];
    let report = process_into(tree, input, &mut output)?;
    Ok((output, report))
}

/// Filter `input` into `output`, reporting progress every
/// [`PROGRESS_INTERVAL`] samples.
pub fn process_observed(
    tree: &mut WdfTree,
    input: &[f32],
    output: &mut [f32],
    observer: &mut dyn ProgressObserver,
) -> Result<BatchReport> {
    if input.is_empty() {
        return Err(WdfError::EmptyBuffer);
    }
    if output.len() != input.len() {
        return Err(WdfError::InvalidSimulationParam {
            message: format!(
                "output buffer holds {} samples, input has {}",
                output.len(),
                input.len()
            ),
        });
    }

    let total = input.len();
    let mut report = BatchReport::default();
    for (n, (x, y)) in input.iter().zip(output.iter_mut()).enumerate() {
        let (value, degraded) = tree.process_holding(*x);
        *y = value;
        report.samples += 1;
        if degraded {
            report.degraded += 1;
        }
        if (n + 1) % PROGRESS_INTERVAL == 0 {
            observer.samples_processed(n + 1, total);
        }
    }
    observer.samples_processed(total, total);

    if report.degraded > 0 {
        tracing::warn!(
            degraded = report.degraded,
            samples = report.samples,
            "nonlinear solve failed on some samples"
        );
    }
    Ok(report)
}

/// Decode everything from `decoder`, filter it, and write it to `sink`.
pub fn run(
    tree: &mut WdfTree,
    decoder: &mut dyn AudioDecoder,
    sink: &mut dyn AudioSink,
    observer: &mut dyn ProgressObserver,
) -> Result<BatchReport> {
    let input = decoder.decode_all()?;
    tracing::info!(
        samples = input.len(),
        sample_rate = decoder.sample_rate(),
        "decoded input"
    );
    let mut output = vec![0.0; input.len()];
    let report = process_observed(tree, &input, &mut output, observer)?;
    for block in output.chunks(BLOCK_SIZE) {
        sink.write_block(block)?;
    }
    sink.flush()?;
    Ok(report)
}
