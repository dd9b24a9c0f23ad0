//! The unit of pipeline execution: one layer's computation in one pass.
//!
//! A stage runs exactly once, straight through its lifecycle: position the
//! weight stream on its own segment, receive its input vector, run the
//! neuron compute group, append its report record, send its output frame and
//! terminate. Failure at any step is fatal and surfaced to the orchestrator
//! unretried.

use std::io::BufRead;

use log::{debug, info};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::task;

use crate::channel::{FrameReceiver, FrameSender};
use crate::compute;
use crate::error::{PipelineErr, Result};
use crate::report::{ReportHandle, ReportRecord};
use crate::topology::{LayerDescriptor, LayerRole, SEED_WIDTH};
use crate::weights::WeightStream;

/// The pseudo-backward transform applied by the terminal first-pass stage:
/// a pure per-element function of a scalar, no learned parameters.
pub type BackwardFn = fn(f64) -> (f64, f64);

/// Default transform: `f(x1) = (x^2 + x + 1) / 2`, `f(x2) = (x^2 - x) / 2`.
/// Both are recorded; only `f(x1)` feeds the second pass.
pub fn pseudo_backward(v: f64) -> (f64, f64) {
    let fx1 = (v * v + v + 1.0) / 2.0;
    let fx2 = (v * v - v) / 2.0;
    (fx1, fx2)
}

/// Where a stage's input vector comes from.
pub enum StageInput<R: AsyncRead + Unpin> {
    /// The seed pair at the head of the source stream (first-pass input
    /// layer only).
    Seed,
    /// The upstream stage's output frame.
    Upstream(FrameReceiver<R>),
}

/// Where a stage's output vector goes.
pub enum StageOutput<W: AsyncWrite + Unpin> {
    /// Forward to the next stage of the same pass.
    Forward(FrameSender<W>),
    /// Apply the backward transform and hand the result to the second pass
    /// (terminal first-pass stage only).
    Backward(FrameSender<W>),
    /// Nothing downstream (terminal second-pass stage).
    Terminal,
}

pub struct Stage {
    desc: LayerDescriptor,
    report: ReportHandle,
    backward: BackwardFn,
}

impl Stage {
    pub fn new(desc: LayerDescriptor, report: ReportHandle) -> Self {
        Self {
            desc,
            report,
            backward: pseudo_backward,
        }
    }

    /// Replaces the backward transform.
    pub fn with_backward(mut self, backward: BackwardFn) -> Self {
        self.backward = backward;
        self
    }

    /// Runs the stage to termination.
    ///
    /// The stage consumes exactly its own token segment (plus the seed pair
    /// when it is the seed stage); every other token belongs to some other
    /// stage and is never read.
    pub async fn run<B, R, W>(
        self,
        mut weights: WeightStream<B>,
        input: StageInput<R>,
        output: StageOutput<W>,
    ) -> Result<()>
    where
        B: BufRead,
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let Stage {
            desc,
            report,
            backward,
        } = self;

        debug!(pass = desc.role.pass(), neurons = desc.neuron_count; "stage spawned");

        let input_vec = match input {
            StageInput::Seed => {
                // The seed pair sits at tokens 0..2, directly ahead of this
                // stage's segment.
                let seed = vec![weights.next()?, weights.next()?];
                weights.skip(desc.segment.offset - SEED_WIDTH)?;
                seed
            }
            StageInput::Upstream(mut rx) => {
                weights.skip(desc.segment.offset)?;
                rx.recv_expected(desc.input_width).await?
            }
        };

        let matrix = weights.read_matrix(desc.neuron_count, desc.input_width)?;
        drop(weights);

        // CPU-bound fan-out runs on the blocking pool; buffers move out and
        // back to satisfy 'static without cloning.
        let (input_vec, outputs) = task::spawn_blocking(move || {
            let outputs = compute::layer_outputs(&input_vec, &matrix);
            (input_vec, outputs)
        })
        .await
        .map_err(|e| {
            PipelineErr::ComputeAllocationFailure(format!("neuron group join failed: {e}"))
        })?;

        match output {
            StageOutput::Forward(mut tx) => {
                report.append(stage_record(&desc, &input_vec, &outputs, None))?;
                tx.send(&outputs).await?;
            }
            StageOutput::Backward(mut tx) => {
                let pairs: Vec<(f64, f64)> = outputs.iter().copied().map(backward).collect();
                report.append(stage_record(&desc, &input_vec, &outputs, Some(&pairs)))?;

                let next_inputs: Vec<f64> = pairs.iter().map(|(fx1, _)| *fx1).collect();
                tx.send(&next_inputs).await?;
            }
            StageOutput::Terminal => {
                report.append(stage_record(&desc, &input_vec, &outputs, None))?;
            }
        }

        info!(pass = desc.role.pass(); "stage terminated");
        Ok(())
    }
}

fn header_for(role: LayerRole) -> String {
    match role {
        LayerRole::FirstInput => "FORWARD PASS 1 - INPUT LAYER COMPUTATION".into(),
        LayerRole::FirstHidden(k) => format!("FORWARD PASS 1 - HIDDEN LAYER {k} COMPUTATION"),
        LayerRole::FirstOutput => "FORWARD PASS 1 - OUTPUT LAYER COMPUTATION".into(),
        LayerRole::SecondInput => "FORWARD PASS 2 - LAYER 1 OUTPUT".into(),
        LayerRole::SecondHidden(k) => format!("FORWARD PASS 2 - LAYER {} OUTPUT", k + 1),
        LayerRole::SecondOutput => "FORWARD PASS 2 - FINAL OUTPUT LAYER".into(),
    }
}

/// Builds the stage's atomic report record; the terminal first-pass stage's
/// record carries the backward block so both land in one append.
fn stage_record(
    desc: &LayerDescriptor,
    input: &[f64],
    outputs: &[f64],
    backward: Option<&[(f64, f64)]>,
) -> ReportRecord {
    let mut record = ReportRecord::new(header_for(desc.role));

    match desc.role {
        LayerRole::FirstInput => {
            record.push_line(format!("Input: [{:.6}, {:.6}]", input[0], input[1]));
            record.push_line("Output:");
            for (i, v) in outputs.iter().enumerate() {
                record.push_line(format!("  Neuron[{i}] = {v:.6}"));
            }
        }
        LayerRole::FirstOutput => {
            record.push_line("Output:");
            for (i, v) in outputs.iter().enumerate() {
                record.push_line(format!("  Output[{i}] = {v:.6}"));
            }
        }
        LayerRole::SecondOutput => {
            record.push_line("Final Output:");
            for (i, v) in outputs.iter().enumerate() {
                record.push_line(format!("  Output[{i}] = {v:.6}"));
            }
        }
        _ => {
            record.push_line("Output:");
            for (i, v) in outputs.iter().enumerate() {
                record.push_line(format!("  Neuron[{i}] = {v:.6}"));
            }
        }
    }

    if let Some(pairs) = backward {
        record.push_line("");
        record.push_line("BACKWARD PASS COMPUTATION");
        record.push_line("Formula 1: f(x1) = (x^2 + x + 1) / 2");
        record.push_line("Formula 2: f(x2) = (x^2 - x) / 2");
        record.push_line("Results:");
        for (i, (fx1, fx2)) in pairs.iter().enumerate() {
            record.push_line(format!("  Neuron[{i}]: f(x1)={fx1:.6} | f(x2)={fx2:.6}"));
        }
    }

    if matches!(desc.role, LayerRole::SecondOutput) {
        record.push_line("");
        record.push_line("SIMULATION COMPLETED SUCCESSFULLY");
    }

    record
}
