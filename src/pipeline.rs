//! Builds the channel topology for a run and drives both passes.
//!
//! Within a pass the stages form a strict linear chain: stage `k + 1` cannot
//! make progress until stage `k` has produced its frame, so parallelism
//! lives across neurons within a stage, not across stages. Pass 2 starts
//! only after every pass-1 stage has terminated, because its input stage
//! consumes the backward hand-off.

use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use tokio::io::DuplexStream;
use tokio::task::JoinSet;

use crate::channel::stage_channel;
use crate::error::{PipelineErr, Result};
use crate::report::{ReportHandle, ReportRecord};
use crate::stage::{BackwardFn, Stage, StageInput, StageOutput, pseudo_backward};
use crate::topology::{LayerDescriptor, NetworkConfig, layer_plan, total_tokens};
use crate::weights::WeightStream;

pub struct PipelineOrchestrator {
    config: NetworkConfig,
    source: PathBuf,
    backward: BackwardFn,
}

impl PipelineOrchestrator {
    /// Creates an orchestrator over the weight source at `source`.
    pub fn new(config: NetworkConfig, source: impl AsRef<Path>) -> Self {
        Self {
            config,
            source: source.as_ref().to_path_buf(),
            backward: pseudo_backward,
        }
    }

    /// Replaces the pseudo-backward transform.
    pub fn with_backward(mut self, backward: BackwardFn) -> Self {
        self.backward = backward;
        self
    }

    /// Runs both forward passes to completion.
    ///
    /// # Errors
    /// The first fatal stage error; the failing pass is aborted and nothing
    /// is retried. There is no partial success mode.
    pub async fn run(&self, report: ReportHandle) -> Result<()> {
        let plan = layer_plan(&self.config);
        let per_pass = plan.len() / 2;
        let (first_pass, second_pass) = plan.split_at(per_pass);

        debug!(
            stages = plan.len(),
            total_tokens = total_tokens(&self.config);
            "derived layer plan"
        );
        report.append(preamble(&self.config))?;

        let n = self.config.neurons_per_layer();
        let (backward_tx, backward_rx) = stage_channel(n);

        info!(pass = 1usize; "running forward pass");
        self.run_pass(
            first_pass,
            StageInput::Seed,
            StageOutput::Backward(backward_tx),
            &report,
        )
        .await?;

        info!(pass = 2usize; "running forward pass");
        self.run_pass(
            second_pass,
            StageInput::Upstream(backward_rx),
            StageOutput::Terminal,
            &report,
        )
        .await?;

        info!("pipeline completed");
        Ok(())
    }

    /// Spawns one pass's stage chain and waits for every stage to terminate.
    async fn run_pass(
        &self,
        descriptors: &[LayerDescriptor],
        first_input: StageInput<DuplexStream>,
        last_output: StageOutput<DuplexStream>,
        report: &ReportHandle,
    ) -> Result<()> {
        let n = self.config.neurons_per_layer();

        // Channel i links stage i to stage i + 1; the ends of the chain come
        // from the caller.
        let mut inputs = Vec::with_capacity(descriptors.len());
        let mut outputs = Vec::with_capacity(descriptors.len());
        inputs.push(first_input);
        for _ in 1..descriptors.len() {
            let (tx, rx) = stage_channel(n);
            outputs.push(StageOutput::Forward(tx));
            inputs.push(StageInput::Upstream(rx));
        }
        outputs.push(last_output);

        let mut stages: JoinSet<Result<()>> = JoinSet::new();
        for ((descriptor, input), output) in descriptors.iter().zip(inputs).zip(outputs) {
            // Each stage opens its own read-only view of the source and
            // positions itself from the precomputed segment table.
            let weights = WeightStream::open(&self.source)?;
            let stage =
                Stage::new(descriptor.clone(), report.clone()).with_backward(self.backward);
            stages.spawn(stage.run(weights, input, output));
        }

        while let Some(joined) = stages.join_next().await {
            let result = joined
                .map_err(|e| PipelineErr::Io(io::Error::other(format!("stage task failed: {e}"))))
                .and_then(|r| r);

            if let Err(err) = result {
                // Downstream stages cannot proceed without the failed
                // stage's frame; the whole pass is abandoned.
                warn!("aborting pass: {err}");
                stages.abort_all();
                while stages.join_next().await.is_some() {}
                return Err(err);
            }
        }

        Ok(())
    }
}

fn preamble(config: &NetworkConfig) -> ReportRecord {
    let mut record = ReportRecord::new("NEURAL NETWORK SIMULATION REPORT");
    record.push_line("=================================");
    record.push_line(format!(
        "Configuration: {} Hidden Layers | {} Neurons Per Layer",
        config.hidden_layers(),
        config.neurons_per_layer()
    ));
    record
}
