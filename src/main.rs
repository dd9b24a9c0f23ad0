use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result};
use log::info;
use serde::Deserialize;
use tokio::runtime::Runtime;

use neural_pipeline::{NetworkConfig, PipelineOrchestrator, ReportSink};

/// One run's parameters, read from a JSON file. Range validation happens in
/// `NetworkConfig::new`; the core treats the bounds as preconditions.
#[derive(Debug, Deserialize)]
struct RunSpec {
    input: PathBuf,
    report: PathBuf,
    hidden_layers: usize,
    neurons_per_layer: usize,
}

fn main() {
    env_logger::init();

    if let Err(e) = run() {
        eprintln!("neural-pipeline: {e:#}");
        process::exit(1);
    }
}

fn run() -> Result<()> {
    let path = std::env::args()
        .nth(1)
        .context("usage: neural-pipeline <run.json>")?;
    let raw =
        std::fs::read_to_string(&path).with_context(|| format!("reading run spec {path}"))?;
    let spec: RunSpec =
        serde_json::from_str(&raw).with_context(|| format!("parsing run spec {path}"))?;

    let config = NetworkConfig::new(spec.hidden_layers, spec.neurons_per_layer)?;
    info!(
        hidden_layers = spec.hidden_layers,
        neurons_per_layer = spec.neurons_per_layer;
        "starting pipeline"
    );

    let runtime = Runtime::new()?;
    runtime.block_on(async move {
        let report_file = tokio::fs::File::create(&spec.report)
            .await
            .with_context(|| format!("creating report file {}", spec.report.display()))?;
        let (handle, writer) = ReportSink::spawn(report_file);

        let orchestrator = PipelineOrchestrator::new(config, &spec.input);
        let run_result = orchestrator.run(handle).await;

        // Flush whatever was reported, even on a failed run.
        let flush_result = writer.await.context("report writer task failed")?;

        run_result?;
        flush_result.context("flushing report")?;
        Ok(())
    })
}
