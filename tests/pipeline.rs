use std::io::Cursor;
use std::path::PathBuf;

use neural_pipeline::error::PipelineErr;
use neural_pipeline::pipeline::PipelineOrchestrator;
use neural_pipeline::report::ReportSink;
use neural_pipeline::topology::{NetworkConfig, total_tokens};

/// Writes a comma/whitespace mixed weight source into the system temp dir.
fn temp_source(name: &str, tokens: &[f64]) -> PathBuf {
    let mut path = std::env::temp_dir();
    path.push(format!("neural-pipeline-{}-{name}.txt", std::process::id()));

    let body: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    std::fs::write(&path, body.join(", ")).unwrap();
    path
}

async fn run_to_report(config: NetworkConfig, source: &PathBuf) -> Result<String, PipelineErr> {
    let (handle, writer) = ReportSink::spawn(Cursor::new(Vec::new()));
    let orchestrator = PipelineOrchestrator::new(config, source);
    let result = orchestrator.run(handle).await;

    let cursor = writer.await.unwrap().unwrap();
    result.map(|_| String::from_utf8(cursor.into_inner()).unwrap())
}

#[tokio::test]
async fn end_to_end_single_neuron_pipeline() {
    // Seed [1, 2], input weights [0.5, 0.5], every later weight 1.
    let tokens = [1.0, 2.0, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0];
    let config = NetworkConfig::new(1, 1).unwrap();
    assert_eq!(total_tokens(&config), tokens.len());

    let source = temp_source("e2e", &tokens);
    let report = run_to_report(config, &source).await.unwrap();
    std::fs::remove_file(&source).ok();

    // Pass 1 carries 1.5 through the chain.
    assert!(report.contains("FORWARD PASS 1 - INPUT LAYER COMPUTATION"));
    assert!(report.contains("Input: [1.000000, 2.000000]"));
    assert!(report.contains("  Neuron[0] = 1.500000"));
    assert!(report.contains("FORWARD PASS 1 - OUTPUT LAYER COMPUTATION"));
    assert!(report.contains("  Output[0] = 1.500000"));

    // v = 1.5: fx1 = (2.25 + 1.5 + 1) / 2, fx2 = (2.25 - 1.5) / 2.
    assert!(report.contains("  Neuron[0]: f(x1)=2.375000 | f(x2)=0.375000"));

    // Pass 2 carries fx1 through identity weights to the final output.
    assert!(report.contains("FORWARD PASS 2 - LAYER 1 OUTPUT"));
    assert!(report.contains("FORWARD PASS 2 - FINAL OUTPUT LAYER"));
    assert!(report.contains("  Output[0] = 2.375000"));
    assert!(report.contains("SIMULATION COMPLETED SUCCESSFULLY"));
}

#[tokio::test]
async fn report_records_follow_stage_order() {
    let tokens = [1.0, 2.0, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0];
    let config = NetworkConfig::new(1, 1).unwrap();
    let source = temp_source("order", &tokens);
    let report = run_to_report(config, &source).await.unwrap();
    std::fs::remove_file(&source).ok();

    let headers = [
        "NEURAL NETWORK SIMULATION REPORT",
        "FORWARD PASS 1 - INPUT LAYER COMPUTATION",
        "FORWARD PASS 1 - HIDDEN LAYER 1 COMPUTATION",
        "FORWARD PASS 1 - OUTPUT LAYER COMPUTATION",
        "FORWARD PASS 2 - LAYER 1 OUTPUT",
        "FORWARD PASS 2 - LAYER 2 OUTPUT",
        "FORWARD PASS 2 - FINAL OUTPUT LAYER",
    ];
    let positions: Vec<usize> = headers.iter().map(|h| report.find(h).unwrap()).collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[tokio::test]
async fn exact_token_count_succeeds() {
    let config = NetworkConfig::new(2, 3).unwrap();
    let tokens: Vec<f64> = (0..total_tokens(&config))
        .map(|i| (i % 7) as f64 * 0.25)
        .collect();

    let source = temp_source("exact", &tokens);
    let result = run_to_report(config, &source).await;
    std::fs::remove_file(&source).ok();

    assert!(result.is_ok());
}

#[tokio::test]
async fn one_token_short_fails_with_malformed_weight_data() {
    let config = NetworkConfig::new(2, 3).unwrap();
    let tokens: Vec<f64> = (0..total_tokens(&config) - 1)
        .map(|i| (i % 7) as f64 * 0.25)
        .collect();

    let source = temp_source("short", &tokens);
    let err = run_to_report(config, &source).await.unwrap_err();
    std::fs::remove_file(&source).ok();

    assert!(matches!(err, PipelineErr::MalformedWeightData { .. }));
}

#[tokio::test]
async fn missing_source_fails_before_any_stage_runs() {
    let config = NetworkConfig::new(1, 1).unwrap();
    let source = PathBuf::from("/nonexistent/weights.txt");

    let (handle, writer) = ReportSink::spawn(Cursor::new(Vec::new()));
    let err = PipelineOrchestrator::new(config, &source)
        .run(handle)
        .await
        .unwrap_err();
    let _ = writer.await.unwrap();

    assert!(matches!(err, PipelineErr::WeightSourceUnavailable(_)));
}

#[tokio::test]
async fn injected_backward_transform_feeds_pass_two() {
    let tokens = [1.0, 2.0, 0.5, 0.5, 1.0, 1.0, 1.0, 1.0, 1.0];
    let config = NetworkConfig::new(1, 1).unwrap();
    let source = temp_source("inject", &tokens);

    let (handle, writer) = ReportSink::spawn(Cursor::new(Vec::new()));
    let orchestrator =
        PipelineOrchestrator::new(config, &source).with_backward(|v| (v * 2.0, v));
    orchestrator.run(handle).await.unwrap();

    let cursor = writer.await.unwrap().unwrap();
    let report = String::from_utf8(cursor.into_inner()).unwrap();
    std::fs::remove_file(&source).ok();

    // fx1 = 3.0 flows through pass 2 unchanged by identity weights.
    assert!(report.contains("  Neuron[0]: f(x1)=3.000000 | f(x2)=1.500000"));
    assert!(report.contains("  Output[0] = 3.000000"));
}
