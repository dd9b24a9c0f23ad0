//! A fixed-topology feed-forward pipeline executed twice over one weight
//! stream: forward, a pseudo-backward hand-off, then forward again. Each
//! layer runs as an isolated stage task chained by length-prefixed byte
//! channels; each neuron within a stage computes concurrently.

pub mod channel;
pub mod compute;
pub mod error;
pub mod pipeline;
pub mod report;
pub mod stage;
pub mod topology;
pub mod weights;

pub use error::{PipelineErr, Result};
pub use pipeline::PipelineOrchestrator;
pub use report::{ReportHandle, ReportRecord, ReportSink};
pub use topology::NetworkConfig;
pub use weights::WeightStream;
