use std::{error::Error, fmt, io};

/// The crate's result type.
pub type Result<T> = std::result::Result<T, PipelineErr>;

/// Fatal pipeline failures.
///
/// Every variant is terminal for the stage that detects it: the fixed
/// topology guarantees a known token and frame count, so any shortfall is a
/// real inconsistency between the weight source and the chosen layout and is
/// never retried.
#[derive(Debug)]
pub enum PipelineErr {
    ConfigOutOfRange {
        name: &'static str,
        got: usize,
        min: usize,
        max: usize,
    },
    WeightSourceUnavailable(io::Error),
    /// Parse failure or premature end of the weight token stream.
    MalformedWeightData {
        token_index: usize,
        detail: String,
    },
    /// Short read/write or frame count mismatch on a stage channel.
    ChannelProtocolViolation {
        detail: String,
    },
    ComputeAllocationFailure(String),
    ReportSinkUnavailable,
    Io(io::Error),
}

impl fmt::Display for PipelineErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineErr::ConfigOutOfRange {
                name,
                got,
                min,
                max,
            } => write!(
                f,
                "configuration out of range: {name} = {got}, expected {min}..={max}"
            ),
            PipelineErr::WeightSourceUnavailable(e) => {
                write!(f, "weight source unavailable: {e}")
            }
            PipelineErr::MalformedWeightData {
                token_index,
                detail,
            } => write!(f, "malformed weight data at token {token_index}: {detail}"),
            PipelineErr::ChannelProtocolViolation { detail } => {
                write!(f, "channel protocol violation: {detail}")
            }
            PipelineErr::ComputeAllocationFailure(detail) => {
                write!(f, "neuron compute group failure: {detail}")
            }
            PipelineErr::ReportSinkUnavailable => write!(f, "report sink unavailable"),
            PipelineErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for PipelineErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PipelineErr::WeightSourceUnavailable(e) | PipelineErr::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PipelineErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}
