//! Layer descriptors and the weight-segment table.
//!
//! All stages of both passes read from one logical token sequence in a
//! single fixed global order. The table below is computed once from the
//! chosen `(hidden_layers, neurons_per_layer)` pair and handed to each stage
//! at spawn time, so no stage ever re-derives its own skip count.

use crate::error::{PipelineErr, Result};

/// Width of the seed input vector at the head of the source stream. The
/// first-pass input layer reads it as its input and as its weight-row width.
pub const SEED_WIDTH: usize = 2;

pub const MIN_HIDDEN_LAYERS: usize = 1;
pub const MAX_HIDDEN_LAYERS: usize = 9;
pub const MIN_NEURONS: usize = 1;
pub const MAX_NEURONS: usize = 100;

/// Validated pipeline topology parameters.
#[derive(Debug, Clone, Copy)]
pub struct NetworkConfig {
    hidden_layers: usize,
    neurons_per_layer: usize,
}

impl NetworkConfig {
    /// Creates a validated configuration.
    ///
    /// # Errors
    /// `ConfigOutOfRange` unless `hidden_layers` is in `[1, 9]` and
    /// `neurons_per_layer` is in `[1, 100]`.
    pub fn new(hidden_layers: usize, neurons_per_layer: usize) -> Result<Self> {
        if !(MIN_HIDDEN_LAYERS..=MAX_HIDDEN_LAYERS).contains(&hidden_layers) {
            return Err(PipelineErr::ConfigOutOfRange {
                name: "hidden_layers",
                got: hidden_layers,
                min: MIN_HIDDEN_LAYERS,
                max: MAX_HIDDEN_LAYERS,
            });
        }
        if !(MIN_NEURONS..=MAX_NEURONS).contains(&neurons_per_layer) {
            return Err(PipelineErr::ConfigOutOfRange {
                name: "neurons_per_layer",
                got: neurons_per_layer,
                min: MIN_NEURONS,
                max: MAX_NEURONS,
            });
        }
        Ok(Self {
            hidden_layers,
            neurons_per_layer,
        })
    }

    pub fn hidden_layers(&self) -> usize {
        self.hidden_layers
    }

    pub fn neurons_per_layer(&self) -> usize {
        self.neurons_per_layer
    }
}

/// A stage's place in the two-pass topology. Hidden indices are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerRole {
    FirstInput,
    FirstHidden(usize),
    FirstOutput,
    SecondInput,
    SecondHidden(usize),
    SecondOutput,
}

impl LayerRole {
    /// The forward pass this stage belongs to (1 or 2).
    pub fn pass(&self) -> usize {
        match self {
            LayerRole::FirstInput | LayerRole::FirstHidden(_) | LayerRole::FirstOutput => 1,
            LayerRole::SecondInput | LayerRole::SecondHidden(_) | LayerRole::SecondOutput => 2,
        }
    }
}

/// The contiguous token range owned by exactly one stage. `offset` is
/// absolute in the source stream; the seed pair occupies tokens `0..2`, so
/// the first weight segment starts at 2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenSegment {
    pub offset: usize,
    pub len: usize,
}

/// Immutable per-stage parameters, derived once at spawn time.
#[derive(Debug, Clone)]
pub struct LayerDescriptor {
    pub role: LayerRole,
    pub neuron_count: usize,
    pub input_width: usize,
    pub segment: TokenSegment,
}

/// Builds the full two-pass stage list with its segment table.
///
/// Global segment order: first-pass input, first-pass hidden `1..=H`,
/// first-pass output, then the structurally identical second pass. The
/// input layer's rows are `SEED_WIDTH` wide; every later stage receives one
/// value per upstream neuron, so its rows are `N` wide.
pub fn layer_plan(config: &NetworkConfig) -> Vec<LayerDescriptor> {
    let n = config.neurons_per_layer();
    let h = config.hidden_layers();

    let mut roles = Vec::with_capacity(2 * (h + 2));
    roles.push(LayerRole::FirstInput);
    roles.extend((1..=h).map(LayerRole::FirstHidden));
    roles.push(LayerRole::FirstOutput);
    roles.push(LayerRole::SecondInput);
    roles.extend((1..=h).map(LayerRole::SecondHidden));
    roles.push(LayerRole::SecondOutput);

    let mut offset = SEED_WIDTH;
    roles
        .into_iter()
        .map(|role| {
            let input_width = match role {
                LayerRole::FirstInput => SEED_WIDTH,
                _ => n,
            };
            let len = input_width * n;
            let descriptor = LayerDescriptor {
                role,
                neuron_count: n,
                input_width,
                segment: TokenSegment { offset, len },
            };
            offset += len;
            descriptor
        })
        .collect()
}

/// Closed-form total token requirement of the source stream, seed included:
/// `2 + 2N + (2H + 3) * N^2`.
pub fn total_tokens(config: &NetworkConfig) -> usize {
    let n = config.neurons_per_layer();
    let h = config.hidden_layers();
    SEED_WIDTH + 2 * n + (2 * h + 3) * n * n
}
