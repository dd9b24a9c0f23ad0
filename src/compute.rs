//! The intra-stage parallel compute primitive: all neuron dot products of a
//! layer dispatched concurrently, joined, and returned ordered by neuron
//! index. No neuron depends on another neuron's result, so the fan-out has no
//! internal ordering constraint; collecting by index removes any write-write
//! race without serializing the arithmetic.

use rayon::prelude::*;

/// A stage's weight matrix: `neuron_count` rows of `input_width` values,
/// row-major by neuron. Owned exclusively by the stage that read it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightMatrix {
    neuron_count: usize,
    input_width: usize,
    data: Vec<f64>,
}

impl WeightMatrix {
    pub fn new(neuron_count: usize, input_width: usize, data: Vec<f64>) -> Self {
        debug_assert_eq!(data.len(), neuron_count * input_width);
        Self {
            neuron_count,
            input_width,
            data,
        }
    }

    pub fn neuron_count(&self) -> usize {
        self.neuron_count
    }

    pub fn input_width(&self) -> usize {
        self.input_width
    }

    /// Neuron `i`'s weights (contiguous).
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.input_width..(i + 1) * self.input_width]
    }
}

/// Computes every neuron output of a layer concurrently.
///
/// # Args
/// * `input` - The layer's input vector, `input_width` wide.
/// * `weights` - One weight row per neuron.
///
/// # Returns
/// Outputs ordered by neuron index; `output[i]` is the dot product of
/// `input` and row `i`. Index alignment is a correctness requirement for
/// downstream stages, not presentation.
pub fn layer_outputs(input: &[f64], weights: &WeightMatrix) -> Vec<f64> {
    debug_assert_eq!(input.len(), weights.input_width());

    (0..weights.neuron_count())
        .into_par_iter()
        .map(|neuron| dot(input, weights.row(neuron)))
        .collect()
}

fn dot(input: &[f64], row: &[f64]) -> f64 {
    input.iter().zip(row).map(|(x, w)| x * w).sum()
}
