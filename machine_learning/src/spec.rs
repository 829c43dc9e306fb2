use serde::{Deserialize, Serialize};

/// The specification for the `ActFn` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActFnSpec {
    Relu,
    Tanh,
}

/// The specification for the `Layer` enum.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerSpec {
    Dense {
        dim: (usize, usize),
        act_fn: Option<ActFnSpec>,
    },
    /// A recurrent layer fed with `steps` consecutive vectors of `input` features, laid out
    /// contiguously in each row.
    Lstm {
        input: usize,
        units: usize,
        steps: usize,
        return_sequences: bool,
    },
}

impl LayerSpec {
    /// Returns the width of the rows this layer consumes.
    pub fn input_size(&self) -> usize {
        match *self {
            LayerSpec::Dense { dim: (n, _), .. } => n,
            LayerSpec::Lstm { input, steps, .. } => input * steps,
        }
    }

    /// Returns the width of the rows this layer produces.
    pub fn output_size(&self) -> usize {
        match *self {
            LayerSpec::Dense { dim: (_, m), .. } => m,
            LayerSpec::Lstm {
                units,
                steps,
                return_sequences,
                ..
            } => {
                if return_sequences {
                    units * steps
                } else {
                    units
                }
            }
        }
    }
}

/// The specification for a model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelSpec {
    Sequential { layers: Vec<LayerSpec> },
}

/// The specification for the `Optimizer` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerSpec {
    Adam {
        learning_rate: f32,
        beta1: f32,
        beta2: f32,
        epsilon: f32,
    },
}

impl OptimizerSpec {
    /// An `Adam` specification with the usual moment decays.
    ///
    /// # Arguments
    /// * `learning_rate` - The step length.
    pub fn adam(learning_rate: f32) -> Self {
        Self::Adam {
            learning_rate,
            beta1: 0.9,
            beta2: 0.999,
            epsilon: 1e-7,
        }
    }
}

/// The specification for the `LossFn` trait.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossFnSpec {
    Mse,
}

/// The specification for a `Trainer`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainerSpec {
    pub optimizer: OptimizerSpec,
    pub loss: LossFnSpec,
    pub epochs: usize,
    pub batch_size: usize,
    pub seed: Option<u64>,
}
