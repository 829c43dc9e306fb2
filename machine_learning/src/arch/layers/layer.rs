use ndarray::{Array2, ArrayView2};
use rand::Rng;

use super::{Dense, Lstm};
use crate::{Result, arch::activations::ActFn, spec::LayerSpec};

#[derive(Clone, Debug)]
pub enum Layer {
    Dense(Dense),
    Lstm(Lstm),
}
use Layer::*;

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn lstm(input: usize, units: usize, steps: usize, return_sequences: bool) -> Self {
        Self::Lstm(Lstm::new(input, units, steps, return_sequences))
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        match self {
            Dense(l) => l.size(),
            Lstm(l) => l.size(),
        }
    }

    pub fn input_size(&self) -> usize {
        match self {
            Dense(l) => l.dim().0,
            Lstm(l) => l.input_size(),
        }
    }

    pub fn output_size(&self) -> usize {
        match self {
            Dense(l) => l.dim().1,
            Lstm(l) => l.output_size(),
        }
    }

    pub fn spec(&self) -> LayerSpec {
        match self {
            Dense(l) => l.spec(),
            Lstm(l) => l.spec(),
        }
    }

    pub fn init_params<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f32>> {
        match self {
            Dense(l) => l.init_params(rng),
            Lstm(l) => l.init_params(rng),
        }
    }

    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.forward(params, x),
            Lstm(l) => l.forward(params, x),
        }
    }

    pub fn predict(&self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.predict(params, x),
            Lstm(l) => l.predict(params, x),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        match self {
            Dense(l) => l.backward(params, grad, d),
            Lstm(l) => l.backward(params, grad, d),
        }
    }
}
