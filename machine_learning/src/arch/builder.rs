use rand::Rng;

use super::{Sequential, activations::ActFn, layers::Layer};
use crate::{
    MlErr, Result,
    spec::{LayerSpec, ModelSpec},
};

/// Builds `Sequential` models given a specification.
#[derive(Debug, Default)]
pub struct ModelBuilder;

impl ModelBuilder {
    /// Creates a new `ModelBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a freshly initialized model following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the model.
    /// * `rng` - The random number generator used to initialize the parameters.
    pub fn build<R: Rng + ?Sized>(&self, spec: &ModelSpec, rng: &mut R) -> Result<Sequential> {
        let layers = self.resolve_layers(spec)?;

        let mut params = Vec::with_capacity(layers.iter().map(Layer::size).sum());
        for layer in &layers {
            params.extend(layer.init_params(rng)?);
        }

        Sequential::new(layers, params)
    }

    /// Rebuilds a model from a spec and previously trained parameters.
    ///
    /// # Arguments
    /// * `spec` - The specification for the model.
    /// * `params` - The flat parameter buffer.
    pub fn restore(&self, spec: &ModelSpec, params: Vec<f32>) -> Result<Sequential> {
        let layers = self.resolve_layers(spec)?;
        Sequential::new(layers, params)
    }

    fn resolve_layers(&self, spec: &ModelSpec) -> Result<Vec<Layer>> {
        match spec {
            ModelSpec::Sequential { layers } => {
                self.validate(layers)?;
                Ok(layers.iter().map(|ls| self.resolve_layer(*ls)).collect())
            }
        }
    }

    fn resolve_layer(&self, spec: LayerSpec) -> Layer {
        match spec {
            LayerSpec::Dense { dim, act_fn } => Layer::dense(dim, act_fn.map(ActFn::from)),
            LayerSpec::Lstm {
                input,
                units,
                steps,
                return_sequences,
            } => Layer::lstm(input, units, steps, return_sequences),
        }
    }

    fn validate(&self, layers: &[LayerSpec]) -> Result<()> {
        if layers.is_empty() {
            return Err(MlErr::InvalidSpec(
                "model must have at least one layer".into(),
            ));
        }

        for (i, layer) in layers.iter().enumerate() {
            if layer.input_size() == 0 || layer.output_size() == 0 {
                return Err(MlErr::InvalidSpec(format!("layer {i}: has a zero sized dimension")));
            }
        }

        // Adjacent layers must have compatible dimensions
        for i in 1..layers.len() {
            let prev_m = layers[i - 1].output_size();
            let curr_n = layers[i].input_size();

            if prev_m != curr_n {
                return Err(MlErr::InvalidSpec(format!(
                    "layer {i}: input size ({curr_n}) does not match \
                     previous layer output size ({prev_m})"
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::spec::ActFnSpec;

    fn feedforward() -> ModelSpec {
        ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Dense {
                    dim: (1, 16),
                    act_fn: Some(ActFnSpec::Relu),
                },
                LayerSpec::Dense {
                    dim: (16, 1),
                    act_fn: Some(ActFnSpec::Relu),
                },
            ],
        }
    }

    #[test]
    fn build_initializes_every_parameter() {
        let mut rng = StdRng::seed_from_u64(0);
        let model = ModelBuilder::new().build(&feedforward(), &mut rng).unwrap();

        assert_eq!(model.size(), 2 * 16 + 17);
        assert_eq!(model.spec(), feedforward());
    }

    #[test]
    fn incompatible_layers_are_rejected() {
        let spec = ModelSpec::Sequential {
            layers: vec![
                LayerSpec::Lstm {
                    input: 1,
                    units: 8,
                    steps: 10,
                    return_sequences: true,
                },
                LayerSpec::Dense {
                    dim: (8, 1),
                    act_fn: None,
                },
            ],
        };

        let mut rng = StdRng::seed_from_u64(0);
        let err = ModelBuilder::new().build(&spec, &mut rng).unwrap_err();
        assert!(matches!(err, MlErr::InvalidSpec(_)));
    }

    #[test]
    fn restore_keeps_the_given_parameters() {
        let params: Vec<f32> = (0..49).map(|i| i as f32).collect();
        let model = ModelBuilder::new()
            .restore(&feedforward(), params.clone())
            .unwrap();

        assert_eq!(model.params(), params.as_slice());
        assert!(ModelBuilder::new().restore(&feedforward(), vec![0.; 3]).is_err());
    }
}
