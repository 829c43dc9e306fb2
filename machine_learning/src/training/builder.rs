use std::num::NonZeroUsize;

use rand::{SeedableRng, rngs::StdRng};

use super::{ModelTrainer, Trainer};
use crate::{
    MlErr, Result,
    arch::loss::{LossFn, Mse},
    optimization::{Adam, Optimizer},
    spec::{LossFnSpec, OptimizerSpec, TrainerSpec},
};

/// Builds `Trainer`s given a specification.
#[derive(Default)]
pub struct TrainerBuilder;

impl TrainerBuilder {
    /// Creates a new `TrainerBuilder`.
    pub fn new() -> Self {
        Self
    }

    /// Builds a new `Trainer` following a spec.
    ///
    /// # Arguments
    /// * `spec` - The specification for the trainer.
    /// * `nparams` - The amount of parameters of the model it will train.
    pub fn build(&self, spec: &TrainerSpec, nparams: usize) -> Result<Box<dyn Trainer>> {
        if spec.epochs == 0 {
            return Err(MlErr::InvalidSpec("epochs must be at least 1".into()));
        }

        self.resolve_optimizer(spec, nparams)
    }

    fn resolve_optimizer(&self, spec: &TrainerSpec, nparams: usize) -> Result<Box<dyn Trainer>> {
        match spec.optimizer {
            OptimizerSpec::Adam {
                learning_rate,
                beta1,
                beta2,
                epsilon,
            } => {
                let optimizer = Adam::new(nparams, learning_rate, beta1, beta2, epsilon);
                self.resolve_loss(spec, optimizer)
            }
        }
    }

    fn resolve_loss<O>(&self, spec: &TrainerSpec, optimizer: O) -> Result<Box<dyn Trainer>>
    where
        O: Optimizer + Send + 'static,
    {
        match spec.loss {
            LossFnSpec::Mse => {
                let loss = Mse::new();
                self.terminate_build(spec, optimizer, loss)
            }
        }
    }

    fn terminate_build<O, L>(
        &self,
        spec: &TrainerSpec,
        optimizer: O,
        loss: L,
    ) -> Result<Box<dyn Trainer>>
    where
        O: Optimizer + Send + 'static,
        L: LossFn + Send + 'static,
    {
        let batch_size = NonZeroUsize::new(spec.batch_size)
            .ok_or_else(|| MlErr::InvalidSpec("batch size must be at least 1".into()))?;
        let rng = self.generate_rng(spec.seed);

        let trainer = ModelTrainer::new(optimizer, spec.epochs, batch_size, loss, rng);
        Ok(Box::new(trainer))
    }

    fn generate_rng(&self, seed: Option<u64>) -> StdRng {
        match seed {
            Some(n) => StdRng::seed_from_u64(n),
            None => StdRng::from_os_rng(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(epochs: usize, batch_size: usize) -> TrainerSpec {
        TrainerSpec {
            optimizer: OptimizerSpec::adam(0.001),
            loss: LossFnSpec::Mse,
            epochs,
            batch_size,
            seed: Some(0),
        }
    }

    #[test]
    fn degenerate_specs_are_rejected() {
        let builder = TrainerBuilder::new();

        assert!(builder.build(&spec(0, 8), 10).is_err());
        assert!(builder.build(&spec(5, 0), 10).is_err());
        assert!(builder.build(&spec(5, 8), 10).is_ok());
    }
}
