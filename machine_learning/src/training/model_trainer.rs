use std::{num::NonZeroUsize, ops::ControlFlow};

use log::debug;
use rand::Rng;

use super::{EpochHook, Trainer};
use crate::{
    MlErr, Result,
    arch::{Sequential, loss::LossFn},
    dataset::Dataset,
    optimization::Optimizer,
};

/// A model `Trainer`. Contains the relevant components needed for training a model.
pub struct ModelTrainer<O, L, R>
where
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    optimizer: O,
    loss_fn: L,

    epochs: usize,
    batch_size: NonZeroUsize,
    rng: R,
}

impl<O, L, R> ModelTrainer<O, L, R>
where
    O: Optimizer,
    L: LossFn,
    R: Rng,
{
    /// Returns a new `ModelTrainer`.
    ///
    /// # Arguments
    /// * `optimizer` - The optimizer used to update the parameters after every batch.
    /// * `epochs` - The amount of epochs to run per `fit` call.
    /// * `batch_size` - The amount of rows in each batch.
    /// * `loss_fn` - The loss function used to measure the difference between a model's output and the expected one.
    /// * `rng` - A random number generator, used to shuffle the dataset.
    pub fn new(optimizer: O, epochs: usize, batch_size: NonZeroUsize, loss_fn: L, rng: R) -> Self {
        Self {
            optimizer,
            loss_fn,
            epochs,
            batch_size,
            rng,
        }
    }

    fn check_fits(&self, model: &Sequential, dataset: &Dataset) -> Result<()> {
        if dataset.x_size() != model.input_size() {
            return Err(MlErr::SizeMismatch {
                what: "dataset inputs",
                got: dataset.x_size(),
                expected: model.input_size(),
            });
        }

        if dataset.y_size() != model.output_size() {
            return Err(MlErr::SizeMismatch {
                what: "dataset targets",
                got: dataset.y_size(),
                expected: model.output_size(),
            });
        }

        Ok(())
    }
}

impl<O, L, R> Trainer for ModelTrainer<O, L, R>
where
    O: Optimizer + Send,
    L: LossFn + Send,
    R: Rng + Send,
{
    fn fit(
        &mut self,
        model: &mut Sequential,
        dataset: &mut Dataset,
        hook: &mut EpochHook<'_>,
    ) -> Result<Vec<f32>> {
        self.check_fits(model, dataset)?;

        let mut losses = Vec::with_capacity(self.epochs);

        for epoch in 0..self.epochs {
            if hook(epoch).is_break() {
                return Err(MlErr::Interrupted { epoch });
            }

            dataset.shuffle(&mut self.rng);
            let batches = dataset.batches(self.batch_size)?;
            let loss = model.backprop(&mut self.optimizer, &self.loss_fn, batches)?;

            if !loss.is_finite() {
                return Err(MlErr::Diverged { epoch });
            }

            debug!(epoch = epoch, loss = loss; "finished epoch");
            losses.push(loss);
        }

        Ok(losses)
    }
}
