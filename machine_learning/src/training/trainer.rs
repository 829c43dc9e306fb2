use std::ops::ControlFlow;

use crate::{Result, arch::Sequential, dataset::Dataset};

/// Called before every epoch with its index, breaking stops the training.
pub type EpochHook<'a> = dyn FnMut(usize) -> ControlFlow<()> + 'a;

/// The trainer for a model.
pub trait Trainer: Send {
    /// Trains `model` over `dataset` for the configured amount of epochs.
    ///
    /// # Arguments
    /// * `model` - The model to train, its parameters are updated in place.
    /// * `dataset` - The samples to train on, shuffled on every epoch.
    /// * `hook` - Asked before every epoch whether to keep going.
    ///
    /// # Returns
    /// The loss of every epoch, or an error if the training could not finish.
    fn fit(
        &mut self,
        model: &mut Sequential,
        dataset: &mut Dataset,
        hook: &mut EpochHook<'_>,
    ) -> Result<Vec<f32>>;
}
