mod native;

use tokio_util::sync::CancellationToken;

pub use native::NdarrayBackend;

use crate::{config::ModelConfig, dataset::TrainingSet, error::Result, kind::ModelKind};

/// How a single fit runs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitSchedule {
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub seed: Option<u64>,
}

/// The tensor capabilities the policies rely on. Every method may block, callers keep them off
/// the async executor.
pub trait Backend: Send + Sync + 'static {
    /// A trained model, shared read-only once it is in the registry.
    type Model: Send + Sync + 'static;

    /// Builds a fresh, untrained model for `kind`.
    ///
    /// # Arguments
    /// * `kind` - Picks the layer layout.
    /// * `config` - The kind's window and width.
    /// * `seed` - Makes the initial weights reproducible when set.
    fn build(&self, kind: ModelKind, config: &ModelConfig, seed: Option<u64>)
        -> Result<Self::Model>;

    /// Fits `model` to `examples`, checking `cancel` between epochs.
    ///
    /// # Returns
    /// The loss of every epoch.
    ///
    /// # Errors
    /// `PredictorErr::Cancelled` if `cancel` fired before the last epoch.
    fn fit(
        &self,
        model: &mut Self::Model,
        examples: TrainingSet,
        schedule: FitSchedule,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>>;

    /// Runs the model over a single input row and returns its scalar output.
    fn infer(&self, model: &Self::Model, input: &[f32]) -> Result<f32>;

    fn save(&self, model: &Self::Model, key: &str) -> Result<()>;

    /// Loads the model persisted under `key`, `None` if there is none.
    fn load(&self, key: &str) -> Result<Option<Self::Model>>;

    /// Lists the keys with a persisted model.
    fn list(&self) -> Result<Vec<String>>;

    /// Deletes the model persisted under `key`.
    ///
    /// # Returns
    /// Whether there was one.
    fn remove(&self, key: &str) -> Result<bool>;
}
