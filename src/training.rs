use std::{fmt, sync::Arc};

use log::{error, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    backend::{Backend, FitSchedule},
    config::PredictorConfig,
    dataset::TrainingSet,
    error::{PredictorErr, Result},
    kind::ModelKind,
    notify::{Notifier, Severity},
    observation::Observation,
    registry::ModelRegistry,
};

/// Why a kind was not trained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InsufficientData { have: usize, need: usize },
    AlreadyTrained,
    InProgress,
}

/// What happened to a single kind during a training pass.
#[derive(Debug)]
pub enum TrainingOutcome {
    Skipped(SkipReason),
    Trained {
        epochs: usize,
        final_loss: f32,
        /// Whether the model also made it to storage.
        persisted: bool,
    },
    Failed(PredictorErr),
    Cancelled,
}

impl TrainingOutcome {
    pub fn is_trained(&self) -> bool {
        matches!(self, TrainingOutcome::Trained { .. })
    }
}

/// The outcome of every kind in a training pass.
#[derive(Debug)]
pub struct TrainingReport {
    pub sequence: TrainingOutcome,
    pub feedforward: TrainingOutcome,
}

impl TrainingReport {
    pub fn outcome(&self, kind: ModelKind) -> &TrainingOutcome {
        match kind {
            ModelKind::Sequence => &self.sequence,
            ModelKind::Feedforward => &self.feedforward,
        }
    }
}

impl fmt::Display for TrainingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, kind) in ModelKind::ALL.into_iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }

            match self.outcome(kind) {
                TrainingOutcome::Skipped(reason) => write!(f, "{kind}: skipped ({reason:?})")?,
                TrainingOutcome::Trained {
                    epochs, final_loss, ..
                } => write!(f, "{kind}: trained {epochs} epochs, loss {final_loss}")?,
                TrainingOutcome::Failed(e) => write!(f, "{kind}: failed ({e})")?,
                TrainingOutcome::Cancelled => write!(f, "{kind}: cancelled")?,
            }
        }

        Ok(())
    }
}

/// Decides which kinds need training and trains them.
pub struct TrainingPolicy<B: Backend> {
    registry: Arc<ModelRegistry<B>>,
    backend: Arc<B>,
    notifier: Arc<dyn Notifier>,
    config: Arc<PredictorConfig>,
    cancel: CancellationToken,
}

impl<B: Backend> TrainingPolicy<B> {
    pub fn new(
        registry: Arc<ModelRegistry<B>>,
        backend: Arc<B>,
        notifier: Arc<dyn Notifier>,
        config: Arc<PredictorConfig>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            registry,
            backend,
            notifier,
            config,
            cancel,
        }
    }

    /// Trains every kind that has enough observations and no model yet. Both kinds train
    /// concurrently and a failure in one does not affect the other.
    ///
    /// # Arguments
    /// * `observations` - The history, newest first.
    pub async fn train(&self, observations: &[Observation]) -> TrainingReport {
        let (sequence, feedforward) = tokio::join!(
            self.train_kind(ModelKind::Sequence, observations),
            self.train_kind(ModelKind::Feedforward, observations),
        );

        TrainingReport {
            sequence,
            feedforward,
        }
    }

    async fn train_kind(&self, kind: ModelKind, observations: &[Observation]) -> TrainingOutcome {
        let config = self.config.model(kind);

        if observations.len() < config.threshold {
            return TrainingOutcome::Skipped(SkipReason::InsufficientData {
                have: observations.len(),
                need: config.threshold,
            });
        }

        if self.registry.is_present(kind) {
            return TrainingOutcome::Skipped(SkipReason::AlreadyTrained);
        }

        let Some(_guard) = self.registry.try_begin_training(kind) else {
            return TrainingOutcome::Skipped(SkipReason::InProgress);
        };

        // A run may have finished between the check above and taking the guard
        if self.registry.is_present(kind) {
            return TrainingOutcome::Skipped(SkipReason::AlreadyTrained);
        }

        if self.cancel.is_cancelled() {
            return TrainingOutcome::Cancelled;
        }

        self.notifier.notify(
            &format!("Training {} AI model...", kind.label()),
            Severity::Info,
        );

        match self.fit(kind, observations).await {
            // The last epoch may have finished after a shutdown
            Ok(_) if self.cancel.is_cancelled() => self.cancelled(kind),
            Ok((model, losses)) => self.store(kind, model, losses).await,
            Err(PredictorErr::Cancelled) => self.cancelled(kind),
            Err(e) => {
                error!(kind = kind.label(); "training failed: {e}");
                self.notifier.notify(
                    &format!("Error training {} model. Check the logs.", kind.label()),
                    Severity::Error,
                );
                TrainingOutcome::Failed(e)
            }
        }
    }

    /// Builds the examples and fits a fresh model on the blocking pool.
    async fn fit(
        &self,
        kind: ModelKind,
        observations: &[Observation],
    ) -> Result<(B::Model, Vec<f32>)> {
        let config = self.config.model(kind).clone();
        let examples = TrainingSet::build(observations, config.window, config.history_limit)?;
        let seed = self.config.seed.map(|seed| seed.wrapping_add(kind.index() as u64));
        let schedule = FitSchedule {
            epochs: config.epochs,
            batch_size: config.batch_size,
            learning_rate: self.config.learning_rate,
            seed,
        };

        info!(kind = kind.label(), examples = examples.len(); "training model");

        let backend = Arc::clone(&self.backend);
        let cancel = self.cancel.clone();

        tokio::task::spawn_blocking(move || -> Result<(B::Model, Vec<f32>)> {
            let mut model = backend.build(kind, &config, seed)?;
            let losses = backend.fit(&mut model, examples, schedule, &cancel)?;
            Ok((model, losses))
        })
        .await?
    }

    fn cancelled(&self, kind: ModelKind) -> TrainingOutcome {
        warn!(kind = kind.label(); "training cancelled");
        self.notifier.notify(
            &format!("{} model training was cancelled.", kind.label()),
            Severity::Warning,
        );
        TrainingOutcome::Cancelled
    }

    /// Publishes a trained model and persists it. A failed save keeps the model in memory.
    async fn store(&self, kind: ModelKind, model: B::Model, losses: Vec<f32>) -> TrainingOutcome {
        let model = Arc::new(model);
        self.registry.set(kind, Arc::clone(&model));

        // Shutdown cancels before clearing, so a set racing the clear is undone here
        if self.cancel.is_cancelled() {
            self.registry.withdraw(kind, &model);
            return self.cancelled(kind);
        }

        self.notifier.notify(
            &format!("{} model trained and ready!", kind.label()),
            Severity::Success,
        );

        let backend = Arc::clone(&self.backend);
        let saved = tokio::task::spawn_blocking(move || backend.save(&model, kind.storage_key()))
            .await
            .map_err(PredictorErr::from)
            .and_then(|saved| saved);

        let persisted = match saved {
            Ok(()) => true,
            Err(e) => {
                warn!(kind = kind.label(); "could not persist the model: {e}");
                self.notifier.notify(
                    &format!("{} model is ready but could not be saved.", kind.label()),
                    Severity::Warning,
                );
                false
            }
        };

        let final_loss = losses.last().copied().unwrap_or(f32::NAN);
        info!(kind = kind.label(), final_loss = final_loss; "model trained");

        TrainingOutcome::Trained {
            epochs: losses.len(),
            final_loss,
            persisted,
        }
    }
}
