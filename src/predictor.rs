use std::{future::Future, sync::Arc, time::Duration};

use log::{error, info, warn};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    backend::Backend,
    config::PredictorConfig,
    error::Result,
    kind::ModelKind,
    notify::Notifier,
    observation::Observation,
    prediction::{Prediction, PredictionPolicy},
    registry::ModelRegistry,
    source::DataSource,
    training::{TrainingPolicy, TrainingReport},
};

/// Ties the registry and both policies together over a single backend.
pub struct Predictor<B: Backend> {
    config: Arc<PredictorConfig>,
    registry: Arc<ModelRegistry<B>>,
    training: Arc<TrainingPolicy<B>>,
    prediction: PredictionPolicy<B>,
    cancel: CancellationToken,
}

impl<B: Backend> Predictor<B> {
    /// Creates a new `Predictor` with an empty registry.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if `config` does not validate.
    pub fn new(backend: Arc<B>, notifier: Arc<dyn Notifier>, config: PredictorConfig) -> Result<Self> {
        config.validate()?;

        let config = Arc::new(config);
        let cancel = CancellationToken::new();
        let registry = Arc::new(ModelRegistry::new(
            Arc::clone(&backend),
            Arc::clone(&notifier),
        ));

        let training = TrainingPolicy::new(
            Arc::clone(&registry),
            Arc::clone(&backend),
            Arc::clone(&notifier),
            Arc::clone(&config),
            cancel.clone(),
        );
        let prediction = PredictionPolicy::new(
            Arc::clone(&registry),
            backend,
            notifier,
            Arc::clone(&config),
        );

        Ok(Self {
            config,
            registry,
            training: Arc::new(training),
            prediction,
            cancel,
        })
    }

    pub fn config(&self) -> &PredictorConfig {
        &self.config
    }

    pub fn registry(&self) -> &ModelRegistry<B> {
        &self.registry
    }

    /// Cancelling it stops every training run at its next epoch.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Loads the persisted models.
    ///
    /// # Returns
    /// The kinds that were loaded.
    pub async fn start(&self) -> Vec<ModelKind> {
        let loaded = self.registry.load_all().await;
        info!(loaded = loaded.len(); "predictor started");
        loaded
    }

    pub async fn train(&self, observations: &[Observation]) -> TrainingReport {
        self.training.train(observations).await
    }

    pub fn predict(&self, observations: &[Observation]) -> Prediction {
        self.prediction.predict(observations)
    }

    /// Drops the model of `kind` and its persisted copy. The next training pass builds it again.
    pub async fn forget(&self, kind: ModelKind) -> Result<bool> {
        self.registry.forget(kind).await
    }

    /// Trains over a fresh read of `source` on every tick of `period`, until shutdown.
    pub fn spawn_periodic_training<S>(&self, source: S, period: Duration) -> JoinHandle<()>
    where
        S: DataSource + 'static,
    {
        let training = Arc::clone(&self.training);
        let cancel = self.cancel.clone();
        let source = Arc::new(source);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = interval.tick() => {}
                }

                let source = Arc::clone(&source);
                let observations = match tokio::task::spawn_blocking(move || source.observations()).await {
                    Ok(Ok(observations)) => observations,
                    Ok(Err(e)) => {
                        error!("could not read the observations: {e}");
                        continue;
                    }
                    Err(e) => {
                        error!("reading the observations panicked: {e}");
                        continue;
                    }
                };

                let report = training.train(&observations).await;
                info!("periodic training: {report}");
            }

            info!("periodic training stopped");
        })
    }

    /// Trains from `source` until `stop` resolves, then predicts from a fresh read of it.
    ///
    /// With a `period` training repeats on every tick until `stop`. Without one a single pass
    /// runs and `stop` only cancels it early. Models stay loaded; call [`Self::shutdown`] after.
    pub async fn run_until<S, F>(
        &self,
        source: S,
        period: Option<Duration>,
        stop: F,
    ) -> Result<Prediction>
    where
        S: DataSource + Clone + 'static,
        F: Future<Output = ()>,
    {
        match period {
            Some(period) => {
                let task = self.spawn_periodic_training(source.clone(), period);
                stop.await;
                self.cancel.cancel();
                task.await?;
            }
            None => {
                let observations = source.observations()?;
                info!(observations = observations.len(); "training once");

                tokio::select! {
                    report = self.train(&observations) => info!("training finished: {report}"),
                    _ = stop => {
                        warn!("stopped before training finished, cancelling");
                        self.cancel.cancel();
                    }
                }
            }
        }

        let observations = source.observations()?;
        let prediction = self.predict(&observations);
        info!("answered by the {} tier", prediction.tier);

        Ok(prediction)
    }

    /// Cancels every training run and drops the models.
    pub fn shutdown(&self) {
        self.cancel.cancel();
        self.registry.clear();
    }
}
