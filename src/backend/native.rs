use std::{ops::ControlFlow, path::Path, sync::Arc};

use log::debug;
use machine_learning::{
    MlErr,
    arch::{ModelBuilder, Sequential},
    dataset::Dataset,
    spec::{ActFnSpec, LayerSpec, LossFnSpec, ModelSpec, OptimizerSpec, TrainerSpec},
    storage::{Artifact, FileStore, MemoryStore, ModelStore},
    training::TrainerBuilder,
};
use ndarray::ArrayView2;
use rand::{SeedableRng, rngs::StdRng};
use tokio_util::sync::CancellationToken;

use super::{Backend, FitSchedule};
use crate::{
    config::ModelConfig,
    dataset::TrainingSet,
    error::{PredictorErr, Result},
    kind::ModelKind,
};

/// The in-workspace `machine_learning` crate behind the `Backend` trait.
#[derive(Clone)]
pub struct NdarrayBackend {
    store: Arc<dyn ModelStore>,
}

impl NdarrayBackend {
    pub fn new(store: Arc<dyn ModelStore>) -> Self {
        Self { store }
    }

    /// A backend whose models are lost with the process.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    /// A backend persisting its models under `dir`.
    pub fn with_file_store<P: AsRef<Path>>(dir: P) -> Result<Self> {
        Ok(Self::new(Arc::new(FileStore::new(dir)?)))
    }

    /// The layer layout of each kind.
    pub fn model_spec(kind: ModelKind, config: &ModelConfig) -> ModelSpec {
        let units = config.units;

        let layers = match kind {
            ModelKind::Sequence => vec![
                LayerSpec::Lstm {
                    input: 1,
                    units,
                    steps: config.window,
                    return_sequences: true,
                },
                LayerSpec::Lstm {
                    input: units,
                    units,
                    steps: config.window,
                    return_sequences: false,
                },
                LayerSpec::Dense {
                    dim: (units, 1),
                    act_fn: Some(ActFnSpec::Relu),
                },
            ],
            ModelKind::Feedforward => vec![
                LayerSpec::Dense {
                    dim: (config.window, units),
                    act_fn: Some(ActFnSpec::Relu),
                },
                LayerSpec::Dense {
                    dim: (units, 1),
                    act_fn: Some(ActFnSpec::Relu),
                },
            ],
        };

        ModelSpec::Sequential { layers }
    }
}

impl Backend for NdarrayBackend {
    type Model = Sequential;

    fn build(&self, kind: ModelKind, config: &ModelConfig, seed: Option<u64>) -> Result<Sequential> {
        let mut rng = match seed {
            Some(n) => StdRng::seed_from_u64(n),
            None => StdRng::from_os_rng(),
        };

        let spec = Self::model_spec(kind, config);
        Ok(ModelBuilder::new().build(&spec, &mut rng)?)
    }

    fn fit(
        &self,
        model: &mut Sequential,
        examples: TrainingSet,
        schedule: FitSchedule,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        let window = examples.window();
        let mut dataset = Dataset::new(examples.into_data(), window, 1)?;

        let spec = TrainerSpec {
            optimizer: OptimizerSpec::adam(schedule.learning_rate),
            loss: LossFnSpec::Mse,
            epochs: schedule.epochs,
            batch_size: schedule.batch_size,
            seed: schedule.seed,
        };
        let mut trainer = TrainerBuilder::new().build(&spec, model.size())?;

        debug!(examples = dataset.len(), epochs = schedule.epochs; "fitting model");

        let mut hook = |_epoch: usize| {
            if cancel.is_cancelled() {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        };

        trainer
            .fit(model, &mut dataset, &mut hook)
            .map_err(|e| match e {
                MlErr::Interrupted { .. } => PredictorErr::Cancelled,
                e => e.into(),
            })
    }

    fn infer(&self, model: &Sequential, input: &[f32]) -> Result<f32> {
        let x = ArrayView2::from_shape((1, input.len()), input).map_err(MlErr::from)?;
        let y = model.predict(x)?;

        y.iter().next().copied().ok_or(PredictorErr::Backend(MlErr::SizeMismatch {
            what: "model output",
            got: 0,
            expected: 1,
        }))
    }

    fn save(&self, model: &Sequential, key: &str) -> Result<()> {
        Ok(self.store.save(key, &Artifact::from_model(model))?)
    }

    fn load(&self, key: &str) -> Result<Option<Sequential>> {
        match self.store.load(key)? {
            Some(artifact) => Ok(Some(artifact.into_model()?)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.store.list()?)
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.store.remove(key)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observation::Observation;

    fn small(window: usize) -> ModelConfig {
        ModelConfig {
            threshold: 20,
            window,
            history_limit: None,
            units: 4,
            epochs: 3,
            batch_size: 4,
        }
    }

    fn examples(window: usize) -> TrainingSet {
        let history: Vec<Observation> = (0..24)
            .map(|i| Observation::new((i * 7 % 10) as u8).unwrap())
            .collect();

        TrainingSet::build(&history, window, None).unwrap()
    }

    fn schedule() -> FitSchedule {
        FitSchedule {
            epochs: 3,
            batch_size: 4,
            learning_rate: 0.01,
            seed: Some(3),
        }
    }

    #[test]
    fn layouts_match_each_kind() {
        let sequence = NdarrayBackend::model_spec(ModelKind::Sequence, &ModelConfig::sequence());
        let ModelSpec::Sequential { layers } = sequence;
        assert_eq!(layers.len(), 3);
        assert_eq!(layers[0].input_size(), 10);
        assert_eq!(layers[2].output_size(), 1);

        let feedforward =
            NdarrayBackend::model_spec(ModelKind::Feedforward, &ModelConfig::feedforward());
        let ModelSpec::Sequential { layers } = feedforward;
        assert_eq!(layers[0].output_size(), 16);
    }

    #[test]
    fn fit_reports_every_epoch() {
        let backend = NdarrayBackend::in_memory();
        let mut model = backend
            .build(ModelKind::Sequence, &small(5), Some(1))
            .unwrap();

        let losses = backend
            .fit(&mut model, examples(5), schedule(), &CancellationToken::new())
            .unwrap();

        assert_eq!(losses.len(), 3);
        assert!(losses.iter().all(|l| l.is_finite()));
        assert!(backend.infer(&model, &[0.5; 5]).unwrap().is_finite());
    }

    #[test]
    fn a_cancelled_fit_stops() {
        let backend = NdarrayBackend::in_memory();
        let mut model = backend
            .build(ModelKind::Feedforward, &small(1), Some(1))
            .unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = backend
            .fit(&mut model, examples(1), schedule(), &cancel)
            .unwrap_err();
        assert!(matches!(err, PredictorErr::Cancelled));
    }

    #[test]
    fn wrong_input_widths_fail_inference() {
        let backend = NdarrayBackend::in_memory();
        let model = backend
            .build(ModelKind::Feedforward, &small(1), Some(1))
            .unwrap();

        assert!(backend.infer(&model, &[0.1, 0.2]).is_err());
    }

    #[test]
    fn saved_models_are_listed_and_restored() {
        let backend = NdarrayBackend::in_memory();
        let model = backend
            .build(ModelKind::Feedforward, &small(1), Some(1))
            .unwrap();

        backend
            .save(&model, ModelKind::Feedforward.storage_key())
            .unwrap();

        assert_eq!(backend.list().unwrap(), vec!["feedforward-prediction-model"]);
        let restored = backend
            .load(ModelKind::Feedforward.storage_key())
            .unwrap()
            .unwrap();
        assert_eq!(restored.params(), model.params());
        assert!(backend.load("missing").unwrap().is_none());

        assert!(backend.remove(ModelKind::Feedforward.storage_key()).unwrap());
        assert!(backend.list().unwrap().is_empty());
        assert!(!backend.remove(ModelKind::Feedforward.storage_key()).unwrap());
    }
}
