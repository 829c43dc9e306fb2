#![allow(dead_code)]

use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread,
    time::Duration,
};

use machine_learning::MlErr;
use parking_lot::Mutex;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use tiered_predictor::{
    backend::{Backend, FitSchedule},
    dataset::TrainingSet,
    notify::{ChannelNotifier, Notification},
    ModelConfig, ModelKind, Observation, Predictor, PredictorConfig, PredictorErr, Result,
};

/// A model that always answers the same value, or fails when `output` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct FakeModel {
    pub kind: ModelKind,
    pub output: Option<f32>,
}

impl FakeModel {
    pub fn answering(kind: ModelKind, output: f32) -> Arc<Self> {
        Arc::new(Self {
            kind,
            output: Some(output),
        })
    }

    pub fn failing(kind: ModelKind) -> Arc<Self> {
        Arc::new(Self { kind, output: None })
    }
}

/// A scriptable backend that records what the policies ask of it.
#[derive(Default)]
pub struct FakeBackend {
    pub fits: [AtomicUsize; 2],
    pub epoch_delay: Mutex<Duration>,
    pub failing_fits: Mutex<HashSet<ModelKind>>,
    pub failing_saves: Mutex<bool>,
    pub stored: Mutex<HashMap<String, FakeModel>>,
    pub inputs: Mutex<Vec<Vec<f32>>>,
}

impl FakeBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fits(&self, kind: ModelKind) -> usize {
        let i = match kind {
            ModelKind::Sequence => 0,
            ModelKind::Feedforward => 1,
        };
        self.fits[i].load(Ordering::SeqCst)
    }

    pub fn slow(self: &Arc<Self>, epoch_delay: Duration) -> Arc<Self> {
        *self.epoch_delay.lock() = epoch_delay;
        Arc::clone(self)
    }
}

impl Backend for FakeBackend {
    type Model = FakeModel;

    fn build(&self, kind: ModelKind, _: &ModelConfig, _: Option<u64>) -> Result<FakeModel> {
        Ok(FakeModel {
            kind,
            output: Some(0.5),
        })
    }

    fn fit(
        &self,
        model: &mut FakeModel,
        examples: TrainingSet,
        schedule: FitSchedule,
        cancel: &CancellationToken,
    ) -> Result<Vec<f32>> {
        let i = match model.kind {
            ModelKind::Sequence => 0,
            ModelKind::Feedforward => 1,
        };
        self.fits[i].fetch_add(1, Ordering::SeqCst);

        if self.failing_fits.lock().contains(&model.kind) {
            return Err(MlErr::Diverged { epoch: 0 }.into());
        }

        let delay = *self.epoch_delay.lock();
        let mut losses = Vec::new();

        for epoch in 0..schedule.epochs {
            if cancel.is_cancelled() {
                return Err(PredictorErr::Cancelled);
            }

            thread::sleep(delay);
            losses.push(1. / (epoch + 1) as f32 / examples.len() as f32);
        }

        Ok(losses)
    }

    fn infer(&self, model: &FakeModel, input: &[f32]) -> Result<f32> {
        self.inputs.lock().push(input.to_vec());
        model
            .output
            .ok_or(PredictorErr::Backend(MlErr::InvalidInput("scripted failure")))
    }

    fn save(&self, model: &FakeModel, key: &str) -> Result<()> {
        if *self.failing_saves.lock() {
            return Err(std::io::Error::other("disk full").into());
        }

        self.stored.lock().insert(key.to_string(), model.clone());
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<FakeModel>> {
        Ok(self.stored.lock().get(key).cloned())
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.stored.lock().keys().cloned().collect())
    }

    fn remove(&self, key: &str) -> Result<bool> {
        Ok(self.stored.lock().remove(key).is_some())
    }
}

/// Small thresholds and few epochs so every kind trains quickly.
pub fn quick_config() -> PredictorConfig {
    let mut config = PredictorConfig::default();
    config.seed = Some(7);
    config.sequence.threshold = 40;
    config.sequence.history_limit = Some(40);
    config.sequence.epochs = 3;
    config.feedforward.threshold = 20;
    config.feedforward.epochs = 3;
    config
}

pub fn setup(
    backend: &Arc<FakeBackend>,
    config: PredictorConfig,
) -> (Predictor<FakeBackend>, UnboundedReceiver<Notification>) {
    let (notifier, rx) = ChannelNotifier::new();
    let predictor = Predictor::new(Arc::clone(backend), Arc::new(notifier), config).unwrap();
    (predictor, rx)
}

/// `len` observations, newest first, starting with `head`.
pub fn history(head: &[u8], len: usize) -> Vec<Observation> {
    head.iter()
        .copied()
        .chain((0..).map(|i| (i % 10) as u8))
        .take(len)
        .map(|d| Observation::new(d).unwrap())
        .collect()
}

pub fn drain(rx: &mut UnboundedReceiver<Notification>) -> Vec<Notification> {
    let mut notifications = Vec::new();
    while let Ok(n) = rx.try_recv() {
        notifications.push(n);
    }
    notifications
}
