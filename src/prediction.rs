use std::{fmt, sync::Arc};

use log::warn;
use parking_lot::Mutex;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    backend::Backend,
    config::{PredictorConfig, RULE_BASED_MIN},
    dataset::prediction_input,
    error::{PredictorErr, Result},
    kind::ModelKind,
    notify::{Notifier, Severity},
    observation::{MAX_DIGIT, Observation},
    registry::ModelRegistry,
};

/// Which tier produced a prediction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Sequence,
    Feedforward,
    RuleBased,
}

impl From<ModelKind> for Tier {
    fn from(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Sequence => Tier::Sequence,
            ModelKind::Feedforward => Tier::Feedforward,
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Sequence => f.write_str("LSTM"),
            Tier::Feedforward => f.write_str("Feedforward"),
            Tier::RuleBased => f.write_str("Rule-Based"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Prediction {
    pub digit: Observation,
    pub tier: Tier,
}

/// Picks the best available tier and predicts the next digit with it.
pub struct PredictionPolicy<B: Backend> {
    registry: Arc<ModelRegistry<B>>,
    backend: Arc<B>,
    notifier: Arc<dyn Notifier>,
    config: Arc<PredictorConfig>,
    rng: Mutex<StdRng>,
}

impl<B: Backend> PredictionPolicy<B> {
    pub fn new(
        registry: Arc<ModelRegistry<B>>,
        backend: Arc<B>,
        notifier: Arc<dyn Notifier>,
        config: Arc<PredictorConfig>,
    ) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };

        Self {
            registry,
            backend,
            notifier,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// Predicts the next digit. Always answers: a model that fails hands over to the next tier.
    ///
    /// # Arguments
    /// * `observations` - The history, newest first.
    pub fn predict(&self, observations: &[Observation]) -> Prediction {
        for kind in ModelKind::ALL {
            if observations.len() < self.config.model(kind).threshold {
                continue;
            }

            let Some(model) = self.registry.get(kind) else {
                continue;
            };

            self.notifier.notify(
                &format!("Using {} AI Model...", kind.label()),
                Severity::Info,
            );

            match self.infer(kind, &model, observations) {
                Ok(digit) => {
                    return Prediction {
                        digit,
                        tier: kind.into(),
                    };
                }
                Err(e) => {
                    warn!(kind = kind.label(); "inference failed, falling back: {e}");
                    self.notifier.notify(
                        &format!("{} model failed, falling back.", kind.label()),
                        Severity::Warning,
                    );
                }
            }
        }

        self.notifier
            .notify("Using Rule-Based Prediction...", Severity::Warning);

        Prediction {
            digit: self.rule_based(observations),
            tier: Tier::RuleBased,
        }
    }

    fn infer(
        &self,
        kind: ModelKind,
        model: &B::Model,
        observations: &[Observation],
    ) -> Result<Observation> {
        let input = prediction_input(observations, self.config.model(kind).window)?;
        let y = self.backend.infer(model, &input)?;

        if !y.is_finite() {
            return Err(PredictorErr::NonFiniteOutput(y));
        }

        let max = f32::from(MAX_DIGIT);
        let scaled = (y * max).round();

        let digit = if self.config.clamp_output {
            scaled.clamp(0., max)
        } else if (0. ..=max).contains(&scaled) {
            scaled
        } else {
            return Err(PredictorErr::OutputOutOfRange(y));
        };

        Ok(Observation::new(digit as u8)?)
    }

    /// A random digit for short histories, otherwise the sum of the two newest mod 10.
    fn rule_based(&self, observations: &[Observation]) -> Observation {
        match observations {
            [newest, second, ..] if observations.len() >= RULE_BASED_MIN => {
                Observation::wrapping(newest.value() + second.value())
            }
            _ => Observation::wrapping(self.rng.lock().random_range(0..=MAX_DIGIT)),
        }
    }
}
