use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{
    error::{PredictorErr, Result},
    kind::ModelKind,
};

pub const STORE_DIR_VAR: &str = "PREDICTOR_STORE_DIR";
pub const SEED_VAR: &str = "PREDICTOR_SEED";
pub const TRAIN_PERIOD_VAR: &str = "PREDICTOR_TRAIN_PERIOD_SECS";

/// Below this many observations the rule-based tier answers with a random digit.
pub const RULE_BASED_MIN: usize = 10;

/// How a single model kind is trained and queried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Observations needed before the kind is trained or used.
    pub threshold: usize,
    /// Observations fed to the model per prediction.
    pub window: usize,
    /// Only the most recent observations are used for training when set.
    pub history_limit: Option<usize>,
    pub units: usize,
    pub epochs: usize,
    pub batch_size: usize,
}

impl ModelConfig {
    pub fn sequence() -> Self {
        Self {
            threshold: 2000,
            window: 10,
            history_limit: Some(2000),
            units: 50,
            epochs: 100,
            batch_size: 32,
        }
    }

    pub fn feedforward() -> Self {
        Self {
            threshold: 50,
            window: 1,
            history_limit: None,
            units: 16,
            epochs: 200,
            batch_size: 8,
        }
    }

    fn validate(&self, kind: ModelKind) -> Result<()> {
        let invalid = |msg: &str| Err(PredictorErr::InvalidConfig(format!("{kind}: {msg}")));

        if self.window == 0 {
            return invalid("window must be at least 1");
        }

        // Training needs at least one window plus its target
        if self.threshold <= self.window {
            return invalid("threshold must be greater than the window");
        }

        if self.history_limit.is_some_and(|limit| limit <= self.window) {
            return invalid("history limit must be greater than the window");
        }

        if self.units == 0 || self.epochs == 0 || self.batch_size == 0 {
            return invalid("units, epochs and batch size must be at least 1");
        }

        Ok(())
    }
}

/// The predictor's configuration, read once at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictorConfig {
    pub sequence: ModelConfig,
    pub feedforward: ModelConfig,
    pub learning_rate: f32,
    /// Makes weight initialization and shuffling reproducible.
    pub seed: Option<u64>,
    /// Clamp rounded model outputs into `[0, 9]` instead of rejecting them.
    pub clamp_output: bool,
    pub store_dir: PathBuf,
    pub train_period_secs: Option<u64>,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            sequence: ModelConfig::sequence(),
            feedforward: ModelConfig::feedforward(),
            learning_rate: 0.001,
            seed: None,
            clamp_output: true,
            store_dir: PathBuf::from("models"),
            train_period_secs: None,
        }
    }
}

impl PredictorConfig {
    /// Reads the configuration file if given, then applies the environment overrides.
    ///
    /// # Errors
    /// Returns `InvalidConfig` if the resulting configuration is unusable.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_json_file(path)?,
            None => Self::default(),
        };

        let config = config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Reads a JSON configuration, missing fields take their default value.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&text)?)
    }

    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_from(|var| std::env::var(var).ok())
    }

    /// Applies the overrides found by `lookup`.
    pub fn apply_env_from<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(STORE_DIR_VAR) {
            self.store_dir = PathBuf::from(dir);
        }

        if let Some(seed) = lookup(SEED_VAR) {
            self.seed = Some(parse_var(SEED_VAR, &seed)?);
        }

        if let Some(secs) = lookup(TRAIN_PERIOD_VAR) {
            self.train_period_secs = Some(parse_var(TRAIN_PERIOD_VAR, &secs)?);
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<()> {
        for kind in ModelKind::ALL {
            self.model(kind).validate(kind)?;
        }

        if !(self.learning_rate.is_finite() && self.learning_rate > 0.) {
            return Err(PredictorErr::InvalidConfig(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }

        if self.train_period_secs == Some(0) {
            return Err(PredictorErr::InvalidConfig(
                "training period must be at least one second".into(),
            ));
        }

        Ok(())
    }

    pub fn model(&self, kind: ModelKind) -> &ModelConfig {
        match kind {
            ModelKind::Sequence => &self.sequence,
            ModelKind::Feedforward => &self.feedforward,
        }
    }

    pub fn train_period(&self) -> Option<Duration> {
        self.train_period_secs.map(Duration::from_secs)
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| PredictorErr::InvalidConfig(format!("{var}: cannot parse '{value}'")))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn defaults_follow_the_model_layouts() {
        let config = PredictorConfig::default();

        assert_eq!(config.sequence.threshold, 2000);
        assert_eq!(config.sequence.window, 10);
        assert_eq!(config.feedforward.threshold, 50);
        assert_eq!(config.feedforward.epochs, 200);
        assert!(config.clamp_output);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn json_fills_missing_fields_with_defaults() {
        let config: PredictorConfig =
            serde_json::from_str(r#"{ "seed": 7, "clamp_output": false }"#).unwrap();

        assert_eq!(config.seed, Some(7));
        assert!(!config.clamp_output);
        assert_eq!(config.sequence, ModelConfig::sequence());
    }

    #[test]
    fn environment_overrides_the_file() {
        let vars = HashMap::from([
            (STORE_DIR_VAR, "/tmp/models"),
            (SEED_VAR, "42"),
            (TRAIN_PERIOD_VAR, "30"),
        ]);

        let config = PredictorConfig::default()
            .apply_env_from(|var| vars.get(var).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.store_dir, PathBuf::from("/tmp/models"));
        assert_eq!(config.seed, Some(42));
        assert_eq!(config.train_period(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn unparsable_variables_are_rejected() {
        let err = PredictorConfig::default()
            .apply_env_from(|var| (var == SEED_VAR).then(|| "soon".to_string()))
            .unwrap_err();

        assert!(matches!(err, PredictorErr::InvalidConfig(_)));
    }

    #[test]
    fn thresholds_must_leave_room_for_a_target() {
        let mut config = PredictorConfig::default();
        config.feedforward.threshold = 1;
        assert!(config.validate().is_err());

        let mut config = PredictorConfig::default();
        config.sequence.history_limit = Some(10);
        assert!(config.validate().is_err());

        let mut config = PredictorConfig::default();
        config.learning_rate = 0.;
        assert!(config.validate().is_err());
    }
}
