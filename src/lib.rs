pub mod backend;
pub mod config;
pub mod dataset;
pub mod error;
pub mod kind;
pub mod notify;
pub mod observation;
pub mod prediction;
pub mod predictor;
pub mod registry;
pub mod source;
pub mod training;

pub use config::{ModelConfig, PredictorConfig};
pub use error::{PredictorErr, Result};
pub use kind::ModelKind;
pub use observation::Observation;
pub use predictor::Predictor;
