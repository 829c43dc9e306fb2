use std::{error::Error, fmt, io};

use machine_learning::MlErr;

use crate::observation::ObservationErr;

/// The predictor's result type.
pub type Result<T> = std::result::Result<T, PredictorErr>;

/// Everything that can go wrong while training, loading or querying a model.
#[derive(Debug)]
pub enum PredictorErr {
    Backend(MlErr),
    Observation(ObservationErr),
    InvalidConfig(String),
    Io(io::Error),
    Json(serde_json::Error),
    /// A blocking task panicked or was aborted.
    Task(String),
    Cancelled,
    NonFiniteOutput(f32),
    OutputOutOfRange(f32),
    InsufficientHistory {
        needed: usize,
        got: usize,
    },
}

impl fmt::Display for PredictorErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredictorErr::Backend(e) => write!(f, "backend error: {e}"),
            PredictorErr::Observation(e) => write!(f, "invalid observation: {e}"),
            PredictorErr::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            PredictorErr::Io(e) => write!(f, "io error: {e}"),
            PredictorErr::Json(e) => write!(f, "json error: {e}"),
            PredictorErr::Task(msg) => write!(f, "background task failed: {msg}"),
            PredictorErr::Cancelled => write!(f, "the operation was cancelled"),
            PredictorErr::NonFiniteOutput(y) => write!(f, "the model produced {y}"),
            PredictorErr::OutputOutOfRange(y) => {
                write!(f, "the model output {y} does not map to a digit")
            }
            PredictorErr::InsufficientHistory { needed, got } => write!(
                f,
                "not enough observations, needed {needed} and got {got}"
            ),
        }
    }
}

impl Error for PredictorErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            PredictorErr::Backend(e) => Some(e),
            PredictorErr::Observation(e) => Some(e),
            PredictorErr::Io(e) => Some(e),
            PredictorErr::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for PredictorErr {
    fn from(value: MlErr) -> Self {
        Self::Backend(value)
    }
}

impl From<ObservationErr> for PredictorErr {
    fn from(value: ObservationErr) -> Self {
        Self::Observation(value)
    }
}

impl From<io::Error> for PredictorErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for PredictorErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<tokio::task::JoinError> for PredictorErr {
    fn from(value: tokio::task::JoinError) -> Self {
        Self::Task(value.to_string())
    }
}
