use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    SizeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    Shape(ShapeError),
    InvalidSpec(String),
    InvalidInput(&'static str),
    Diverged {
        epoch: usize,
    },
    Interrupted {
        epoch: usize,
    },
    InvalidKey(String),
    CorruptArtifact {
        key: String,
        reason: String,
    },
    Io(io::Error),
    Serde(serde_json::Error),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch in {what}, got {got} and expected {expected}"
            ),
            MlErr::Shape(e) => write!(f, "invalid array shape: {e}"),
            MlErr::InvalidSpec(msg) => write!(f, "invalid model specification: {msg}"),
            MlErr::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            MlErr::Diverged { epoch } => {
                write!(f, "the training loss stopped being finite at epoch {epoch}")
            }
            MlErr::Interrupted { epoch } => {
                write!(f, "the training was interrupted before epoch {epoch}")
            }
            MlErr::InvalidKey(key) => write!(
                f,
                "invalid storage key '{key}', only lowercase letters, digits and '-' are allowed"
            ),
            MlErr::CorruptArtifact { key, reason } => {
                write!(f, "the stored model '{key}' is corrupt: {reason}")
            }
            MlErr::Io(e) => write!(f, "io error: {e}"),
            MlErr::Serde(e) => write!(f, "serialization error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Io(e) => Some(e),
            MlErr::Serde(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for MlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Serde(value)
    }
}
