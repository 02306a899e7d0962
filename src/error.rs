use std::fmt;

use machine_learning::MlErr;
use safetensors::SafeTensorError;

pub type Result<T> = std::result::Result<T, TrainErr>;

/// All errors that can occur while training.
#[derive(Debug)]
pub enum TrainErr {
    /// The backend failed: a shape mismatch, an invalid layer, a bad label...
    Ml(MlErr),
    /// An underlying I/O error, reading a config or writing a history file.
    Io(std::io::Error),
    /// A checkpoint couldn't be written or read.
    Checkpoint(String),
    /// Invalid configuration, caught before training starts.
    InvalidConfig(String),
    Json(serde_json::Error),
    /// `accuracy` was asked for no `k` at all, or for `k = 0`.
    InvalidTopK,
    /// The loss of a batch diverged.
    NonFiniteLoss { batch: usize, loss: f32 },
}

impl fmt::Display for TrainErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ml(e) => write!(f, "backend error: {e}"),
            Self::Io(e) => write!(f, "io error: {e}"),
            Self::Checkpoint(msg) => write!(f, "checkpoint error: {msg}"),
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::Json(e) => write!(f, "json error: {e}"),
            Self::InvalidTopK => write!(f, "top-k accuracy needs at least one k, all positive"),
            Self::NonFiniteLoss { batch, loss } => {
                write!(f, "loss diverged to {loss} at batch {batch}")
            }
        }
    }
}

impl std::error::Error for TrainErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Ml(e) => Some(e),
            Self::Io(e) => Some(e),
            Self::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for TrainErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

impl From<std::io::Error> for TrainErr {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for TrainErr {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<SafeTensorError> for TrainErr {
    fn from(e: SafeTensorError) -> Self {
        Self::Checkpoint(e.to_string())
    }
}
