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
    LabelOutOfRange {
        label: usize,
        classes: usize,
    },
    BackwardInEvalMode,
    BackwardBeforeForward {
        layer: &'static str,
    },
    InvalidLayer(String),
    InvalidHyperparameter {
        what: &'static str,
        value: f32,
    },
    EmptyDataset,
    UnknownModel(String),
    Io(io::Error),
    InvalidData {
        line: usize,
        msg: String,
    },
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
            MlErr::Shape(e) => write!(f, "Invalid array shape: {e}"),
            MlErr::LabelOutOfRange { label, classes } => write!(
                f,
                "Label {label} is out of range for a model with {classes} classes"
            ),
            MlErr::BackwardInEvalMode => {
                write!(f, "Tried to run a backward pass with the model in eval mode")
            }
            MlErr::BackwardBeforeForward { layer } => write!(
                f,
                "Tried to run a backward pass on a {layer} layer before any forward pass"
            ),
            MlErr::InvalidLayer(msg) => write!(f, "Invalid layer: {msg}"),
            MlErr::InvalidHyperparameter { what, value } => {
                write!(f, "Invalid value {value} for hyperparameter {what}")
            }
            MlErr::EmptyDataset => write!(f, "The dataset has no samples"),
            MlErr::UnknownModel(name) => write!(f, "Unknown model architecture '{name}'"),
            MlErr::Io(e) => write!(f, "Io error: {e}"),
            MlErr::InvalidData { line, msg } => write!(f, "Invalid data at line {line}: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            MlErr::Io(e) => Some(e),
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
