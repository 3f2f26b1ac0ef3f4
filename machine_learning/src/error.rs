use std::{
    error::Error,
    fmt::{self, Display},
    io,
};

use ndarray::ShapeError;
use safetensors::SafeTensorError;

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
    ShapeMismatch {
        what: &'static str,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    OddChannels {
        got: usize,
    },
    NoForwardPass {
        layer: &'static str,
    },
    InvalidDistribution(String),
    NonFiniteLoss {
        epoch: usize,
        step: usize,
        loss: f32,
    },
    GeneratorExhausted {
        split: &'static str,
        epoch: usize,
        step: usize,
    },
    Checkpoint(String),
    Reshape(ShapeError),
    Io(io::Error),
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
                "there's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "shape mismatch for {what}: got {got:?}, expected {expected:?}"
            ),
            MlErr::OddChannels { got } => write!(
                f,
                "complex tensors need an even amount of channels, got {got}"
            ),
            MlErr::NoForwardPass { layer } => {
                write!(f, "backward called on a {layer} layer before any forward pass")
            }
            MlErr::InvalidDistribution(msg) => write!(f, "invalid distribution: {msg}"),
            MlErr::NonFiniteLoss { epoch, step, loss } => {
                write!(f, "loss became {loss} at epoch {epoch}, step {step}")
            }
            MlErr::GeneratorExhausted { split, epoch, step } => write!(
                f,
                "the {split} batch source ran dry at epoch {epoch}, step {step}"
            ),
            MlErr::Checkpoint(msg) => write!(f, "checkpoint error: {msg}"),
            MlErr::Reshape(e) => write!(f, "reshape error: {e}"),
            MlErr::Io(e) => write!(f, "io error: {e}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Io(e) => Some(e),
            MlErr::Reshape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for MlErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SafeTensorError> for MlErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Checkpoint(format!("{value:?}"))
    }
}

impl From<serde_json::Error> for MlErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Io(value.into())
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Reshape(value)
    }
}
