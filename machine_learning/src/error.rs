use std::{
    error::Error,
    fmt::{self, Display},
};

use ndarray::ShapeError;
use rand_distr::{NormalError, uniform::Error as UniformError};

/// The result type used in the entire machine learning module.
pub type Result<T> = std::result::Result<T, MlErr>;

/// The machine learning module's error type.
#[derive(Debug)]
pub enum MlErr {
    /// There is no model registered under this name.
    NotFound { name: String },
    /// A model is already registered under this name.
    DuplicateName { name: String },
    /// The optimizer kind is not one of the supported ones.
    UnsupportedOptimizer { kind: String },
    /// The loss function is not one of the supported ones.
    UnsupportedLoss { kind: String },
    /// A ratio was requested over zero observations.
    DivisionByZero { what: &'static str },
    /// Tried to step the optimizer before configuring one.
    OptimizerNotConfigured,
    /// The requested compute device is not available in this build.
    UnsupportedDevice { device: String },
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
    InvalidLabel {
        label: usize,
        classes: usize,
    },
    Shape(ShapeError),
    Init(String),
}

impl Display for MlErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MlErr::NotFound { name } => write!(f, "There's no model registered as {name}"),
            MlErr::DuplicateName { name } => {
                write!(f, "A model is already registered as {name}")
            }
            MlErr::UnsupportedOptimizer { kind } => {
                write!(f, "No such optimizer {kind}, please use adam or sgd")
            }
            MlErr::UnsupportedLoss { kind } => {
                write!(f, "No such loss {kind}, please use cross_entropy")
            }
            MlErr::DivisionByZero { what } => {
                write!(f, "Cannot compute {what}, no examples were seen")
            }
            MlErr::OptimizerNotConfigured => {
                write!(f, "The optimizer was not configured for this session")
            }
            MlErr::UnsupportedDevice { device } => {
                write!(f, "The device {device} is not supported, only cpu is available")
            }
            MlErr::SizeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a size mismatch for {what}, got {got} and expected {expected}"
            ),
            MlErr::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(
                f,
                "There's a shape mismatch for {what}, got {got:?} and expected {expected:?}"
            ),
            MlErr::InvalidLabel { label, classes } => write!(
                f,
                "The label {label} is out of range for a model with {classes} classes"
            ),
            MlErr::Shape(e) => write!(f, "Invalid tensor shape: {e}"),
            MlErr::Init(msg) => write!(f, "Failed to initialize parameters: {msg}"),
        }
    }
}

impl Error for MlErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            MlErr::Shape(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ShapeError> for MlErr {
    fn from(value: ShapeError) -> Self {
        Self::Shape(value)
    }
}

impl From<NormalError> for MlErr {
    fn from(value: NormalError) -> Self {
        Self::Init(value.to_string())
    }
}

impl From<UniformError> for MlErr {
    fn from(value: UniformError) -> Self {
        Self::Init(value.to_string())
    }
}
