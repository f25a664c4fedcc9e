use std::{error::Error, fmt, io};

use machine_learning::MlErr;

/// The trainer module's result type.
pub type Result<T> = std::result::Result<T, TrainerErr>;

/// Trainer runtime failures.
#[derive(Debug)]
pub enum TrainerErr {
    Io(io::Error),
    Ml(MlErr),
    /// The configuration is inconsistent.
    Config(String),
    /// The dataset files are missing or malformed.
    Dataset(String),
    Download {
        url: &'static str,
        reason: String,
    },
    Json(serde_json::Error),
    ThreadPool(rayon::ThreadPoolBuildError),
}

impl fmt::Display for TrainerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrainerErr::Io(e) => write!(f, "io error: {e}"),
            TrainerErr::Ml(e) => write!(f, "machine learning error: {e}"),
            TrainerErr::Config(msg) => write!(f, "invalid config: {msg}"),
            TrainerErr::Dataset(msg) => write!(f, "dataset error: {msg}"),
            TrainerErr::Download { url, reason } => {
                write!(f, "failed to download {url}: {reason}")
            }
            TrainerErr::Json(e) => write!(f, "json error: {e}"),
            TrainerErr::ThreadPool(e) => write!(f, "failed to build the worker pool: {e}"),
        }
    }
}

impl Error for TrainerErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            TrainerErr::Io(e) => Some(e),
            TrainerErr::Ml(e) => Some(e),
            TrainerErr::Json(e) => Some(e),
            TrainerErr::ThreadPool(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for TrainerErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<MlErr> for TrainerErr {
    fn from(value: MlErr) -> Self {
        Self::Ml(value)
    }
}

impl From<serde_json::Error> for TrainerErr {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

impl From<rayon::ThreadPoolBuildError> for TrainerErr {
    fn from(value: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(value)
    }
}

/// Boundary conversion for binaries / I/O APIs.
impl From<TrainerErr> for io::Error {
    fn from(value: TrainerErr) -> Self {
        match value {
            TrainerErr::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}
