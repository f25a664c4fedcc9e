pub mod config;
pub mod data;
pub mod error;
pub mod fit;
pub mod metrics;

pub use config::{Cli, DatasetKind, TrainingConfig};
pub use error::{Result, TrainerErr};
pub use fit::{FitReport, list_models, run};
