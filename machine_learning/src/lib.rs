pub mod arch;
pub mod dataset;
pub mod device;
pub mod error;
pub mod initialization;
pub mod optimization;
pub mod registry;
pub mod training;
pub mod zoo;

pub use dataset::Batch;
pub use device::Device;
pub use error::{MlErr, Result};
pub use registry::{Constructor, CreatedModel, ModelRegistry};
pub use training::Session;
