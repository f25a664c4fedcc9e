mod adam;
mod optimizer;
mod plateau;
mod sgd;

pub use adam::Adam;
pub use optimizer::{Optimizer, OptimizerKind};
pub use plateau::ReduceLrOnPlateau;
pub use sgd::Sgd;
