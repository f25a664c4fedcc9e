mod accuracy;
mod session;

pub use accuracy::{RunningAccuracy, argmax};
pub use session::{EpochSummary, Session, TrainStep, ValStep};
