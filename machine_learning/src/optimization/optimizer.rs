use std::str::FromStr;

use crate::{MlErr, Result};

/// Defines the strategy for updating model parameters based on calculated gradients.
pub trait Optimizer {
    /// Updates the provided slice of parameters using the accumulated gradient.
    ///
    /// # Arguments
    /// * `params` - The parameters to update.
    /// * `grad` - A reference to the model's gradient.
    ///
    /// # Returns
    /// An error if there's a mismatch in the sizes of `grad` and `params`.
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()>;

    fn learning_rate(&self) -> f32;

    fn set_learning_rate(&mut self, learning_rate: f32);

    /// A short name for logging.
    fn name(&self) -> &'static str;
}

/// The optimization algorithms a session can be configured with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerKind {
    Adam,
    /// Stochastic gradient descent with Nesterov momentum and weight decay.
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "adam" => Ok(Self::Adam),
            "sgd" => Ok(Self::Sgd),
            _ => Err(MlErr::UnsupportedOptimizer { kind: s.to_string() }),
        }
    }
}

pub(super) fn check_lens(params: &[f32], grad: &[f32]) -> Result<()> {
    if grad.len() != params.len() {
        return Err(MlErr::SizeMismatch {
            what: "optimizer gradient",
            got: grad.len(),
            expected: params.len(),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_supported_kinds() {
        assert_eq!("adam".parse::<OptimizerKind>().unwrap(), OptimizerKind::Adam);
        assert_eq!("sgd".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
    }

    #[test]
    fn rejects_unknown_kinds() {
        for kind in ["rmsprop", "Adam", ""] {
            assert!(matches!(
                kind.parse::<OptimizerKind>(),
                Err(MlErr::UnsupportedOptimizer { kind: k }) if k == kind
            ));
        }
    }
}
