use super::{Optimizer, optimizer::check_lens};
use crate::Result;

/// Stochastic gradient descent with Nesterov momentum and L2 weight decay.
#[derive(Debug)]
pub struct Sgd {
    learning_rate: f32,
    momentum: f32,
    weight_decay: f32,
    velocity: Box<[f32]>,
}

impl Sgd {
    /// Creates a new `Sgd` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `momentum` - How much of the previous velocity is kept on each step.
    /// * `weight_decay` - The L2 penalty added to the gradient.
    ///
    /// # Returns
    /// A new `Sgd` instance.
    pub fn new(len: usize, learning_rate: f32, momentum: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            momentum,
            weight_decay,
            velocity: vec![0.; len].into_boxed_slice(),
        }
    }
}

impl Optimizer for Sgd {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_lens(params, grad)?;
        check_lens(params, &self.velocity)?;

        let lr = self.learning_rate;
        let mu = self.momentum;
        let wd = self.weight_decay;

        params
            .iter_mut()
            .zip(grad)
            .zip(self.velocity.iter_mut())
            .for_each(|((p, g), v)| {
                let g = g + wd * *p;
                *v = mu * *v + g;
                *p -= lr * (g + mu * *v);
            });

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }

    fn name(&self) -> &'static str {
        "sgd"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nesterov_steps() {
        let mut sgd = Sgd::new(1, 0.1, 0.9, 0.);
        let mut params = [1.];

        // v = 1, p -= 0.1 * (1 + 0.9)
        sgd.update_params(&mut params, &[1.]).unwrap();
        assert!((params[0] - 0.81).abs() < 1e-6);

        // v = 1.9, p -= 0.1 * (1 + 1.71)
        sgd.update_params(&mut params, &[1.]).unwrap();
        assert!((params[0] - 0.539).abs() < 1e-6);
    }

    #[test]
    fn weight_decay_shrinks_params() {
        let mut sgd = Sgd::new(2, 0.5, 0., 0.1);
        let mut params = [2., -2.];

        sgd.update_params(&mut params, &[0., 0.]).unwrap();

        assert!((params[0] - 1.9).abs() < 1e-6);
        assert!((params[1] + 1.9).abs() < 1e-6);
    }
}
