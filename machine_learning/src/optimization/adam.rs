use super::{Optimizer, optimizer::check_lens};
use crate::Result;

#[derive(Debug)]
pub struct Adam {
    learning_rate: f32,
    beta1: f32,
    beta2: f32,
    beta1_t: f32,
    beta2_t: f32,
    m: Box<[f32]>,
    v: Box<[f32]>,
    epsilon: f32,
}

impl Adam {
    /// Creates a new `Adam` optimizer.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `beta1`, `beta2`, `epsilon` - Hyperparameters to the optimization algorithm.
    ///
    /// # Returns
    /// A new `Adam` instance.
    pub fn new(len: usize, learning_rate: f32, beta1: f32, beta2: f32, epsilon: f32) -> Self {
        Self {
            learning_rate,
            beta1,
            beta2,
            beta1_t: 1.,
            beta2_t: 1.,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
            epsilon,
        }
    }

    /// Creates a new `Adam` optimizer with betas `(0.9, 0.999)` and epsilon `1e-8`.
    pub fn with_defaults(len: usize, learning_rate: f32) -> Self {
        Self::new(len, learning_rate, 0.9, 0.999, 1e-8)
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        check_lens(params, grad)?;
        check_lens(params, &self.m)?;

        let Self {
            learning_rate: lr,
            beta1: b1,
            beta2: b2,
            epsilon: eps,
            ..
        } = *self;

        self.beta1_t *= b1;
        self.beta2_t *= b2;

        let step_size = lr / (1. - self.beta1_t);
        let bc2_sqrt = (1. - self.beta2_t).sqrt();

        params
            .iter_mut()
            .zip(grad)
            .zip(self.m.iter_mut())
            .zip(self.v.iter_mut())
            .for_each(|(((p, g), m), v)| {
                *m = b1 * *m + (1. - b1) * g;
                *v = b2 * *v + (1. - b2) * g.powi(2);
                *p -= step_size * *m / (v.sqrt() / bc2_sqrt + eps);
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
        "adam"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_step_moves_by_the_learning_rate() {
        // With bias correction the first update is lr * sign(g).
        let mut adam = Adam::with_defaults(3, 0.1);
        let mut params = [1., 1., 1.];

        adam.update_params(&mut params, &[0.5, -2., 0.]).unwrap();

        assert!((params[0] - 0.9).abs() < 1e-5);
        assert!((params[1] - 1.1).abs() < 1e-5);
        assert_eq!(params[2], 1.);
    }

    #[test]
    fn minimizes_a_quadratic() {
        let mut adam = Adam::with_defaults(1, 0.05);
        let mut params = [3.];

        for _ in 0..500 {
            let grad = [2. * params[0]];
            adam.update_params(&mut params, &grad).unwrap();
        }

        assert!(params[0].abs() < 0.05);
    }

    #[test]
    fn mismatched_sizes_fail() {
        let mut adam = Adam::with_defaults(2, 0.1);
        assert!(adam.update_params(&mut [0., 0.], &[1.]).is_err());
    }
}
