use ndarray::{Array4, Axis};
use rand::Rng;

use super::{Activation, Dense, GlobalAvgPool};
use crate::{MlErr, Result, arch::activations::ActFn};

/// Squeeze-and-excitation: rescales every channel by a gate computed from the channel means.
///
/// The gate is `sigmoid(fc2(relu(fc1(mean(x)))))`, the parameters are `fc1`'s followed by `fc2`'s.
#[derive(Debug, Clone)]
pub struct SqueezeExcite {
    pool: GlobalAvgPool,
    fc1: Dense,
    relu: Activation,
    fc2: Dense,
    sigmoid: Activation,

    // Forward metadata
    x: Array4<f32>,
    gate: Array4<f32>,
}

impl SqueezeExcite {
    /// Creates a new `SqueezeExcite` block.
    ///
    /// # Arguments
    /// * `channels` - The amount of channels of the input.
    /// * `reduced` - The amount of hidden units of the gate.
    pub fn new(channels: usize, reduced: usize) -> Self {
        Self {
            pool: GlobalAvgPool::new(),
            fc1: Dense::new((channels, reduced)),
            relu: Activation::new(ActFn::Relu),
            fc2: Dense::new((reduced, channels)),
            sigmoid: Activation::new(ActFn::Sigmoid),
            x: Array4::zeros((0, channels, 0, 0)),
            gate: Array4::zeros((0, channels, 1, 1)),
        }
    }

    pub fn size(&self) -> usize {
        self.fc1.size() + self.fc2.size()
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        super::check_size("squeeze excite parameters", params.len(), self.size())?;
        let (fc1, fc2) = params.split_at_mut(self.fc1.size());
        self.fc1.init(fc1, rng)?;
        self.fc2.init(fc2, rng)
    }

    pub fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Array4<f32>> {
        super::check_size("squeeze excite parameters", params.len(), self.size())?;
        let (fc1, fc2) = params.split_at(self.fc1.size());

        let pooled = self.pool.forward(x.clone())?;
        let hidden = self.relu.forward(self.fc1.forward(fc1, pooled)?);
        let gate = self.sigmoid.forward(self.fc2.forward(fc2, hidden)?);

        let y = &x * &gate;
        self.x = x;
        self.gate = gate;
        Ok(y)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        super::check_size("squeeze excite gradient", grad.len(), self.size())?;
        if d.shape() != self.x.shape() {
            return Err(MlErr::ShapeMismatch {
                what: "squeeze excite delta",
                got: d.shape().to_vec(),
                expected: self.x.shape().to_vec(),
            });
        }

        let (fc1, fc2) = params.split_at(self.fc1.size());
        let (dfc1, dfc2) = grad.split_at_mut(self.fc1.size());
        let (n, c, _, _) = d.dim();

        let dgate = (&d * &self.x)
            .sum_axis(Axis(3))
            .sum_axis(Axis(2))
            .into_shape_with_order((n, c, 1, 1))?;
        let dgate = self.sigmoid.backward(dgate)?;
        let dhidden = self.relu.backward(self.fc2.backward(fc2, dfc2, dgate)?)?;
        let dpooled = self.fc1.backward(fc1, dfc1, dhidden)?;

        Ok(d * &self.gate + self.pool.backward(dpooled)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::layers::{Layer, testing::check_gradients};

    #[test]
    fn size_counts_both_projections() {
        // kuangliu style squeeze excitation over 320 channels.
        assert_eq!(SqueezeExcite::new(320, 20).size(), 320 * 20 + 20 + 20 * 320 + 320);
    }

    #[test]
    fn zero_params_halve_the_input() {
        let mut se = SqueezeExcite::new(2, 1);
        let params = vec![0.; se.size()];
        let x = Array4::from_shape_fn((1, 2, 2, 2), |(_, c, i, j)| (c * 4 + i * 2 + j) as f32);

        let y = se.forward(&params, x.clone()).unwrap();

        assert_eq!(y, x.mapv(|v| v * 0.5));
    }

    #[test]
    fn gradients_match_finite_differences() {
        check_gradients(Layer::squeeze_excite(4, 2), (2, 4, 3, 3));
    }
}
