use ndarray::Array4;
use rand::Rng;

use super::Activation;
use crate::{
    MlErr, Result,
    arch::{Sequential, activations::ActFn},
};

/// A residual block: `act(body(x) + shortcut(x))`.
///
/// An empty shortcut is the identity. The parameters are the body's followed by the shortcut's.
#[derive(Debug, Clone)]
pub struct Residual {
    body: Sequential,
    shortcut: Sequential,
    act: Option<Activation>,
}

impl Residual {
    /// Creates a new `Residual` block.
    ///
    /// # Arguments
    /// * `body` - The main branch.
    /// * `shortcut` - The skip branch, empty for an identity shortcut.
    /// * `act_fn` - An activation applied after the sum, if any.
    ///
    /// # Returns
    /// A new `Residual` instance.
    pub fn new(body: Sequential, shortcut: Sequential, act_fn: Option<ActFn>) -> Self {
        Self {
            body,
            shortcut,
            act: act_fn.map(Activation::new),
        }
    }

    pub fn size(&self) -> usize {
        self.body.size() + self.shortcut.size()
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        let (body, shortcut) = self.split_mut(params)?;
        self.body.init(body, rng)?;
        self.shortcut.init(shortcut, rng)
    }

    pub fn forward(&mut self, params: &[f32], x: Array4<f32>, train: bool) -> Result<Array4<f32>> {
        let (body_params, shortcut_params) = self.split(params)?;

        let y = self.body.forward(body_params, x.clone(), train)?;
        let skip = self.shortcut.forward(shortcut_params, x, train)?;
        if y.shape() != skip.shape() {
            return Err(MlErr::ShapeMismatch {
                what: "residual shortcut",
                got: skip.shape().to_vec(),
                expected: y.shape().to_vec(),
            });
        }

        let y = y + skip;
        Ok(match &mut self.act {
            Some(act) => act.forward(y),
            None => y,
        })
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        let (body_params, shortcut_params) = self.split(params)?;
        let (body_grad, shortcut_grad) = self.split_mut(grad)?;

        let d = match &mut self.act {
            Some(act) => act.backward(d)?,
            None => d,
        };

        let dx = self.body.backward(body_params, body_grad, d.clone())?;
        let dskip = self.shortcut.backward(shortcut_params, shortcut_grad, d)?;
        Ok(dx + dskip)
    }

    fn split<'a>(&self, params: &'a [f32]) -> Result<(&'a [f32], &'a [f32])> {
        super::check_size("residual parameters", params.len(), self.size())?;
        Ok(params.split_at(self.body.size()))
    }

    fn split_mut<'a>(&self, params: &'a mut [f32]) -> Result<(&'a mut [f32], &'a mut [f32])> {
        super::check_size("residual parameters", params.len(), self.size())?;
        Ok(params.split_at_mut(self.body.size()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arch::layers::{Layer, testing::check_gradients};

    #[test]
    fn identity_shortcut_adds_the_input() {
        // A body that always outputs zeros.
        let body = Sequential::new([Layer::conv(1, 1, 1, 1, 0)]);
        let mut residual = Residual::new(body, Sequential::default(), None);
        let params = vec![0.; residual.size()];
        let x = Array4::from_shape_fn((2, 1, 2, 2), |(n, _, i, j)| (n + i + j) as f32);

        let y = residual.forward(&params, x.clone(), true).unwrap();
        assert_eq!(y, x);

        let dx = residual
            .backward(&params, &mut [0.], Array4::ones((2, 1, 2, 2)))
            .unwrap();
        assert!(dx.iter().all(|&v| v == 1.));
    }

    #[test]
    fn mismatched_branches_fail() {
        let body = Sequential::new([Layer::conv(1, 2, 3, 1, 1)]);
        let mut residual = Residual::new(body, Sequential::default(), None);
        let params = vec![0.; residual.size()];

        assert!(matches!(
            residual.forward(&params, Array4::zeros((1, 1, 3, 3)), true),
            Err(MlErr::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn gradients_match_finite_differences() {
        let body = Sequential::new([
            Layer::conv(2, 3, 3, 2, 1),
            Layer::batch_norm(3),
            Layer::swish(),
            Layer::conv(3, 3, 3, 1, 1),
        ]);
        let shortcut = Sequential::new([Layer::conv(2, 3, 1, 2, 0), Layer::batch_norm(3)]);

        check_gradients(
            Layer::residual(body, shortcut, Some(ActFn::Swish)),
            (3, 2, 4, 4),
        );
    }
}
