use ndarray::Array4;
use rand::Rng;

use super::layers::{Layer, check_size};
use crate::Result;

/// A sequential architecture: information flows forward when computing an output and backward
/// when computing the *deltas* of its layers.
///
/// Every layer owns the next `layer.size()` values of the parameter buffer, in order.
#[derive(Debug, Clone, Default)]
pub struct Sequential {
    layers: Vec<Layer>,
}

impl Sequential {
    /// Creates a new `Sequential`.
    ///
    /// # Arguments
    /// * `layers` - The layers the sequential is composed of.
    ///
    /// # Returns
    /// A new `Sequential` instance.
    pub fn new<I>(layers: I) -> Self
    where
        I: IntoIterator<Item = Layer>,
    {
        Self {
            layers: layers.into_iter().collect(),
        }
    }

    pub fn push(&mut self, layer: Layer) {
        self.layers.push(layer);
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns the amount of trainable parameters of every layer combined.
    pub fn size(&self) -> usize {
        self.layers.iter().map(Layer::size).sum()
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        check_size("sequential parameters", params.len(), self.size())?;

        let mut rest = params;
        for layer in &self.layers {
            let (front, back) = rest.split_at_mut(layer.size());
            layer.init(front, rng)?;
            rest = back;
        }

        Ok(())
    }

    /// Makes a forward pass through every layer.
    ///
    /// # Arguments
    /// * `params` - The parameters of the whole sequential.
    /// * `x` - The input data.
    /// * `train` - Whether the layers run in training mode.
    ///
    /// # Returns
    /// The output of the last layer or an error if occurred.
    pub fn forward(&mut self, params: &[f32], mut x: Array4<f32>, train: bool) -> Result<Array4<f32>> {
        check_size("sequential parameters", params.len(), self.size())?;

        let mut offset = 0;
        for layer in self.layers.iter_mut() {
            let size = layer.size();
            x = layer.forward(&params[offset..offset + size], x, train)?;
            offset += size;
        }

        Ok(x)
    }

    /// Propagates the delta from the last layer to the first, accumulating every layer's
    /// gradient on the way.
    ///
    /// # Arguments
    /// * `params` - The parameters of the whole sequential.
    /// * `grad` - The gradient buffer of the whole sequential.
    /// * `d` - The delta of the loss with respect to the output.
    ///
    /// # Returns
    /// The delta of the loss with respect to the input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        check_size("sequential parameters", params.len(), self.size())?;
        check_size("sequential gradient", grad.len(), params.len())?;

        let mut end = params.len();
        for layer in self.layers.iter_mut().rev() {
            let start = end - layer.size();
            d = layer.backward(&params[start..end], &mut grad[start..end], d)?;
            end = start;
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::MlErr;

    fn mlp() -> Sequential {
        Sequential::new([
            Layer::flatten(),
            Layer::dense((4, 3)),
            Layer::relu(),
            Layer::dense((3, 2)),
        ])
    }

    #[test]
    fn size_adds_up_layers() {
        assert_eq!(mlp().size(), 5 * 3 + 4 * 2);
        assert_eq!(Sequential::default().size(), 0);
    }

    #[test]
    fn empty_sequential_is_the_identity() {
        let mut seq = Sequential::default();
        let x = Array4::from_elem((2, 3, 2, 2), 1.5);

        assert_eq!(seq.forward(&[], x.clone(), true).unwrap(), x);
        assert_eq!(seq.backward(&[], &mut [], x.clone()).unwrap(), x);
    }

    #[test]
    fn forward_flattens_into_logits() {
        let mut seq = mlp();
        let mut params = vec![0.; seq.size()];
        seq.init(&mut params, &mut StdRng::seed_from_u64(1)).unwrap();

        let y = seq.forward(&params, Array4::ones((5, 1, 2, 2)), false).unwrap();
        assert_eq!(y.shape(), &[5, 2, 1, 1]);
    }

    #[test]
    fn wrong_buffer_size_fails() {
        let mut seq = mlp();
        let params = vec![0.; seq.size() - 1];

        assert!(matches!(
            seq.forward(&params, Array4::ones((1, 1, 2, 2)), true),
            Err(MlErr::SizeMismatch { .. })
        ));
    }
}
