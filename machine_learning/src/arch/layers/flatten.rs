use ndarray::Array4;

use super::into_matrix;
use crate::{MlErr, Result};

/// Folds the channel and spatial dimensions together, `(n, c, h, w)` becomes `(n, c * h * w, 1, 1)`.
#[derive(Debug, Clone)]
pub struct Flatten {
    input_dim: (usize, usize, usize, usize),
}

impl Flatten {
    pub fn new() -> Self {
        Self {
            input_dim: (0, 0, 0, 0),
        }
    }

    pub fn forward(&mut self, x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        self.input_dim = (n, c, h, w);
        Ok(into_matrix(x)?.into_shape_with_order((n, c * h * w, 1, 1))?)
    }

    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = self.input_dim;
        if d.shape() != [n, c * h * w, 1, 1] {
            return Err(MlErr::ShapeMismatch {
                what: "flatten delta",
                got: d.shape().to_vec(),
                expected: vec![n, c * h * w, 1, 1],
            });
        }

        Ok(into_matrix(d)?.into_shape_with_order(self.input_dim)?)
    }
}

impl Default for Flatten {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_channel_major_order() {
        let mut flatten = Flatten::new();
        let x = Array4::from_shape_fn((2, 2, 2, 1), |(n, c, i, _)| (n * 4 + c * 2 + i) as f32);

        let y = flatten.forward(x.clone()).unwrap();
        assert_eq!(y.shape(), &[2, 4, 1, 1]);
        assert_eq!(y[[1, 3, 0, 0]], 7.);

        assert_eq!(flatten.backward(y).unwrap(), x);
    }
}
