use ndarray::{Array2, Array4, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2, Axis, linalg};
use rand::Rng;

use super::{check_size, into_matrix};
use crate::{
    MlErr, Result,
    initialization::{ParamGen, RandParamGen},
};

/// A fully connected layer, inputs are expected to be flattened to `(n, features, 1, 1)`.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    size: usize,

    // Forward metadata
    x: Array2<f32>,
}

impl Dense {
    /// Creates a new `Dense` layer.
    ///
    /// # Arguments
    /// * `dim` - The amount of input and output features.
    pub fn new(dim: (usize, usize)) -> Self {
        Self {
            dim,
            size: (dim.0 + 1) * dim.1,
            x: Array2::zeros((0, dim.0)),
        }
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        check_size("dense parameters", params.len(), self.size)?;
        let fan_in = self.dim.0;
        RandParamGen::fan_in_uniform(rng, fan_in)?.fill(params);
        Ok(())
    }

    pub fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, features, h, w) = x.dim();
        if features != self.dim.0 || h != 1 || w != 1 {
            return Err(MlErr::ShapeMismatch {
                what: "dense input",
                got: vec![n, features, h, w],
                expected: vec![n, self.dim.0, 1, 1],
            });
        }

        let x = into_matrix(x)?;
        let (weights, biases) = self.view_params(params)?;
        let mut z = x.dot(&weights);
        z += &biases;

        self.x = x;
        Ok(z.into_shape_with_order((n, self.dim.1, 1, 1))?)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        check_size("dense gradient", grad.len(), self.size)?;
        let n = self.x.nrows();
        let d = into_matrix(d)?;
        if d.dim() != (n, self.dim.1) {
            return Err(MlErr::ShapeMismatch {
                what: "dense delta",
                got: d.shape().to_vec(),
                expected: vec![n, self.dim.1],
            });
        }

        let (weights, _) = self.view_params(params)?;
        let (mut dw, mut db) = self.view_grad(grad)?;
        linalg::general_mat_mul(1.0, &self.x.t(), &d, 1.0, &mut dw);
        db += &d.sum_axis(Axis(0));

        let dx = d.dot(&weights.t());
        Ok(dx.into_shape_with_order((n, self.dim.0, 1, 1))?)
    }

    /// Gives a view of the raw gradient slice as the delta weights and delta biases of this layer.
    ///
    /// # Arguments
    /// * `grad` - A gradient slice.
    ///
    /// # Returns
    /// A tuple containing the delta weights and delta biases.
    fn view_grad<'a>(
        &self,
        grad: &'a mut [f32],
    ) -> Result<(ArrayViewMut2<'a, f32>, ArrayViewMut1<'a, f32>)> {
        let w_size = self.size - self.dim.1;
        let (dw_raw, db_raw) = grad.split_at_mut(w_size);
        let dw = ArrayViewMut2::from_shape(self.dim, dw_raw)?;
        let db = ArrayViewMut1::from_shape(self.dim.1, db_raw)?;
        Ok((dw, db))
    }

    /// Gives a view of the raw parameter slice as the weights and biases of this layer.
    ///
    /// # Arguments
    /// * `params` - A slice of parameters.
    ///
    /// # Returns
    /// A tuple containing the weights and biases.
    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView2<'a, f32>, ArrayView1<'a, f32>)> {
        check_size("dense parameters", params.len(), self.size)?;
        let w_size = self.size - self.dim.1;
        let weights = ArrayView2::from_shape(self.dim, &params[..w_size])?;
        let biases = ArrayView1::from_shape(self.dim.1, &params[w_size..])?;
        Ok((weights, biases))
    }
}
