use ndarray::Array4;

use crate::{MlErr, Result, arch::activations::ActFn};

/// Applies an activation function element-wise, it has no parameters.
#[derive(Debug, Clone)]
pub struct Activation {
    act_fn: ActFn,

    // Forward metadata
    z: Array4<f32>,
}

impl Activation {
    pub fn new(act_fn: ActFn) -> Self {
        Self {
            act_fn,
            z: Array4::zeros((0, 0, 0, 0)),
        }
    }

    pub fn act_fn(&self) -> ActFn {
        self.act_fn
    }

    pub fn forward(&mut self, x: Array4<f32>) -> Array4<f32> {
        let act_fn = self.act_fn;
        let y = x.mapv(|z| act_fn.f(z));
        self.z = x;
        y
    }

    pub fn backward(&mut self, mut d: Array4<f32>) -> Result<Array4<f32>> {
        if d.shape() != self.z.shape() {
            return Err(MlErr::ShapeMismatch {
                what: "activation delta",
                got: d.shape().to_vec(),
                expected: self.z.shape().to_vec(),
            });
        }

        let act_fn = self.act_fn;
        d.zip_mut_with(&self.z, |d, &z| *d *= act_fn.df(z));
        Ok(d)
    }
}
