use ndarray::{Array2, ArrayView2, ArrayView4};
use rand::Rng;

use super::{
    Model, Sequential,
    layers::{check_size, into_matrix},
};
use crate::{MlErr, Result};

/// An architecture along with its flat parameter and gradient buffers.
#[derive(Debug, Clone)]
pub struct Network {
    arch: Sequential,
    params: Vec<f32>,
    grad: Vec<f32>,
    training: bool,
}

impl Network {
    /// Creates a new `Network`, initializing every parameter of `arch`.
    ///
    /// # Arguments
    /// * `arch` - The architecture of the network.
    /// * `rng` - The random number generator the initial parameters are sampled with.
    ///
    /// # Returns
    /// A new `Network` in training mode or an error if the initialization failed.
    pub fn new<R: Rng>(arch: Sequential, rng: &mut R) -> Result<Self> {
        let size = arch.size();
        let mut params = vec![0.; size];
        arch.init(&mut params, rng)?;

        Ok(Self {
            arch,
            params,
            grad: vec![0.; size],
            training: true,
        })
    }

    /// Creates a new `Network` with the given parameters.
    pub fn with_params(arch: Sequential, params: Vec<f32>) -> Result<Self> {
        check_size("network parameters", params.len(), arch.size())?;
        let size = params.len();

        Ok(Self {
            arch,
            params,
            grad: vec![0.; size],
            training: true,
        })
    }

    pub fn arch(&self) -> &Sequential {
        &self.arch
    }

    pub fn params(&self) -> &[f32] {
        &self.params
    }

    pub fn grad(&self) -> &[f32] {
        &self.grad
    }

    pub fn is_training(&self) -> bool {
        self.training
    }
}

impl Model for Network {
    fn num_params(&self) -> usize {
        self.params.len()
    }

    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>> {
        let y = self.arch.forward(&self.params, x.to_owned(), self.training)?;
        let (n, classes, h, w) = y.dim();
        if h != 1 || w != 1 {
            return Err(MlErr::ShapeMismatch {
                what: "network output",
                got: vec![n, classes, h, w],
                expected: vec![n, classes, 1, 1],
            });
        }

        into_matrix(y)
    }

    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()> {
        let (n, classes) = d.dim();
        let d = d.to_owned().into_shape_with_order((n, classes, 1, 1))?;
        self.arch.backward(&self.params, &mut self.grad, d)?;
        Ok(())
    }

    fn set_training(&mut self, training: bool) {
        self.training = training;
    }

    fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }
}
