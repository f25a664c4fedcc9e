use log::info;
use ndarray::{Array2, ArrayView2, ArrayView4};

use super::Model;
use crate::{Result, device::Device};

/// Replicates a model over every compute device of its placement.
///
/// On the cpu the batch level parallelism lives inside the layers (a thread pool), so the
/// wrapper forwards every call to the wrapped model.
#[derive(Debug, Clone)]
pub struct DataParallel<M> {
    module: M,
    device: Device,
}

impl<M: Model> DataParallel<M> {
    /// Wraps `module` for data parallel execution and moves it to `device`.
    pub fn new(module: M, device: Device) -> Self {
        let this = Self { module, device };
        info!("using {} parallel compute devices", this.device_count());
        this
    }

    /// Returns the amount of parallel compute units available on the device.
    pub fn device_count(&self) -> usize {
        self.device.parallelism()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn module(&self) -> &M {
        &self.module
    }

    pub fn into_inner(self) -> M {
        self.module
    }
}

impl<M: Model> Model for DataParallel<M> {
    fn num_params(&self) -> usize {
        self.module.num_params()
    }

    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>> {
        self.module.forward(x)
    }

    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()> {
        self.module.backward(d)
    }

    fn set_training(&mut self, training: bool) {
        self.module.set_training(training);
    }

    fn zero_grad(&mut self) {
        self.module.zero_grad();
    }

    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        self.module.params_and_grad()
    }
}
