use ndarray::{Array2, ArrayView2, ArrayView4};

use crate::Result;

/// A trainable classifier over `(n, channels, height, width)` images.
pub trait Model {
    /// Returns the amount of trainable parameters in the model.
    fn num_params(&self) -> usize;

    /// Computes the logits of a batch.
    ///
    /// # Arguments
    /// * `x` - A batch of images.
    ///
    /// # Returns
    /// The `(n, classes)` logits.
    fn forward(&mut self, x: ArrayView4<f32>) -> Result<Array2<f32>>;

    /// Backpropagates the delta of the loss with respect to the logits of the last forward pass,
    /// **accumulating** the gradient of every parameter.
    ///
    /// # Arguments
    /// * `d` - The `(n, classes)` delta.
    fn backward(&mut self, d: ArrayView2<f32>) -> Result<()>;

    /// Switches between training (batch statistics) and evaluation (running statistics).
    fn set_training(&mut self, training: bool);

    fn zero_grad(&mut self);

    /// Gives the parameters along with their accumulated gradient, for optimizers.
    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]);
}
