use ndarray::{Array2, ArrayView2};

use crate::Result;

pub trait LossFn {
    /// Computes the mean loss of a batch.
    ///
    /// # Arguments
    /// * `logits` - The `(n, classes)` raw outputs of a model.
    /// * `labels` - The class index of every example.
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<f32>;

    /// Computes the delta of the mean loss with respect to the logits.
    fn loss_prime(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<Array2<f32>>;
}
