use ndarray::ArrayView4;

use crate::{MlErr, Result};

/// A batch of images along with the class index of each of them.
#[derive(Debug, Clone, Copy)]
pub struct Batch<'a> {
    pub x: ArrayView4<'a, f32>,
    pub y: &'a [usize],
}

impl<'a> Batch<'a> {
    /// Creates a new `Batch`.
    ///
    /// # Arguments
    /// * `x` - The `(n, channels, height, width)` images.
    /// * `y` - The `n` labels.
    ///
    /// # Returns
    /// A new `Batch` or an error if the amount of images and labels differ.
    pub fn new(x: ArrayView4<'a, f32>, y: &'a [usize]) -> Result<Self> {
        if x.len_of(ndarray::Axis(0)) != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "batch labels",
                got: y.len(),
                expected: x.len_of(ndarray::Axis(0)),
            });
        }

        Ok(Self { x, y })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}
