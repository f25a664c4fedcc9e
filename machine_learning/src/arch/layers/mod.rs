mod activation;
mod batch_norm;
mod conv;
mod dense;
mod flatten;
mod layer;
mod pool;
mod residual;
mod squeeze_excite;

pub use activation::Activation;
pub use batch_norm::BatchNorm2d;
pub use conv::Conv2d;
pub use dense::Dense;
pub use flatten::Flatten;
pub use layer::Layer;
pub use pool::{AvgPool2d, GlobalAvgPool, MaxPool2d};
pub use residual::Residual;
pub use squeeze_excite::SqueezeExcite;

use ndarray::{Array2, Array4};

use crate::{MlErr, Result};

pub(crate) fn check_size(what: &'static str, got: usize, expected: usize) -> Result<()> {
    if got != expected {
        return Err(MlErr::SizeMismatch {
            what,
            got,
            expected,
        });
    }

    Ok(())
}

/// Reshapes an `(n, c, h, w)` tensor into an `(n, c * h * w)` matrix.
pub(crate) fn into_matrix(x: Array4<f32>) -> Result<Array2<f32>> {
    let (n, c, h, w) = x.dim();
    let x = if x.is_standard_layout() {
        x
    } else {
        x.as_standard_layout().into_owned()
    };

    Ok(x.into_shape_with_order((n, c * h * w))?)
}
