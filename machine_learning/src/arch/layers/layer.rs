use ndarray::Array4;
use rand::Rng;

use super::{
    Activation, AvgPool2d, BatchNorm2d, Conv2d, Dense, Flatten, GlobalAvgPool, MaxPool2d,
    Residual, SqueezeExcite,
};
use crate::{
    Result,
    arch::{Sequential, activations::ActFn},
};

#[derive(Debug, Clone)]
pub enum Layer {
    Conv2d(Conv2d),
    BatchNorm2d(BatchNorm2d),
    Activation(Activation),
    MaxPool2d(MaxPool2d),
    AvgPool2d(AvgPool2d),
    GlobalAvgPool(GlobalAvgPool),
    Flatten(Flatten),
    Dense(Dense),
    Residual(Residual),
    SqueezeExcite(SqueezeExcite),
}

impl Layer {
    /// A convolution without bias.
    pub fn conv(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        Self::Conv2d(Conv2d::new(
            in_channels,
            out_channels,
            kernel,
            stride,
            padding,
        ))
    }

    pub fn batch_norm(channels: usize) -> Self {
        Self::BatchNorm2d(BatchNorm2d::new(channels))
    }

    pub fn activation(act_fn: ActFn) -> Self {
        Self::Activation(Activation::new(act_fn))
    }

    pub fn relu() -> Self {
        Self::activation(ActFn::Relu)
    }

    pub fn swish() -> Self {
        Self::activation(ActFn::Swish)
    }

    pub fn max_pool(kernel: usize) -> Self {
        Self::MaxPool2d(MaxPool2d::new(kernel))
    }

    pub fn avg_pool(kernel: usize) -> Self {
        Self::AvgPool2d(AvgPool2d::new(kernel))
    }

    pub fn global_avg_pool() -> Self {
        Self::GlobalAvgPool(GlobalAvgPool::new())
    }

    pub fn flatten() -> Self {
        Self::Flatten(Flatten::new())
    }

    pub fn dense(dim: (usize, usize)) -> Self {
        Self::Dense(Dense::new(dim))
    }

    pub fn residual(body: Sequential, shortcut: Sequential, act_fn: Option<ActFn>) -> Self {
        Self::Residual(Residual::new(body, shortcut, act_fn))
    }

    pub fn squeeze_excite(channels: usize, reduced: usize) -> Self {
        Self::SqueezeExcite(SqueezeExcite::new(channels, reduced))
    }

    /// Returns the amount of trainable parameters of this layer.
    pub fn size(&self) -> usize {
        match self {
            Self::Conv2d(l) => l.size(),
            Self::BatchNorm2d(l) => l.size(),
            Self::Dense(l) => l.size(),
            Self::Residual(l) => l.size(),
            Self::SqueezeExcite(l) => l.size(),
            Self::Activation(_)
            | Self::MaxPool2d(_)
            | Self::AvgPool2d(_)
            | Self::GlobalAvgPool(_)
            | Self::Flatten(_) => 0,
        }
    }

    /// Writes the initial values of this layer's parameters.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the parameter buffer.
    /// * `rng` - The random number generator to sample from.
    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        match self {
            Self::Conv2d(l) => l.init(params, rng),
            Self::BatchNorm2d(l) => l.init(params),
            Self::Dense(l) => l.init(params, rng),
            Self::Residual(l) => l.init(params, rng),
            Self::SqueezeExcite(l) => l.init(params, rng),
            Self::Activation(_)
            | Self::MaxPool2d(_)
            | Self::AvgPool2d(_)
            | Self::GlobalAvgPool(_)
            | Self::Flatten(_) => Ok(()),
        }
    }

    /// Makes a forward pass through this layer, caching what the backward pass needs.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the parameter buffer.
    /// * `x` - The input of the layer.
    /// * `train` - Whether batch statistics should be used and tracked.
    ///
    /// # Returns
    /// The output of the layer.
    pub fn forward(&mut self, params: &[f32], x: Array4<f32>, train: bool) -> Result<Array4<f32>> {
        match self {
            Self::Conv2d(l) => l.forward(params, x),
            Self::BatchNorm2d(l) => l.forward(params, x, train),
            Self::Activation(l) => Ok(l.forward(x)),
            Self::MaxPool2d(l) => l.forward(x),
            Self::AvgPool2d(l) => l.forward(x),
            Self::GlobalAvgPool(l) => l.forward(x),
            Self::Flatten(l) => l.forward(x),
            Self::Dense(l) => l.forward(params, x),
            Self::Residual(l) => l.forward(params, x, train),
            Self::SqueezeExcite(l) => l.forward(params, x),
        }
    }

    /// Accumulates this layer's gradient and propagates the delta to its input.
    ///
    /// # Arguments
    /// * `params` - This layer's slice of the parameter buffer.
    /// * `grad` - This layer's slice of the gradient buffer.
    /// * `d` - The delta of the loss with respect to this layer's output.
    ///
    /// # Returns
    /// The delta of the loss with respect to this layer's input.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        match self {
            Self::Conv2d(l) => l.backward(params, grad, d),
            Self::BatchNorm2d(l) => l.backward(params, grad, d),
            Self::Activation(l) => l.backward(d),
            Self::MaxPool2d(l) => l.backward(d),
            Self::AvgPool2d(l) => l.backward(d),
            Self::GlobalAvgPool(l) => l.backward(d),
            Self::Flatten(l) => l.backward(d),
            Self::Dense(l) => l.backward(params, grad, d),
            Self::Residual(l) => l.backward(params, grad, d),
            Self::SqueezeExcite(l) => l.backward(params, grad, d),
        }
    }
}
