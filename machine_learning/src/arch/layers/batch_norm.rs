use ndarray::{Array1, Array4, ArrayView1, ArrayView4, Axis};

use super::check_size;
use crate::{
    MlErr, Result,
    initialization::{ConstParamGen, ParamGen},
};

const EPS: f32 = 1e-5;
const MOMENTUM: f32 = 0.1;

/// Per channel batch normalization of `(n, channels, height, width)` inputs.
///
/// The parameters are the scales (gamma) followed by the shifts (beta) of every channel. The
/// running statistics used at evaluation time are state of the layer, not parameters.
#[derive(Debug, Clone)]
pub struct BatchNorm2d {
    channels: usize,
    running_mean: Array1<f32>,
    running_var: Array1<f32>,

    // Forward metadata
    xhat: Array4<f32>,
    inv_std: Array1<f32>,
    train: bool,
}

impl BatchNorm2d {
    pub fn new(channels: usize) -> Self {
        Self {
            channels,
            running_mean: Array1::zeros(channels),
            running_var: Array1::ones(channels),
            xhat: Array4::zeros((0, channels, 0, 0)),
            inv_std: Array1::ones(channels),
            train: false,
        }
    }

    pub fn size(&self) -> usize {
        2 * self.channels
    }

    /// Starts as the identity: unit scales and zero shifts.
    pub fn init(&self, params: &mut [f32]) -> Result<()> {
        check_size("batch norm parameters", params.len(), self.size())?;
        let (gamma, beta) = params.split_at_mut(self.channels);
        ConstParamGen::new(1.).fill(gamma);
        ConstParamGen::new(0.).fill(beta);
        Ok(())
    }

    pub fn running_mean(&self) -> ArrayView1<'_, f32> {
        self.running_mean.view()
    }

    pub fn running_var(&self) -> ArrayView1<'_, f32> {
        self.running_var.view()
    }

    pub fn forward(&mut self, params: &[f32], x: Array4<f32>, train: bool) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.channels {
            return Err(MlErr::ShapeMismatch {
                what: "batch norm input",
                got: vec![n, c, h, w],
                expected: vec![n, self.channels, h, w],
            });
        }

        let (gamma, beta) = self.view_params(params)?;
        let m = (n * h * w) as f32;

        let (mean, var) = if train {
            let mean = channel_sum(&x) / m;
            let centered = &x - &per_channel(&mean)?;
            let var = channel_sum(&centered.mapv(|v| v * v)) / m;

            let unbiased = if m > 1. { m / (m - 1.) } else { 1. };
            self.running_mean
                .zip_mut_with(&mean, |r, &v| *r = (1. - MOMENTUM) * *r + MOMENTUM * v);
            self.running_var.zip_mut_with(&var, |r, &v| {
                *r = (1. - MOMENTUM) * *r + MOMENTUM * v * unbiased
            });

            (mean, var)
        } else {
            (self.running_mean.clone(), self.running_var.clone())
        };

        let inv_std = var.mapv(|v| 1. / (v + EPS).sqrt());
        let xhat = (&x - &per_channel(&mean)?) * &per_channel(&inv_std)?;
        let gamma = gamma.to_owned();
        let y = &xhat * &per_channel(&gamma)? + &per_channel(&beta.to_owned())?;

        self.xhat = xhat;
        self.inv_std = inv_std;
        self.train = train;
        Ok(y)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        check_size("batch norm gradient", grad.len(), self.size())?;
        if d.shape() != self.xhat.shape() {
            return Err(MlErr::ShapeMismatch {
                what: "batch norm delta",
                got: d.shape().to_vec(),
                expected: self.xhat.shape().to_vec(),
            });
        }

        let (gamma, _) = self.view_params(params)?;
        let (n, _, h, w) = d.dim();
        let m = (n * h * w) as f32;

        let sum_d = channel_sum(&d);
        let sum_dxhat = channel_sum(&(&d * &self.xhat));

        let (dgamma, dbeta) = grad.split_at_mut(self.channels);
        dgamma
            .iter_mut()
            .zip(sum_dxhat.iter())
            .for_each(|(g, v)| *g += v);
        dbeta.iter_mut().zip(sum_d.iter()).for_each(|(g, v)| *g += v);

        let scale = &gamma * &self.inv_std;
        if !self.train {
            return Ok(d * &per_channel(&scale)?);
        }

        let dx = (d * m - &per_channel(&sum_d)? - &self.xhat * &per_channel(&sum_dxhat)?)
            * &per_channel(&(scale / m))?;
        Ok(dx)
    }

    fn view_params<'a>(&self, params: &'a [f32]) -> Result<(ArrayView1<'a, f32>, ArrayView1<'a, f32>)> {
        check_size("batch norm parameters", params.len(), self.size())?;
        let (gamma, beta) = params.split_at(self.channels);
        Ok((ArrayView1::from(gamma), ArrayView1::from(beta)))
    }
}

/// Sums every axis but the channel one.
fn channel_sum(x: &Array4<f32>) -> Array1<f32> {
    x.sum_axis(Axis(3)).sum_axis(Axis(2)).sum_axis(Axis(0))
}

/// Views a per channel vector as a `(1, channels, 1, 1)` tensor so it broadcasts over a batch.
fn per_channel(v: &Array1<f32>) -> Result<ArrayView4<'_, f32>> {
    Ok(v.view().into_shape_with_order((1, v.len(), 1, 1))?)
}
