use ndarray::{Array2, Array4, ArrayView2, ArrayView3, Axis, s};
use rand::Rng;
use rayon::prelude::*;

use super::check_size;
use crate::{
    MlErr, Result,
    initialization::{ConstParamGen, ParamGen, RandParamGen},
};

/// A 2D convolution over `(n, channels, height, width)` inputs.
///
/// Each sample and group is lowered to a single matrix product (im2col), samples are processed
/// in parallel. The parameters are laid out as the weights `(out, in / groups, k, k)` followed by
/// the optional biases `(out)`.
#[derive(Debug, Clone)]
pub struct Conv2d {
    in_channels: usize,
    out_channels: usize,
    kernel: usize,
    stride: usize,
    padding: usize,
    groups: usize,
    bias: bool,

    // Forward metadata
    input_dim: (usize, usize, usize, usize),
    output_dim: (usize, usize),
    cols: Vec<Array2<f32>>,
}

impl Conv2d {
    /// Creates a new `Conv2d` with a single group and no bias.
    ///
    /// # Arguments
    /// * `in_channels` - The amount of channels of the input.
    /// * `out_channels` - The amount of channels of the output.
    /// * `kernel` - The side of the square kernel.
    /// * `stride` - The step between two consecutive kernel applications.
    /// * `padding` - The amount of zeros added to each side of the input.
    ///
    /// # Returns
    /// A new `Conv2d` instance.
    pub fn new(
        in_channels: usize,
        out_channels: usize,
        kernel: usize,
        stride: usize,
        padding: usize,
    ) -> Self {
        assert!(kernel > 0 && stride > 0, "kernel and stride must be > 0");

        Self {
            in_channels,
            out_channels,
            kernel,
            stride,
            padding,
            groups: 1,
            bias: false,
            input_dim: (0, in_channels, 0, 0),
            output_dim: (0, 0),
            cols: Vec::new(),
        }
    }

    /// Adds a learnable bias per output channel.
    pub fn with_bias(mut self) -> Self {
        self.bias = true;
        self
    }

    /// Splits the channels in `groups` independent convolutions, `groups == in_channels` yields a
    /// depthwise convolution.
    pub fn with_groups(mut self, groups: usize) -> Self {
        assert!(
            groups > 0 && self.in_channels % groups == 0 && self.out_channels % groups == 0,
            "channels must be divisible by groups"
        );

        self.groups = groups;
        self
    }

    /// Returns the size of this layer.
    ///
    /// # Returns
    /// The amount of parameters this layer has.
    pub fn size(&self) -> usize {
        self.weight_size() + if self.bias { self.out_channels } else { 0 }
    }

    pub fn init<R: Rng>(&self, params: &mut [f32], rng: &mut R) -> Result<()> {
        check_size("convolution parameters", params.len(), self.size())?;
        let (weights, biases) = params.split_at_mut(self.weight_size());
        RandParamGen::kaiming(rng, self.patch())?.fill(weights);
        ConstParamGen::new(0.).fill(biases);
        Ok(())
    }

    pub fn forward(&mut self, params: &[f32], x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if c != self.in_channels {
            return Err(MlErr::ShapeMismatch {
                what: "convolution input",
                got: vec![n, c, h, w],
                expected: vec![n, self.in_channels, h, w],
            });
        }

        let (oh, ow) = self.output_hw(h, w)?;
        let weights = self.view_weights(params)?;
        let biases = self.bias.then(|| &params[self.weight_size()..]);
        let (cg, og) = (self.group_in(), self.group_out());
        let this = &*self;

        let samples: Vec<(Vec<f32>, Vec<Array2<f32>>)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let sample = x.index_axis(Axis(0), i);
                let mut out = Vec::with_capacity(this.out_channels * oh * ow);
                let mut cols = Vec::with_capacity(this.groups);

                for g in 0..this.groups {
                    let col = this.im2col(sample, g * cg, (oh, ow));
                    let mut y = weights.slice(s![g * og..(g + 1) * og, ..]).dot(&col);

                    if let Some(biases) = biases {
                        for (o, mut row) in y.outer_iter_mut().enumerate() {
                            let b = biases[g * og + o];
                            row.mapv_inplace(|v| v + b);
                        }
                    }

                    out.extend(y.iter());
                    cols.push(col);
                }

                (out, cols)
            })
            .collect();

        let mut data = Vec::with_capacity(n * self.out_channels * oh * ow);
        let mut cols = Vec::with_capacity(n * self.groups);
        for (out, sample_cols) in samples {
            data.extend(out);
            cols.extend(sample_cols);
        }

        self.input_dim = (n, c, h, w);
        self.output_dim = (oh, ow);
        self.cols = cols;

        Ok(Array4::from_shape_vec((n, self.out_channels, oh, ow), data)?)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array4<f32>,
    ) -> Result<Array4<f32>> {
        check_size("convolution gradient", grad.len(), self.size())?;

        let (n, c, h, w) = self.input_dim;
        let (oh, ow) = self.output_dim;
        let expected = [n, self.out_channels, oh, ow];
        if d.shape() != expected || self.cols.len() != n * self.groups {
            return Err(MlErr::ShapeMismatch {
                what: "convolution delta",
                got: d.shape().to_vec(),
                expected: expected.to_vec(),
            });
        }

        let d = d
            .as_standard_layout()
            .into_owned()
            .into_shape_with_order((n, self.out_channels, oh * ow))?;
        let weights = self.view_weights(params)?;
        let (cg, og) = (self.group_in(), self.group_out());
        let this = &*self;

        let samples: Vec<(Array2<f32>, Vec<f32>)> = (0..n)
            .into_par_iter()
            .map(|i| {
                let dy = d.index_axis(Axis(0), i);
                let mut dw = Array2::<f32>::zeros((this.out_channels, this.patch()));
                let mut dx = vec![0.; c * h * w];

                for g in 0..this.groups {
                    let rows = g * og..(g + 1) * og;
                    let dyg = dy.slice(s![rows.clone(), ..]);
                    let col = &this.cols[i * this.groups + g];

                    dw.slice_mut(s![rows.clone(), ..]).assign(&dyg.dot(&col.t()));
                    let dcol = weights.slice(s![rows, ..]).reversed_axes().dot(&dyg);
                    this.col2im(&dcol, &mut dx, g * cg, (h, w), (oh, ow));
                }

                (dw, dx)
            })
            .collect();

        let (dw_grad, db_grad) = grad.split_at_mut(self.weight_size());
        let mut dx_data = Vec::with_capacity(n * c * h * w);
        for (dw, dx) in samples {
            dw_grad.iter_mut().zip(dw.iter()).for_each(|(g, v)| *g += v);
            dx_data.extend(dx);
        }

        if self.bias {
            for (o, g) in db_grad.iter_mut().enumerate() {
                *g += d.index_axis(Axis(1), o).sum();
            }
        }

        Ok(Array4::from_shape_vec((n, c, h, w), dx_data)?)
    }

    fn weight_size(&self) -> usize {
        self.out_channels * self.patch()
    }

    fn group_in(&self) -> usize {
        self.in_channels / self.groups
    }

    fn group_out(&self) -> usize {
        self.out_channels / self.groups
    }

    /// The amount of input values a single output value depends on.
    fn patch(&self) -> usize {
        self.group_in() * self.kernel * self.kernel
    }

    fn output_hw(&self, h: usize, w: usize) -> Result<(usize, usize)> {
        let (k, p) = (self.kernel, self.padding);
        if h + 2 * p < k || w + 2 * p < k {
            return Err(MlErr::ShapeMismatch {
                what: "convolution spatial input",
                got: vec![h, w],
                expected: vec![k.saturating_sub(2 * p), k.saturating_sub(2 * p)],
            });
        }

        Ok((
            (h + 2 * p - k) / self.stride + 1,
            (w + 2 * p - k) / self.stride + 1,
        ))
    }

    /// Maps an output coordinate and a kernel offset to the input coordinate it reads from, if it
    /// doesn't fall on the padding.
    #[inline]
    fn source(&self, out: usize, offset: usize, len: usize) -> Option<usize> {
        (out * self.stride + offset)
            .checked_sub(self.padding)
            .filter(|&i| i < len)
    }

    /// Lays out every receptive field of the `c0..c0 + in / groups` channels of `sample` as a
    /// column of a `(patch, oh * ow)` matrix.
    fn im2col(&self, sample: ArrayView3<f32>, c0: usize, (oh, ow): (usize, usize)) -> Array2<f32> {
        let (_, h, w) = sample.dim();
        let k = self.kernel;
        let mut col = Array2::zeros((self.patch(), oh * ow));

        for c in 0..self.group_in() {
            for ki in 0..k {
                for kj in 0..k {
                    let row = (c * k + ki) * k + kj;

                    for oi in 0..oh {
                        let Some(i) = self.source(oi, ki, h) else {
                            continue;
                        };

                        for oj in 0..ow {
                            let Some(j) = self.source(oj, kj, w) else {
                                continue;
                            };

                            col[[row, oi * ow + oj]] = sample[[c0 + c, i, j]];
                        }
                    }
                }
            }
        }

        col
    }

    /// Inverse of `im2col`, accumulates every column value back into the input position it was
    /// read from.
    fn col2im(
        &self,
        dcol: &Array2<f32>,
        dx: &mut [f32],
        c0: usize,
        (h, w): (usize, usize),
        (oh, ow): (usize, usize),
    ) {
        let k = self.kernel;

        for c in 0..self.group_in() {
            for ki in 0..k {
                for kj in 0..k {
                    let row = (c * k + ki) * k + kj;

                    for oi in 0..oh {
                        let Some(i) = self.source(oi, ki, h) else {
                            continue;
                        };

                        for oj in 0..ow {
                            let Some(j) = self.source(oj, kj, w) else {
                                continue;
                            };

                            dx[((c0 + c) * h + i) * w + j] += dcol[[row, oi * ow + oj]];
                        }
                    }
                }
            }
        }
    }

    fn view_weights<'a>(&self, params: &'a [f32]) -> Result<ArrayView2<'a, f32>> {
        check_size("convolution parameters", params.len(), self.size())?;
        let weights = &params[..self.weight_size()];
        Ok(ArrayView2::from_shape((self.out_channels, self.patch()), weights)?)
    }
}
