use ndarray::{Array4, Axis};

use crate::{MlErr, Result};

/// Checks that a pooling window of side `k` tiles the spatial dimensions of `x`.
fn check_window(what: &'static str, x: &Array4<f32>, k: usize) -> Result<(usize, usize)> {
    let (n, c, h, w) = x.dim();
    if k == 0 || h < k || w < k {
        return Err(MlErr::ShapeMismatch {
            what,
            got: vec![n, c, h, w],
            expected: vec![n, c, k, k],
        });
    }

    Ok((h / k, w / k))
}

fn check_delta(what: &'static str, d: &Array4<f32>, expected: [usize; 4]) -> Result<()> {
    if d.shape() != expected {
        return Err(MlErr::ShapeMismatch {
            what,
            got: d.shape().to_vec(),
            expected: expected.to_vec(),
        });
    }

    Ok(())
}

/// Keeps the maximum of every non overlapping `k x k` window.
#[derive(Debug, Clone)]
pub struct MaxPool2d {
    kernel: usize,

    // Forward metadata
    input_dim: (usize, usize, usize, usize),
    argmax: Vec<(usize, usize)>,
}

impl MaxPool2d {
    pub fn new(kernel: usize) -> Self {
        Self {
            kernel,
            input_dim: (0, 0, 0, 0),
            argmax: Vec::new(),
        }
    }

    pub fn forward(&mut self, x: Array4<f32>) -> Result<Array4<f32>> {
        let k = self.kernel;
        let (oh, ow) = check_window("max pool input", &x, k)?;
        let (n, c, _, _) = x.dim();

        let mut argmax = Vec::with_capacity(n * c * oh * ow);
        let y = Array4::from_shape_fn((n, c, oh, ow), |(b, ch, i, j)| {
            let mut best = (i * k, j * k);
            for ki in i * k..(i + 1) * k {
                for kj in j * k..(j + 1) * k {
                    if x[[b, ch, ki, kj]] > x[[b, ch, best.0, best.1]] {
                        best = (ki, kj);
                    }
                }
            }

            argmax.push(best);
            x[[b, ch, best.0, best.1]]
        });

        self.input_dim = x.dim();
        self.argmax = argmax;
        Ok(y)
    }

    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = self.input_dim;
        let (oh, ow) = (h / self.kernel.max(1), w / self.kernel.max(1));
        check_delta("max pool delta", &d, [n, c, oh, ow])?;

        let mut dx = Array4::zeros(self.input_dim);
        for (((b, ch, _, _), &v), &(i, j)) in d.indexed_iter().zip(self.argmax.iter()) {
            dx[[b, ch, i, j]] += v;
        }

        Ok(dx)
    }
}

/// Averages every non overlapping `k x k` window.
#[derive(Debug, Clone)]
pub struct AvgPool2d {
    kernel: usize,

    // Forward metadata
    input_dim: (usize, usize, usize, usize),
}

impl AvgPool2d {
    pub fn new(kernel: usize) -> Self {
        Self {
            kernel,
            input_dim: (0, 0, 0, 0),
        }
    }

    pub fn forward(&mut self, x: Array4<f32>) -> Result<Array4<f32>> {
        let k = self.kernel;
        let (oh, ow) = check_window("average pool input", &x, k)?;
        let (n, c, _, _) = x.dim();
        let area = (k * k) as f32;

        let y = Array4::from_shape_fn((n, c, oh, ow), |(b, ch, i, j)| {
            let mut sum = 0.;
            for ki in i * k..(i + 1) * k {
                for kj in j * k..(j + 1) * k {
                    sum += x[[b, ch, ki, kj]];
                }
            }

            sum / area
        });

        self.input_dim = x.dim();
        Ok(y)
    }

    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        let k = self.kernel.max(1);
        let (n, c, h, w) = self.input_dim;
        check_delta("average pool delta", &d, [n, c, h / k, w / k])?;

        let area = (k * k) as f32;
        Ok(Array4::from_shape_fn(self.input_dim, |(b, ch, i, j)| {
            let (oi, oj) = (i / k, j / k);
            if oi < h / k && oj < w / k {
                d[[b, ch, oi, oj]] / area
            } else {
                0.
            }
        }))
    }
}

/// Averages each channel over its whole spatial extent, `(n, c, h, w)` becomes `(n, c, 1, 1)`.
#[derive(Debug, Clone)]
pub struct GlobalAvgPool {
    input_dim: (usize, usize, usize, usize),
}

impl GlobalAvgPool {
    pub fn new() -> Self {
        Self {
            input_dim: (0, 0, 0, 0),
        }
    }

    pub fn forward(&mut self, x: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = x.dim();
        if h * w == 0 {
            return Err(MlErr::ShapeMismatch {
                what: "global average pool input",
                got: vec![n, c, h, w],
                expected: vec![n, c, 1, 1],
            });
        }

        let area = (h * w) as f32;
        let y = x.sum_axis(Axis(3)).sum_axis(Axis(2)) / area;

        self.input_dim = (n, c, h, w);
        Ok(y.into_shape_with_order((n, c, 1, 1))?)
    }

    pub fn backward(&mut self, d: Array4<f32>) -> Result<Array4<f32>> {
        let (n, c, h, w) = self.input_dim;
        check_delta("global average pool delta", &d, [n, c, 1, 1])?;

        let area = (h * w) as f32;
        Ok(Array4::from_shape_fn(self.input_dim, |(b, ch, _, _)| {
            d[[b, ch, 0, 0]] / area
        }))
    }
}

impl Default for GlobalAvgPool {
    fn default() -> Self {
        Self::new()
    }
}
