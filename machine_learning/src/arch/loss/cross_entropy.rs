use std::str::FromStr;

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};

use super::LossFn;
use crate::{MlErr, Result};

/// The supported loss functions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LossKind {
    #[default]
    CrossEntropy,
}

impl FromStr for LossKind {
    type Err = MlErr;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "cross_entropy" | "crossentropy" => Ok(Self::CrossEntropy),
            _ => Err(MlErr::UnsupportedLoss { kind: s.to_string() }),
        }
    }
}

/// Softmax cross entropy over class indices, averaged over the batch.
#[derive(Debug, Default, Clone, Copy)]
pub struct CrossEntropy;

impl CrossEntropy {
    /// Returns a new `CrossEntropy`.
    pub fn new() -> Self {
        Self
    }
}

fn check_labels(logits: &ArrayView2<f32>, labels: &[usize]) -> Result<()> {
    let (n, classes) = logits.dim();
    if labels.len() != n {
        return Err(MlErr::SizeMismatch {
            what: "labels",
            got: labels.len(),
            expected: n,
        });
    }

    match labels.iter().find(|&&label| label >= classes) {
        Some(&label) => Err(MlErr::InvalidLabel { label, classes }),
        None => Ok(()),
    }
}

/// `log(sum(exp(z)))`, shifted by the maximum for stability.
fn log_sum_exp(z: ArrayView1<f32>) -> f32 {
    let max = z.fold(f32::NEG_INFINITY, |m, &v| m.max(v));
    max + z.mapv(|v| (v - max).exp()).sum().ln()
}

impl LossFn for CrossEntropy {
    fn loss(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<f32> {
        check_labels(&logits, labels)?;
        if labels.is_empty() {
            return Err(MlErr::DivisionByZero { what: "loss" });
        }

        let total: f32 = logits
            .outer_iter()
            .zip(labels)
            .map(|(z, &label)| log_sum_exp(z) - z[label])
            .sum();

        Ok(total / labels.len() as f32)
    }

    fn loss_prime(&self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<Array2<f32>> {
        check_labels(&logits, labels)?;
        let n = labels.len().max(1) as f32;

        let mut d = logits.to_owned();
        for (mut row, &label) in d.axis_iter_mut(Axis(0)).zip(labels) {
            let lse = log_sum_exp(row.view());
            row.mapv_inplace(|v| (v - lse).exp() / n);
            row[label] -= 1. / n;
        }

        Ok(d)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn uniform_logits_cost_log_classes() {
        let logits = Array2::zeros((3, 10));
        let loss = CrossEntropy.loss(logits.view(), &[0, 4, 9]).unwrap();

        assert!((loss - 10f32.ln()).abs() < 1e-6);
    }

    #[test]
    fn large_logits_are_stable() {
        let logits = array![[1000., 0.], [0., 1000.]];
        let loss = CrossEntropy.loss(logits.view(), &[0, 1]).unwrap();

        assert!(loss.abs() < 1e-6);
    }

    #[test]
    fn delta_rows_sum_to_zero() {
        let logits = array![[1., 2., 3.], [-1., 0., 4.]];
        let d = CrossEntropy.loss_prime(logits.view(), &[2, 0]).unwrap();

        for row in d.outer_iter() {
            assert!(row.sum().abs() < 1e-6);
        }
        assert!(d[[1, 0]] < 0.);
    }

    #[test]
    fn delta_matches_finite_differences() {
        const H: f32 = 1e-2;
        let logits = array![[0.3, -1.2, 2.0], [1.5, 0.1, -0.4]];
        let labels = [1, 0];
        let d = CrossEntropy.loss_prime(logits.view(), &labels).unwrap();

        for ((i, j), &analytic) in d.indexed_iter() {
            let mut plus = logits.clone();
            let mut minus = logits.clone();
            plus[[i, j]] += H;
            minus[[i, j]] -= H;

            let numeric = (CrossEntropy.loss(plus.view(), &labels).unwrap()
                - CrossEntropy.loss(minus.view(), &labels).unwrap())
                / (2. * H);
            assert!((numeric - analytic).abs() < 1e-3);
        }
    }

    #[test]
    fn out_of_range_label_fails() {
        let logits = Array2::zeros((1, 10));

        assert!(matches!(
            CrossEntropy.loss(logits.view(), &[10]),
            Err(MlErr::InvalidLabel {
                label: 10,
                classes: 10
            })
        ));
    }

    #[test]
    fn loss_names_parse() {
        assert_eq!("cross_entropy".parse::<LossKind>().unwrap(), LossKind::CrossEntropy);
        assert!(matches!(
            "mse".parse::<LossKind>(),
            Err(MlErr::UnsupportedLoss { kind }) if kind == "mse"
        ));
    }
}
