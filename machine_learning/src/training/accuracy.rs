use ndarray::ArrayView2;

use crate::{MlErr, Result};

/// Returns the index of the largest logit of every row, the first one on ties.
pub fn argmax(logits: ArrayView2<f32>) -> Vec<usize> {
    logits
        .outer_iter()
        .map(|row| {
            row.iter()
                .enumerate()
                .fold((0, f32::NEG_INFINITY), |best, (i, &v)| {
                    if v > best.1 { (i, v) } else { best }
                })
                .0
        })
        .collect()
}

/// Cumulative correct over seen counters, reset once per epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunningAccuracy {
    examples_seen: u64,
    correct: u64,
}

impl RunningAccuracy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn examples_seen(&self) -> u64 {
        self.examples_seen
    }

    pub fn correct(&self) -> u64 {
        self.correct
    }

    /// Accounts for a batch of predictions.
    ///
    /// # Arguments
    /// * `logits` - The `(n, classes)` outputs of the model.
    /// * `labels` - The expected class of every example.
    ///
    /// # Returns
    /// The amount of correct predictions in this batch.
    pub fn record(&mut self, logits: ArrayView2<f32>, labels: &[usize]) -> Result<u64> {
        if logits.nrows() != labels.len() {
            return Err(MlErr::SizeMismatch {
                what: "accuracy labels",
                got: labels.len(),
                expected: logits.nrows(),
            });
        }

        let correct = argmax(logits)
            .into_iter()
            .zip(labels)
            .filter(|(prediction, label)| prediction == *label)
            .count() as u64;

        self.examples_seen += labels.len() as u64;
        self.correct += correct;
        Ok(correct)
    }

    /// Returns `100 * correct / examples_seen`.
    ///
    /// # Returns
    /// The percentage or an error if no example was seen since the last reset.
    pub fn percentage(&self) -> Result<f64> {
        if self.examples_seen == 0 {
            return Err(MlErr::DivisionByZero { what: "accuracy" });
        }

        Ok(100. * self.correct as f64 / self.examples_seen as f64)
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
