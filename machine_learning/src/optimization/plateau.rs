use log::info;

/// Scales the learning rate down once a decreasing metric stops improving for more than
/// `patience` epochs.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    factor: f32,
    patience: usize,
    threshold: f32,
    eps: f32,

    best: f32,
    num_bad_epochs: usize,
}

impl ReduceLrOnPlateau {
    /// Creates a new `ReduceLrOnPlateau`.
    ///
    /// # Arguments
    /// * `factor` - The learning rate multiplier on every reduction.
    /// * `patience` - The amount of non improving epochs tolerated before reducing.
    /// * `threshold` - The relative decrease that counts as an improvement.
    pub fn new(factor: f32, patience: usize, threshold: f32) -> Self {
        Self {
            factor,
            patience,
            threshold,
            eps: 1e-8,
            best: f32::INFINITY,
            num_bad_epochs: 0,
        }
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }

    pub fn patience(&self) -> usize {
        self.patience
    }

    pub fn best(&self) -> f32 {
        self.best
    }

    pub fn num_bad_epochs(&self) -> usize {
        self.num_bad_epochs
    }

    /// Records the metric of an epoch.
    ///
    /// # Arguments
    /// * `metric` - The monitored value for the epoch that just ended.
    /// * `learning_rate` - The current learning rate.
    ///
    /// # Returns
    /// The learning rate to use from now on.
    pub fn step(&mut self, metric: f32, learning_rate: f32) -> f32 {
        if metric < self.best * (1. - self.threshold) {
            self.best = metric;
            self.num_bad_epochs = 0;
        } else {
            self.num_bad_epochs += 1;
        }

        if self.num_bad_epochs <= self.patience {
            return learning_rate;
        }

        self.num_bad_epochs = 0;

        let reduced = learning_rate * self.factor;
        if learning_rate - reduced <= self.eps {
            return learning_rate;
        }

        info!("reducing learning rate from {learning_rate:.4e} to {reduced:.4e}");
        reduced
    }
}

impl Default for ReduceLrOnPlateau {
    fn default() -> Self {
        Self::new(0.5, 5, 1e-4)
    }
}
