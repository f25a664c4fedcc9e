use rand::Rng;
use rand_distr::{Distribution, Normal, Uniform};

use super::ParamGen;
use crate::Result;

/// A parameter generator that follows a certain probabilistic distribution.
pub struct RandParamGen<'r, R: Rng, D: Distribution<f32>> {
    rng: &'r mut R,
    distribution: D,
}

impl<'r, R: Rng, D: Distribution<f32>> RandParamGen<'r, R, D> {
    /// Creates a new `RandParamGen` parameter generator.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `distribution` - The distribution to sample the random numbers from.
    pub fn new(rng: &'r mut R, distribution: D) -> Self {
        Self { rng, distribution }
    }
}

impl<'r, R: Rng> RandParamGen<'r, R, Uniform<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a uniform distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `low` - The inclusive lower limit.
    /// * `high` - The exclusive upper limit.
    ///
    /// # Returns
    /// An error if the range is invalid (low >= high).
    pub fn uniform(rng: &'r mut R, low: f32, high: f32) -> Result<Self> {
        Ok(Self::new(rng, Uniform::new(low, high)?))
    }

    /// Creates a new `RandParamGen` parameter generator sampling from `U(-1/√fan_in, 1/√fan_in)`,
    /// the default for fully connected layers.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `fan_in` - The number of input units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated range is invalid.
    pub fn fan_in_uniform(rng: &'r mut R, fan_in: usize) -> Result<Self> {
        let bound = 1. / (fan_in.max(1) as f32).sqrt();
        Self::uniform(rng, -bound, bound)
    }
}

impl<'r, R: Rng> RandParamGen<'r, R, Normal<f32>> {
    /// Creates a new `RandParamGen` parameter generator with a normal distribution.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `mean` - The mean of the distribution.
    /// * `std_dev` - The standard deviation of the distribution.
    ///
    /// # Returns
    /// An error if `std_dev` is not finite (Nan or infinite).
    pub fn normal(rng: &'r mut R, mean: f32, std_dev: f32) -> Result<Self> {
        Ok(Self::new(rng, Normal::new(mean, std_dev)?))
    }

    /// Creates a new `RandParamGen` parameter generator using Kaiming normal initialization.
    ///
    /// # Arguments
    /// * `rng` - A random number generator.
    /// * `fan_in` - The number of input units in the weight tensor.
    ///
    /// # Returns
    /// An error if the calculated standard deviation is not finite (Nan or infinite).
    pub fn kaiming(rng: &'r mut R, fan_in: usize) -> Result<Self> {
        let std_dev = (2. / fan_in.max(1) as f32).sqrt();
        Self::normal(rng, 0., std_dev)
    }
}

impl<R: Rng, D: Distribution<f32>> ParamGen for RandParamGen<'_, R, D> {
    fn fill(&mut self, params: &mut [f32]) {
        for p in params.iter_mut() {
            *p = self.distribution.sample(&mut *self.rng);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn uniform_stays_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        let mut params = [0.; 64];

        RandParamGen::fan_in_uniform(&mut rng, 16)
            .unwrap()
            .fill(&mut params);

        assert!(params.iter().all(|p| (-0.25..0.25).contains(p)));
        assert!(params.iter().any(|&p| p != 0.));
    }

    #[test]
    fn same_seed_same_params() {
        let mut a = [0.; 8];
        let mut b = [0.; 8];

        let mut rng = StdRng::seed_from_u64(7);
        RandParamGen::kaiming(&mut rng, 9).unwrap().fill(&mut a);
        let mut rng = StdRng::seed_from_u64(7);
        RandParamGen::kaiming(&mut rng, 9).unwrap().fill(&mut b);

        assert_eq!(a, b);
    }

    #[test]
    fn invalid_range_fails() {
        let mut rng = StdRng::seed_from_u64(42);
        assert!(RandParamGen::uniform(&mut rng, 1., -1.).is_err());
    }
}
