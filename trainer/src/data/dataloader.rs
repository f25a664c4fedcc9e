use machine_learning::{Batch, Result as MlResult};
use ndarray::{Array4, Axis};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::{ThreadPool, prelude::*};

use super::{
    cifar::{CHANNELS, CifarDataset, IMAGE_SIDE},
    shard::ShardSpec,
    transform::Transform,
};

/// A batch of transformed images owned by the loader's caller.
#[derive(Debug, Clone)]
pub struct LoadedBatch {
    pub x: Array4<f32>,
    pub y: Vec<usize>,
}

impl LoadedBatch {
    pub fn as_batch(&self) -> MlResult<Batch<'_>> {
        Batch::new(self.x.view(), &self.y)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.y.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}

/// Shard-aware DataLoader that walks the indices of its shard in order, transforming every
/// sample on a pool of worker threads.
pub struct DataLoader<'a> {
    dataset: &'a CifarDataset,
    transform: Transform,
    shard: ShardSpec,
    indices: Vec<usize>,
    batch_size: usize,
    cursor: usize, // position in `indices`
    pool: &'a ThreadPool,
    rng: StdRng,
}

impl<'a> DataLoader<'a> {
    /// Creates a new `DataLoader`.
    ///
    /// # Arguments
    /// * `dataset` - The split to read.
    /// * `transform` - Applied to every sample.
    /// * `shard` - The part of the split this replica reads.
    /// * `batch_size` - The amount of samples per batch, the last one may be shorter.
    /// * `pool` - The threads samples are transformed on.
    /// * `seed` - Seeds the augmentation.
    pub fn new(
        dataset: &'a CifarDataset,
        transform: Transform,
        shard: ShardSpec,
        batch_size: usize,
        pool: &'a ThreadPool,
        seed: u64,
    ) -> Self {
        assert!(batch_size > 0, "batch_size must be > 0");

        Self {
            dataset,
            transform,
            shard,
            indices: shard.indices(dataset.len()),
            batch_size,
            cursor: 0,
            pool,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    #[inline]
    pub fn shard(&self) -> ShardSpec {
        self.shard
    }

    /// The amount of samples in a full pass over the shard.
    #[inline]
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// The amount of batches in a full pass over the shard.
    pub fn num_batches(&self) -> usize {
        self.indices.len().div_ceil(self.batch_size)
    }

    /// Starts a new pass over the shard, augmentation keeps drawing from the same generator.
    #[inline]
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Returns the next batch for this shard, or None if exhausted.
    pub fn next_batch(&mut self) -> Option<LoadedBatch> {
        if self.cursor >= self.indices.len() {
            return None;
        }

        let end = (self.cursor + self.batch_size).min(self.indices.len());
        let samples: Vec<(usize, u64)> = self.indices[self.cursor..end]
            .iter()
            .map(|&idx| (idx, self.rng.random()))
            .collect();
        self.cursor = end;

        let mut x = Array4::zeros((samples.len(), CHANNELS, IMAGE_SIDE, IMAGE_SIDE));
        let (dataset, transform) = (self.dataset, self.transform);

        self.pool.install(|| {
            x.axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(samples.par_iter())
                .for_each(|(out, &(idx, seed))| {
                    let mut rng = StdRng::seed_from_u64(seed);
                    transform.apply(dataset.image(idx), out, &mut rng);
                });
        });

        let y = samples.iter().map(|&(idx, _)| dataset.label(idx)).collect();
        Some(LoadedBatch { x, y })
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use rayon::ThreadPoolBuilder;

    use super::*;
    use crate::data::{cifar::IMAGE_BYTES, transform::MEAN, transform::STD};

    /// Image `i` has every pixel set to `i` and label `i % 10`.
    fn dataset(n: usize) -> CifarDataset {
        let images = (0..n)
            .flat_map(|i| std::iter::repeat_n(i as u8, IMAGE_BYTES))
            .collect();
        let labels = (0..n).map(|i| (i % 10) as u8).collect();
        CifarDataset::from_raw(images, labels, 10).unwrap()
    }

    fn pool() -> ThreadPool {
        ThreadPoolBuilder::new().num_threads(2).build().unwrap()
    }

    #[test]
    fn dataloader_batches_respect_shard_and_batch_size() {
        let ds = dataset(10);
        let pool = pool();
        let shard = ShardSpec::new(1, NonZeroUsize::new(3).unwrap()); // 1, 4, 7, 0
        let mut dl = DataLoader::new(&ds, Transform::Test, shard, 3, &pool, 0);

        assert_eq!(dl.len(), 4);
        assert_eq!(dl.num_batches(), 2);

        let b1 = dl.next_batch().unwrap();
        assert_eq!(b1.y, [1, 4, 7]);
        assert_eq!(b1.x.shape(), &[3, 3, 32, 32]);
        let expected = (4. / 255. - MEAN[1]) / STD[1];
        assert!((b1.x[[1, 1, 17, 3]] - expected).abs() < 1e-6);

        let b2 = dl.next_batch().unwrap();
        assert_eq!(b2.y, [0]);
        assert_eq!(b2.as_batch().unwrap().len(), 1);

        assert!(dl.next_batch().is_none());

        dl.reset();
        let b3 = dl.next_batch().unwrap();
        assert_eq!(b3.y, [1, 4, 7]);
    }

    #[test]
    fn augmentation_is_reproducible() {
        let ds = dataset(6);
        let pool = pool();
        let load = |seed| {
            let mut dl = DataLoader::new(&ds, Transform::Train, ShardSpec::full(), 6, &pool, seed);
            dl.next_batch().unwrap()
        };

        let (a, b) = (load(11), load(11));
        assert_eq!(a.x, b.x);
        assert_eq!(a.y, [0, 1, 2, 3, 4, 5]);
    }

    #[test]
    fn replicas_beyond_the_dataset_still_get_a_batch() {
        let ds = dataset(1);
        let pool = pool();
        let shard = ShardSpec::new(1, NonZeroUsize::new(2).unwrap());
        let mut dl = DataLoader::new(&ds, Transform::Test, shard, 4, &pool, 0);

        assert_eq!(dl.num_batches(), 1);
        assert_eq!(dl.next_batch().unwrap().y, [0]);
        assert!(dl.next_batch().is_none());
    }
}
