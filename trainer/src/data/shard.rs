use std::num::NonZeroUsize;

/// The part of a dataset a replica reads.
///
/// Replicas take every `world_size`-th sample starting at their rank. The index space is padded
/// by wrapping around to the first samples until it divides evenly, so every replica of a
/// non empty dataset reads the same amount of samples and none of them is left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardSpec {
    pub rank: usize,
    pub world_size: NonZeroUsize,
}

impl ShardSpec {
    pub fn new(rank: usize, world_size: NonZeroUsize) -> Self {
        assert!(rank < world_size.get(), "rank out of range");
        Self { rank, world_size }
    }

    /// The whole dataset, for a single replica.
    pub fn full() -> Self {
        Self::new(0, NonZeroUsize::MIN)
    }

    /// The amount of samples every replica reads out of `total`.
    #[inline]
    pub fn samples_per_replica(self, total: usize) -> usize {
        total.div_ceil(self.world_size.get())
    }

    /// The dataset indices this replica reads, in order.
    pub fn indices(self, total: usize) -> Vec<usize> {
        if total == 0 {
            return Vec::new();
        }

        let world_size = self.world_size.get();
        let padded = self.samples_per_replica(total) * world_size;

        (self.rank..padded)
            .step_by(world_size)
            .map(|i| i % total)
            .collect()
    }
}
