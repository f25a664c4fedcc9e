use std::{num::NonZeroUsize, time::Instant};

use log::{debug, info};
use machine_learning::{
    Device, ModelRegistry, Session, arch::loss::LossKind, training::EpochSummary,
};
use rand::{Rng, SeedableRng, rngs::StdRng};
use rayon::ThreadPoolBuilder;

use crate::{
    config::TrainingConfig,
    data::{CifarProvider, DataLoader, ShardSpec, Split, Transform},
    error::{Result, TrainerErr},
    metrics::{FitMetrics, MetricsWriter, Record},
};

/// What a finished run went through.
#[derive(Debug, Clone)]
pub struct FitReport {
    pub epochs: Vec<EpochSummary>,
    pub metrics: FitMetrics,
}

/// Trains a model from the registry for `config.epochs` epochs, validating on the test split
/// at the end of each of them.
///
/// # Arguments
/// * `config` - The validated run configuration.
/// * `registry` - Where the model is looked up.
///
/// # Returns
/// The summary of every epoch or the first error found.
pub fn run(config: &TrainingConfig, registry: &ModelRegistry) -> Result<FitReport> {
    let device: Device = config.device.parse()?;
    let world_size = NonZeroUsize::new(config.world_size)
        .ok_or_else(|| TrainerErr::Config("world_size must be greater than 0".into()))?;
    let shard = ShardSpec::new(config.rank, world_size);

    let loss: LossKind = config.loss.parse()?;

    let mut session = Session::new(
        registry,
        &config.model,
        config.dataset.num_classes(),
        device,
        loss,
    )?;
    let optimizer = session.configure_optimizer(
        &config.optim,
        config.learning_rate,
        config.momentum,
        config.weight_decay,
    )?;
    info!(
        "training with {} at a learning rate of {}",
        optimizer.name(),
        optimizer.learning_rate()
    );

    let provider = CifarProvider::new(config.dataset, &config.dataset_dir, config.download);
    let pool = ThreadPoolBuilder::new()
        .num_threads(config.num_workers)
        .thread_name(|i| format!("loader-{i}"))
        .build()?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let mut train_loader = DataLoader::new(
        provider.train()?,
        Transform::for_split(Split::Train),
        shard,
        config.batch_size,
        &pool,
        rng.random(),
    );
    let mut val_loader = DataLoader::new(
        provider.test()?,
        Transform::for_split(Split::Test),
        shard,
        config.batch_size,
        &pool,
        rng.random(),
    );
    info!(
        "replica {} of {} reads {} train samples and {} validation samples",
        shard.rank,
        shard.world_size,
        train_loader.len(),
        val_loader.len()
    );

    let mut writer = MetricsWriter::create(&config.log_dir)?;
    let mut metrics = FitMetrics::default();
    let mut epochs = Vec::with_capacity(config.epochs);

    for epoch in 0..config.epochs {
        let start = Instant::now();
        train_loader.reset();

        while let Some(batch) = train_loader.next_batch() {
            let step = session.training_step(batch.as_batch()?)?;
            session.optimizer_step()?;
            metrics.bump_step();
            metrics.add_samples(batch.len());

            if metrics.steps % config.log_every as u64 == 0 {
                debug!(
                    "epoch {epoch} step {}: loss {:.4}, accuracy {:.2}%",
                    metrics.steps, step.loss, step.train_accuracy
                );
                writer.write(&Record::Train {
                    epoch,
                    step: metrics.steps,
                    train_loss: step.loss,
                    train_accuracy: step.train_accuracy,
                })?;
            }
        }
        metrics.train_time += start.elapsed();

        let start = Instant::now();
        val_loader.reset();
        let mut val_losses = Vec::with_capacity(val_loader.num_batches());

        while let Some(batch) = val_loader.next_batch() {
            val_losses.push(session.validation_step(batch.as_batch()?)?.val_loss);
        }

        let summary = session.epoch_end(&val_losses)?;
        metrics.val_time += start.elapsed();
        metrics.bump_epoch();

        info!(
            "epoch {epoch}: val loss {:.4}, val accuracy {:.2}%",
            summary.avg_val_loss, summary.val_accuracy
        );
        writer.write(&Record::Validation {
            epoch,
            val_avg_loss: summary.avg_val_loss,
            val_accuracy: summary.val_accuracy,
            learning_rate: summary.learning_rate,
        })?;
        epochs.push(summary);
    }

    info!(
        "finished {} epochs, {} steps over {} samples in {:?}",
        metrics.epochs,
        metrics.steps,
        metrics.samples,
        metrics.train_time + metrics.val_time
    );

    Ok(FitReport { epochs, metrics })
}

/// Every registered model along with its parameter count, in name order.
pub fn list_models(registry: &ModelRegistry, num_classes: usize) -> Result<Vec<(String, usize)>> {
    registry
        .names()
        .map(|name| Ok((name.to_string(), registry.num_params(name, num_classes)?)))
        .collect()
}
