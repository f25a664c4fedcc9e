use std::{fs, path::Path};

use machine_learning::{
    MlErr, ModelRegistry,
    arch::{Sequential, layers::Layer},
};
use trainer::{
    DatasetKind, TrainerErr, TrainingConfig,
    data::cifar::IMAGE_BYTES,
    metrics::{METRICS_FILE, Record, read_records},
    run,
};

/// Writes every CIFAR-10 file with `per_file` images, image `i` has label `i % 10` and its
/// pixels set to `25 * (i % 10)`.
fn write_cifar10(root: &Path, per_file: usize) {
    let kind = DatasetKind::Cifar10;
    fs::create_dir_all(root.join(kind.archive_dir())).unwrap();

    let paths = kind
        .split_paths(trainer::data::Split::Train)
        .into_iter()
        .chain(kind.split_paths(trainer::data::Split::Test));

    for path in paths {
        let mut bytes = Vec::new();
        for i in 0..per_file {
            let label = (i % 10) as u8;
            bytes.push(label);
            bytes.extend(std::iter::repeat_n(25 * label, IMAGE_BYTES));
        }
        fs::write(root.join(path), bytes).unwrap();
    }
}

fn tiny(num_classes: usize) -> Sequential {
    Sequential::new([
        Layer::global_avg_pool(),
        Layer::flatten(),
        Layer::dense((3, num_classes)),
    ])
}

fn tiny_registry() -> ModelRegistry {
    let mut registry = ModelRegistry::new().with_seed(0);
    registry.register("tiny", tiny).unwrap();
    registry
}

fn config(root: &Path, model: &str) -> TrainingConfig {
    TrainingConfig {
        dataset_dir: root.join("data"),
        log_dir: root.join("logs"),
        model: model.to_string(),
        batch_size: 8,
        epochs: 2,
        num_workers: 2,
        log_every: 1,
        seed: Some(7),
        download: false,
        ..TrainingConfig::default()
    }
}

#[test]
fn tiny_run_writes_metrics() {
    let dir = tempfile::tempdir().unwrap();
    write_cifar10(&dir.path().join("data"), 4);
    let config = config(dir.path(), "tiny");

    let report = run(&config, &tiny_registry()).unwrap();

    assert_eq!(report.epochs.len(), 2);
    assert_eq!(report.metrics.epochs, 2);
    assert_eq!(report.metrics.steps, 6);
    assert_eq!(report.metrics.samples, 40);

    for summary in &report.epochs {
        assert!(summary.avg_val_loss.is_finite());
        assert!((0. ..=100.).contains(&summary.val_accuracy));
        assert_eq!(summary.learning_rate, Some(0.001));
    }

    let records = read_records(&config.log_dir.join(METRICS_FILE)).unwrap();
    assert_eq!(records.len(), 8);

    let validations: Vec<_> = records
        .iter()
        .filter_map(|record| match record {
            Record::Validation { epoch, .. } => Some(*epoch),
            Record::Train { .. } => None,
        })
        .collect();
    assert_eq!(validations, [0, 1]);

    match &records[2] {
        Record::Train { epoch, step, .. } => assert_eq!((*epoch, *step), (0, 3)),
        other => panic!("expected a train record, got {other:?}"),
    }
}

#[test]
fn replicas_only_read_their_shard() {
    let dir = tempfile::tempdir().unwrap();
    write_cifar10(&dir.path().join("data"), 4);
    let config = TrainingConfig {
        world_size: 2,
        rank: 1,
        epochs: 1,
        ..config(dir.path(), "tiny")
    };

    let report = run(&config, &tiny_registry()).unwrap();

    assert_eq!(report.metrics.steps, 2);
    assert_eq!(report.metrics.samples, 10);
}

#[test]
fn replicas_outnumbering_the_test_split_still_validate() {
    let dir = tempfile::tempdir().unwrap();
    write_cifar10(&dir.path().join("data"), 1);
    let config = TrainingConfig {
        world_size: 2,
        rank: 1,
        epochs: 1,
        ..config(dir.path(), "tiny")
    };

    let report = run(&config, &tiny_registry()).unwrap();

    // 5 train images padded to 6, 1 test image read by both replicas
    assert_eq!(report.metrics.samples, 3);
    assert!(report.epochs[0].avg_val_loss.is_finite());
    assert!([0., 100.].contains(&report.epochs[0].val_accuracy));
}

#[test]
fn builtin_model_trains_with_sgd() {
    let dir = tempfile::tempdir().unwrap();
    write_cifar10(&dir.path().join("data"), 2);
    let config = TrainingConfig {
        optim: "sgd".to_string(),
        learning_rate: 0.01,
        epochs: 1,
        ..config(dir.path(), "resnet8_sm")
    };

    let report = run(&config, &ModelRegistry::builtin().with_seed(1)).unwrap();

    assert_eq!(report.metrics.steps, 2);
    assert_eq!(report.epochs[0].learning_rate, Some(0.01));
}

#[test]
fn unknown_model_fails_before_reading_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "resnet110");

    assert!(matches!(
        run(&config, &ModelRegistry::builtin()),
        Err(TrainerErr::Ml(MlErr::NotFound { .. }))
    ));
}

#[test]
fn unsupported_optimizer_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        optim: "rmsprop".to_string(),
        ..config(dir.path(), "tiny")
    };

    assert!(matches!(
        run(&config, &tiny_registry()),
        Err(TrainerErr::Ml(MlErr::UnsupportedOptimizer { .. }))
    ));
}

#[test]
fn unsupported_loss_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = TrainingConfig {
        loss: "mse".to_string(),
        ..config(dir.path(), "tiny")
    };

    assert!(matches!(
        run(&config, &tiny_registry()),
        Err(TrainerErr::Ml(MlErr::UnsupportedLoss { .. }))
    ));
}

#[test]
fn missing_dataset_without_download_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = config(dir.path(), "tiny");

    assert!(matches!(
        run(&config, &tiny_registry()),
        Err(TrainerErr::Dataset(_))
    ));
}
