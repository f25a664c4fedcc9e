use std::{
    fs,
    path::{Path, PathBuf},
};

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TrainerErr};

/// The image classification datasets that can be trained on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    #[default]
    Cifar10,
    Cifar100,
}

impl DatasetKind {
    pub fn num_classes(&self) -> usize {
        match self {
            DatasetKind::Cifar10 => 10,
            DatasetKind::Cifar100 => 100,
        }
    }
}

/// Everything a training run needs, loaded from a json file and overridden from the command
/// line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub dataset: DatasetKind,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub momentum: f32,
    pub weight_decay: f32,
    pub dataset_dir: PathBuf,
    pub optim: String,
    /// The loss to train with.
    pub loss: String,
    pub num_workers: usize,
    pub model: String,
    pub epochs: usize,
    pub seed: Option<u64>,
    pub device: String,
    /// The amount of replicas the training set is sharded across.
    pub world_size: usize,
    /// The shard this replica trains on.
    pub rank: usize,
    pub log_dir: PathBuf,
    /// Log every this many training steps.
    pub log_every: usize,
    /// Whether missing datasets get downloaded.
    pub download: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset: DatasetKind::Cifar10,
            batch_size: 128,
            learning_rate: 0.001,
            momentum: 0.9,
            weight_decay: 1e-4,
            dataset_dir: PathBuf::from("./data"),
            optim: "adam".to_string(),
            loss: "cross_entropy".to_string(),
            num_workers: 4,
            model: "resnet110".to_string(),
            epochs: 1000,
            seed: None,
            device: "cpu".to_string(),
            world_size: 1,
            rank: 0,
            log_dir: PathBuf::from("./logs"),
            log_every: 50,
            download: true,
        }
    }
}

impl TrainingConfig {
    /// Reads a configuration from a json file, missing fields take their default value.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Checks the bounds every field must respect.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("batch_size", self.batch_size),
            ("num_workers", self.num_workers),
            ("world_size", self.world_size),
            ("log_every", self.log_every),
        ];

        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(TrainerErr::Config(format!("{name} must be greater than 0")));
        }

        if self.rank >= self.world_size {
            return Err(TrainerErr::Config(format!(
                "rank {} is out of range for a world size of {}",
                self.rank, self.world_size
            )));
        }

        if self.learning_rate.is_nan() || self.learning_rate <= 0. {
            return Err(TrainerErr::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }

        Ok(())
    }
}

/// Trains a classifier from the model zoo on CIFAR without distillation.
#[derive(Debug, Default, Parser)]
#[command(name = "trainer", version, about, long_about = None)]
pub struct Cli {
    /// A json file with the base configuration, flags take precedence over it.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print every available model along with its parameter count and exit.
    #[arg(long)]
    pub list_models: bool,

    /// The dataset to train on [default: cifar10].
    #[arg(long, value_enum)]
    pub dataset: Option<DatasetKind>,

    /// Examples per batch [default: 128].
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// The initial learning rate [default: 0.001].
    #[arg(long)]
    pub learning_rate: Option<f32>,

    /// The momentum of sgd [default: 0.9].
    #[arg(long)]
    pub momentum: Option<f32>,

    /// The weight decay of sgd [default: 1e-4].
    #[arg(long)]
    pub weight_decay: Option<f32>,

    /// Where datasets are stored [default: ./data].
    #[arg(long, value_name = "DIR")]
    pub dataset_dir: Option<PathBuf>,

    /// Either adam or sgd [default: adam].
    #[arg(long)]
    pub optim: Option<String>,

    /// The loss to train with [default: cross_entropy].
    #[arg(long)]
    pub loss: Option<String>,

    /// Threads used to load batches [default: 4].
    #[arg(long)]
    pub num_workers: Option<usize>,

    /// The name of the model to train [default: resnet110].
    #[arg(long)]
    pub model: Option<String>,

    /// [default: 1000]
    #[arg(long)]
    pub epochs: Option<usize>,

    /// Makes initialization and augmentation reproducible.
    #[arg(long)]
    pub seed: Option<u64>,

    /// [default: cpu]
    #[arg(long)]
    pub device: Option<String>,

    /// The amount of replicas sharing the training set [default: 1].
    #[arg(long)]
    pub world_size: Option<usize>,

    /// The index of this replica [default: 0].
    #[arg(long)]
    pub rank: Option<usize>,

    /// Where the metrics are written [default: ./logs].
    #[arg(long, value_name = "DIR")]
    pub log_dir: Option<PathBuf>,

    /// Log every this many training steps [default: 50].
    #[arg(long)]
    pub log_every: Option<usize>,

    /// Fail instead of downloading a missing dataset.
    #[arg(long)]
    pub no_download: bool,
}

impl Cli {
    /// Resolves the final configuration: defaults, then the config file, then the flags.
    pub fn into_config(self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_json_file(path)?,
            None => TrainingConfig::default(),
        };

        macro_rules! set {
            ($($field:ident),*) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }

        set!(
            dataset,
            batch_size,
            learning_rate,
            momentum,
            weight_decay,
            dataset_dir,
            optim,
            loss,
            num_workers,
            model,
            epochs,
            device,
            world_size,
            rank,
            log_dir,
            log_every
        );

        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.no_download {
            config.download = false;
        }

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn defaults_match_the_documented_ones() {
        let config = Cli::parse_from(["trainer"]).into_config().unwrap();

        assert_eq!(config, TrainingConfig::default());
        assert_eq!(config.dataset, DatasetKind::Cifar10);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.learning_rate, 0.001);
        assert_eq!(config.momentum, 0.9);
        assert_eq!(config.weight_decay, 1e-4);
        assert_eq!(config.optim, "adam");
        assert_eq!(config.loss, "cross_entropy");
        assert_eq!(config.num_workers, 4);
        assert_eq!(config.model, "resnet110");
    }

    #[test]
    fn flags_override_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"dataset": "cifar100", "batch_size": 64, "model": "vgg11", "seed": 3}}"#
        )
        .unwrap();

        let path = file.path().to_str().unwrap();
        let cli = Cli::parse_from(["trainer", "--config", path, "--batch-size", "32", "--no-download"]);
        let config = cli.into_config().unwrap();

        assert_eq!(config.dataset, DatasetKind::Cifar100);
        assert_eq!(config.batch_size, 32);
        assert_eq!(config.model, "vgg11");
        assert_eq!(config.seed, Some(3));
        assert!(!config.download);
        assert_eq!(config.epochs, 1000);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let cli = Cli::parse_from(["trainer", "--world-size", "2", "--rank", "2"]);
        assert!(matches!(cli.into_config(), Err(TrainerErr::Config(_))));

        let cli = Cli::parse_from(["trainer", "--batch-size", "0"]);
        assert!(matches!(cli.into_config(), Err(TrainerErr::Config(_))));
    }

    #[test]
    fn malformed_file_fails() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{{ not json").unwrap();

        assert!(matches!(
            TrainingConfig::from_json_file(file.path()),
            Err(TrainerErr::Json(_))
        ));
    }

    #[test]
    fn dataset_names_are_lowercase() {
        let json = serde_json::to_string(&DatasetKind::Cifar100).unwrap();
        assert_eq!(json, r#""cifar100""#);
        assert_eq!(DatasetKind::Cifar100.num_classes(), 100);
    }
}
