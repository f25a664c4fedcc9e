use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const METRICS_FILE: &str = "metrics.jsonl";

/// A line of the metrics log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "lowercase")]
pub enum Record {
    Train {
        epoch: usize,
        step: u64,
        train_loss: f32,
        train_accuracy: f64,
    },
    Validation {
        epoch: usize,
        val_avg_loss: f32,
        val_accuracy: f64,
        learning_rate: Option<f32>,
    },
}

/// Appends records as json lines to `{log_dir}/metrics.jsonl`.
pub struct MetricsWriter {
    path: PathBuf,
    out: BufWriter<File>,
}

impl MetricsWriter {
    /// Creates the log directory if needed and truncates the metrics file.
    pub fn create(log_dir: &Path) -> Result<Self> {
        fs::create_dir_all(log_dir)?;
        let path = log_dir.join(METRICS_FILE);
        let out = BufWriter::new(File::create(&path)?);

        Ok(Self { path, out })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn write(&mut self, record: &Record) -> Result<()> {
        serde_json::to_writer(&mut self.out, record)?;
        writeln!(self.out)?;
        self.out.flush()?;
        Ok(())
    }
}

/// Reads back every record of a metrics file.
pub fn read_records(path: &Path) -> Result<Vec<Record>> {
    fs::read_to_string(path)?
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| Ok(serde_json::from_str(line)?))
        .collect()
}

/// Counters of a whole run.
#[derive(Debug, Default, Clone)]
pub struct FitMetrics {
    pub train_time: Duration,
    pub val_time: Duration,

    pub epochs: u64,
    pub steps: u64,
    pub samples: u64,
}

impl FitMetrics {
    #[inline]
    pub fn bump_step(&mut self) {
        self.steps += 1;
    }

    #[inline]
    pub fn bump_epoch(&mut self) {
        self.epochs += 1;
    }

    #[inline]
    pub fn add_samples(&mut self, n: usize) {
        self.samples += n as u64;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_are_tagged_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let mut writer = MetricsWriter::create(&dir.path().join("logs")).unwrap();

        let train = Record::Train {
            epoch: 0,
            step: 1,
            train_loss: 2.5,
            train_accuracy: 50.,
        };
        let val = Record::Validation {
            epoch: 0,
            val_avg_loss: 2.25,
            val_accuracy: 12.5,
            learning_rate: Some(0.001),
        };
        writer.write(&train).unwrap();
        writer.write(&val).unwrap();

        let raw = fs::read_to_string(writer.path()).unwrap();
        assert!(raw.lines().next().unwrap().contains(r#""phase":"train""#));
        assert_eq!(read_records(writer.path()).unwrap(), [train, val]);
    }

    #[test]
    fn counters_accumulate() {
        let mut metrics = FitMetrics::default();
        metrics.bump_step();
        metrics.bump_step();
        metrics.add_samples(128);
        metrics.bump_epoch();

        assert_eq!((metrics.epochs, metrics.steps, metrics.samples), (1, 2, 128));
    }
}
