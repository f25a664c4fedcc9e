use std::{
    fs,
    path::{Path, PathBuf},
};

use log::{debug, info};
use once_cell::unsync::OnceCell;

use super::download;
use crate::{
    config::DatasetKind,
    error::{Result, TrainerErr},
};

pub const IMAGE_SIDE: usize = 32;
pub const CHANNELS: usize = 3;
/// Bytes of a single image, stored channel major and row major within each channel.
pub const IMAGE_BYTES: usize = CHANNELS * IMAGE_SIDE * IMAGE_SIDE;

/// The two partitions every CIFAR dataset ships with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

impl DatasetKind {
    /// The directory the binary archive extracts to.
    pub fn archive_dir(&self) -> &'static str {
        match self {
            DatasetKind::Cifar10 => "cifar-10-batches-bin",
            DatasetKind::Cifar100 => "cifar-100-binary",
        }
    }

    /// Bytes preceding the pixels of each record.
    fn label_bytes(&self) -> usize {
        match self {
            DatasetKind::Cifar10 => 1,
            // coarse label first, then the fine one
            DatasetKind::Cifar100 => 2,
        }
    }

    /// Bytes of a whole record, labels included.
    pub fn record_bytes(&self) -> usize {
        self.label_bytes() + IMAGE_BYTES
    }

    /// Records in each file of a split.
    pub fn records_per_file(&self, split: Split) -> usize {
        match (self, split) {
            (DatasetKind::Cifar100, Split::Train) => 50_000,
            _ => 10_000,
        }
    }

    fn split_files(&self, split: Split) -> Vec<String> {
        match (self, split) {
            (DatasetKind::Cifar10, Split::Train) => {
                (1..=5).map(|i| format!("data_batch_{i}.bin")).collect()
            }
            (DatasetKind::Cifar10, Split::Test) => vec!["test_batch.bin".to_string()],
            (DatasetKind::Cifar100, Split::Train) => vec!["train.bin".to_string()],
            (DatasetKind::Cifar100, Split::Test) => vec!["test.bin".to_string()],
        }
    }

    /// The files making up a split, relative to the dataset directory.
    pub fn split_paths(&self, split: Split) -> Vec<PathBuf> {
        let dir = Path::new(self.archive_dir());
        self.split_files(split)
            .into_iter()
            .map(|file| dir.join(file))
            .collect()
    }
}

/// A decoded CIFAR split, kept as raw bytes until a transform reads it.
#[derive(Debug, Clone)]
pub struct CifarDataset {
    images: Vec<u8>,
    labels: Vec<u8>,
    num_classes: usize,
}

impl CifarDataset {
    /// Creates a new `CifarDataset` from already decoded buffers.
    ///
    /// # Arguments
    /// * `images` - `n * IMAGE_BYTES` pixel bytes.
    /// * `labels` - The `n` class indices.
    /// * `num_classes` - The amount of classes, every label must be below it.
    ///
    /// # Returns
    /// A new `CifarDataset` or an error if the buffers are inconsistent.
    pub fn from_raw(images: Vec<u8>, labels: Vec<u8>, num_classes: usize) -> Result<Self> {
        if images.len() != labels.len() * IMAGE_BYTES {
            return Err(TrainerErr::Dataset(format!(
                "{} pixel bytes don't make up {} images",
                images.len(),
                labels.len()
            )));
        }

        if let Some(label) = labels.iter().find(|&&label| label as usize >= num_classes) {
            return Err(TrainerErr::Dataset(format!(
                "label {label} is out of range for {num_classes} classes"
            )));
        }

        Ok(Self {
            images,
            labels,
            num_classes,
        })
    }

    /// Reads a split from the binary files under `root`.
    ///
    /// # Arguments
    /// * `kind` - Which dataset to read.
    /// * `root` - The dataset directory, the one the archive was extracted into.
    /// * `split` - Which partition to read.
    ///
    /// # Returns
    /// The decoded split or an error if a file is missing or malformed.
    pub fn load(kind: DatasetKind, root: &Path, split: Split) -> Result<Self> {
        let mut images = Vec::new();
        let mut labels = Vec::new();

        for path in kind.split_paths(split) {
            let path = root.join(path);
            debug!("reading {}", path.display());

            let bytes = fs::read(&path).map_err(|e| {
                TrainerErr::Dataset(format!("couldn't read {}: {e}", path.display()))
            })?;
            decode_records(kind, &bytes, &mut images, &mut labels).map_err(|e| match e {
                TrainerErr::Dataset(msg) => {
                    TrainerErr::Dataset(format!("{}: {msg}", path.display()))
                }
                other => other,
            })?;
        }

        info!("loaded {} {split:?} images of {kind:?}", labels.len());
        Self::from_raw(images, labels, kind.num_classes())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// The pixels of the image at `idx` (panics if out of bounds).
    #[inline]
    pub fn image(&self, idx: usize) -> &[u8] {
        &self.images[idx * IMAGE_BYTES..(idx + 1) * IMAGE_BYTES]
    }

    /// The label of the image at `idx` (panics if out of bounds).
    #[inline]
    pub fn label(&self, idx: usize) -> usize {
        self.labels[idx] as usize
    }
}

/// Splits a binary file into records, appending their pixels and labels.
fn decode_records(
    kind: DatasetKind,
    bytes: &[u8],
    images: &mut Vec<u8>,
    labels: &mut Vec<u8>,
) -> Result<()> {
    let header = kind.label_bytes();
    let record = kind.record_bytes();

    if bytes.len() % record != 0 {
        return Err(TrainerErr::Dataset(format!(
            "{} bytes is not a whole amount of {record} byte records",
            bytes.len()
        )));
    }

    for chunk in bytes.chunks_exact(record) {
        labels.push(chunk[header - 1]);
        images.extend_from_slice(&chunk[header..]);
    }

    Ok(())
}

/// Builds each split the first time it's asked for, downloading the dataset if needed.
pub struct CifarProvider {
    kind: DatasetKind,
    root: PathBuf,
    download: bool,
    train: OnceCell<CifarDataset>,
    test: OnceCell<CifarDataset>,
}

impl CifarProvider {
    pub fn new(kind: DatasetKind, root: impl Into<PathBuf>, download: bool) -> Self {
        Self {
            kind,
            root: root.into(),
            download,
            train: OnceCell::new(),
            test: OnceCell::new(),
        }
    }

    pub fn kind(&self) -> DatasetKind {
        self.kind
    }

    pub fn train(&self) -> Result<&CifarDataset> {
        self.split(Split::Train)
    }

    pub fn test(&self) -> Result<&CifarDataset> {
        self.split(Split::Test)
    }

    fn split(&self, split: Split) -> Result<&CifarDataset> {
        let cell = match split {
            Split::Train => &self.train,
            Split::Test => &self.test,
        };

        cell.get_or_try_init(|| {
            download::ensure_downloaded(self.kind, &self.root, self.download)?;
            CifarDataset::load(self.kind, &self.root, split)
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cifar10_records_decode() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_cifar10(dir.path(), 3);

        let train = CifarDataset::load(DatasetKind::Cifar10, dir.path(), Split::Train).unwrap();
        assert_eq!(train.len(), 15);
        assert_eq!(train.num_classes(), 10);
        assert_eq!(train.label(4), 1);
        assert!(train.image(4).iter().all(|&p| p == 1));

        let test = CifarDataset::load(DatasetKind::Cifar10, dir.path(), Split::Test).unwrap();
        assert_eq!(test.len(), 3);
        assert_eq!(test.label(2), 2);
    }

    #[test]
    fn cifar100_uses_the_fine_label() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join(DatasetKind::Cifar100.archive_dir());
        fs::create_dir_all(&data).unwrap();

        let mut bytes = vec![3, 87];
        bytes.extend(vec![9; IMAGE_BYTES]);
        fs::write(data.join("test.bin"), bytes).unwrap();

        let test = CifarDataset::load(DatasetKind::Cifar100, dir.path(), Split::Test).unwrap();
        assert_eq!(test.len(), 1);
        assert_eq!(test.label(0), 87);
        assert_eq!(test.image(0), vec![9; IMAGE_BYTES].as_slice());
    }

    #[test]
    fn truncated_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let data = dir.path().join(DatasetKind::Cifar10.archive_dir());
        fs::create_dir_all(&data).unwrap();
        fs::write(data.join("test_batch.bin"), vec![0; IMAGE_BYTES]).unwrap();

        assert!(matches!(
            CifarDataset::load(DatasetKind::Cifar10, dir.path(), Split::Test),
            Err(TrainerErr::Dataset(_))
        ));
    }

    #[test]
    fn raw_labels_are_checked() {
        assert!(CifarDataset::from_raw(vec![0; IMAGE_BYTES], vec![10], 10).is_err());
        assert!(CifarDataset::from_raw(vec![0; IMAGE_BYTES], vec![], 10).is_err());
        assert!(CifarDataset::from_raw(vec![0; IMAGE_BYTES], vec![9], 10).is_ok());
    }

    #[test]
    fn provider_loads_each_split_once() {
        let dir = tempfile::tempdir().unwrap();
        testing::write_cifar10(dir.path(), 2);
        let provider = CifarProvider::new(DatasetKind::Cifar10, dir.path(), false);

        let first = provider.test().unwrap() as *const CifarDataset;
        let second = provider.test().unwrap() as *const CifarDataset;
        assert_eq!(first, second);
        assert_eq!(provider.train().unwrap().len(), 10);
    }

    #[test]
    fn provider_without_files_nor_download_fails() {
        let dir = tempfile::tempdir().unwrap();
        let provider = CifarProvider::new(DatasetKind::Cifar100, dir.path(), false);

        assert!(matches!(provider.train(), Err(TrainerErr::Dataset(_))));
    }
}
