use std::{
    fs,
    path::{Path, PathBuf},
};

use flate2::read::GzDecoder;
use indicatif::{ProgressBar, ProgressStyle};
use log::{debug, info, warn};

use super::cifar::Split;
use crate::{
    config::DatasetKind,
    error::{Result, TrainerErr},
};

const CIFAR10_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-10-binary.tar.gz";
const CIFAR100_URL: &str = "https://www.cs.toronto.edu/~kriz/cifar-100-binary.tar.gz";

/// Prefix of the directory an archive is unpacked into before it's moved in place.
const STAGING_PREFIX: &str = ".download-";

/// Progress bar template when the size of the archive is known.
const PB_TEMPLATE_SIZED: &str =
    "{msg}\n[{bar:50.cyan/blue}] {bytes}/{total_bytes}  {bytes_per_sec}  ETA {eta}";

/// Progress bar template when the size of the archive is not known.
const PB_TEMPLATE_SPINNER: &str = "{spinner:.green} {msg}  {bytes}  {bytes_per_sec}";

impl DatasetKind {
    /// Where the binary version of the dataset is published.
    pub fn url(&self) -> &'static str {
        match self {
            DatasetKind::Cifar10 => CIFAR10_URL,
            DatasetKind::Cifar100 => CIFAR100_URL,
        }
    }

    /// Every file of a complete extraction, relative to the dataset directory, along with its
    /// size in bytes.
    pub fn expected_files(&self) -> Vec<(PathBuf, u64)> {
        [Split::Train, Split::Test]
            .into_iter()
            .flat_map(|split| {
                let size = (self.records_per_file(split) * self.record_bytes()) as u64;
                self.split_paths(split)
                    .into_iter()
                    .map(move |path| (path, size))
            })
            .collect()
    }
}

/// Makes sure a complete copy of the dataset is extracted under `root`.
///
/// A missing or damaged copy is downloaded again when `download` is set. The archive is unpacked
/// into a staging directory next to the dataset and only moved in place once every file checks
/// out, so an interrupted download never leaves a partial dataset behind.
///
/// # Arguments
/// * `kind` - The dataset to look for.
/// * `root` - The dataset directory.
/// * `download` - Whether to fetch the archive when the dataset is missing or damaged.
///
/// # Returns
/// An error if the dataset is missing and can't be downloaded.
pub fn ensure_downloaded(kind: DatasetKind, root: &Path, download: bool) -> Result<()> {
    ensure_with(kind, root, download, &kind.expected_files(), fetch_and_unpack)
}

fn ensure_with<F>(
    kind: DatasetKind,
    root: &Path,
    download: bool,
    expected: &[(PathBuf, u64)],
    fetch: F,
) -> Result<()>
where
    F: FnOnce(&'static str, &Path) -> Result<()>,
{
    let dir = root.join(kind.archive_dir());
    let problem = match check_files(root, expected) {
        Ok(()) => {
            debug!("found {kind:?} at {}", dir.display());
            return Ok(());
        }
        Err(problem) => problem,
    };

    if !download {
        if dir.is_dir() {
            warn!("{problem}, using {} as is since downloading is disabled", dir.display());
            return Ok(());
        }

        return Err(TrainerErr::Dataset(format!(
            "{} doesn't exist and downloading is disabled",
            dir.display()
        )));
    }

    if dir.exists() {
        warn!("{problem}, downloading {kind:?} again");
    }

    fs::create_dir_all(root)?;
    let staging = tempfile::Builder::new()
        .prefix(STAGING_PREFIX)
        .tempdir_in(root)?;

    fetch(kind.url(), staging.path())?;
    check_files(staging.path(), expected).map_err(|reason| TrainerErr::Download {
        url: kind.url(),
        reason,
    })?;

    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    fs::rename(staging.path().join(kind.archive_dir()), &dir)?;

    info!("{kind:?} is ready at {}", dir.display());
    Ok(())
}

/// Checks every expected file exists under `root` with its exact size.
fn check_files(root: &Path, expected: &[(PathBuf, u64)]) -> std::result::Result<(), String> {
    for (path, size) in expected {
        let path = root.join(path);
        match fs::metadata(&path) {
            Ok(meta) if meta.len() == *size => {}
            Ok(meta) => {
                return Err(format!(
                    "{} has {} bytes instead of {size}",
                    path.display(),
                    meta.len()
                ));
            }
            Err(_) => return Err(format!("{} is missing", path.display())),
        }
    }

    Ok(())
}

/// Streams a `.tar.gz` archive into `dest`, reporting progress on the terminal.
fn fetch_and_unpack(url: &'static str, dest: &Path) -> Result<()> {
    info!("downloading {url}");
    let failed = |reason: String| TrainerErr::Download { url, reason };

    let response = reqwest::blocking::get(url)
        .and_then(|response| response.error_for_status())
        .map_err(|e| failed(e.to_string()))?;

    let (pb, template) = match response.content_length() {
        Some(len) => (ProgressBar::new(len), PB_TEMPLATE_SIZED),
        None => (ProgressBar::new_spinner(), PB_TEMPLATE_SPINNER),
    };
    let style = ProgressStyle::with_template(template).map_err(|e| failed(e.to_string()))?;
    pb.set_style(style.progress_chars("=> "));
    pb.set_message(url);

    let mut archive = tar::Archive::new(GzDecoder::new(pb.wrap_read(response)));
    archive.unpack(dest).map_err(|e| failed(e.to_string()))?;

    pb.finish_and_clear();
    info!("extracted {url}");
    Ok(())
}
