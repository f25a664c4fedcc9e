pub mod cifar;
pub mod dataloader;
pub mod download;
pub mod shard;
pub mod transform;

pub use cifar::{CifarDataset, CifarProvider, Split};
pub use dataloader::{DataLoader, LoadedBatch};
pub use download::ensure_downloaded;
pub use shard::ShardSpec;
pub use transform::{Crop, Transform};
