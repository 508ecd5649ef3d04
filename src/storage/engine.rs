use super::format::{StorageFormat, detect_format};
use super::sqlite::Sqlite3Storage;
use super::unit::ShardUnit;
use crate::core::{RecoverError, Result, VnodeId};
use bytes::Bytes;
use std::path::PathBuf;
use tracing::info;

/// Lazy, finite sequence of encoded dump records of one vnode.
pub type VnodeDump<'a> = Box<dyn Iterator<Item = Result<Bytes>> + 'a>;

/// Storage backend trait - read side of a shard unit's local snapshot
pub trait StorageBackend: Send {
    fn format(&self) -> StorageFormat;

    fn open(&mut self) -> Result<()>;

    /// Records of `vnode` in storage dump layout. Can be consumed once.
    fn each_vn_dump(&mut self, vnode: VnodeId) -> Result<VnodeDump<'_>>;

    fn close(&mut self) -> Result<()>;
}

/// What a backend needs to know to open a shard unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageOptions {
    pub path: PathBuf,
    pub format: StorageFormat,
    /// Number of data files the unit's keys are divided into.
    pub partition_count: usize,
    /// Vnodes the run will dump.
    pub vnodes: Vec<VnodeId>,
}

/// Builds a backend for a detected format.
pub trait StorageFactory: Send + Sync {
    fn create(&self, options: StorageOptions) -> Result<Box<dyn StorageBackend>>;
}

/// Backends compiled into this crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultStorageFactory;

impl StorageFactory for DefaultStorageFactory {
    fn create(&self, options: StorageOptions) -> Result<Box<dyn StorageBackend>> {
        match options.format {
            StorageFormat::Sqlite3 => Ok(Box::new(Sqlite3Storage::new(options))),
            format @ (StorageFormat::TokyoCabinet | StorageFormat::Dbm) => {
                Err(RecoverError::Storage(format!(
                    "{}: no '{}' storage engine is available in this build",
                    options.path.display(),
                    format
                )))
            }
        }
    }
}

/// Resolves, configures and opens the backend of `unit`.
pub fn open_storage(
    unit: &ShardUnit,
    vnodes: &[VnodeId],
    factory: &dyn StorageFactory,
) -> Result<Box<dyn StorageBackend>> {
    let (format, partition_count) = detect_format(&unit.path)?;
    info!(
        unit = %unit.name,
        format = %format,
        partition_count,
        "resolved storage backend"
    );

    let mut backend = factory.create(StorageOptions {
        path: unit.path.clone(),
        format,
        partition_count,
        vnodes: vnodes.to_vec(),
    })?;
    backend.open()?;
    Ok(backend)
}

/// Partition file holding the data of `vnode`.
pub fn partition_for(vnode: VnodeId, partition_count: usize) -> usize {
    if partition_count == 0 {
        return 0;
    }
    crc32fast::hash(vnode.to_string().as_bytes()) as usize % partition_count
}
