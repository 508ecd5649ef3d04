pub mod engine;
pub mod format;
pub mod memory;
pub mod sqlite;
pub mod unit;

pub use engine::{
    DefaultStorageFactory, StorageBackend, StorageFactory, StorageOptions, VnodeDump, open_storage,
    partition_for,
};
pub use format::{StorageFormat, detect_format};
pub use memory::MemoryStorage;
pub use sqlite::Sqlite3Storage;
pub use unit::ShardUnit;
