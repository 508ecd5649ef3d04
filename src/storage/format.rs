use crate::core::{RecoverError, Result};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// On-disk format of a shard unit, identified by its files' extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StorageFormat {
    /// Tokyo Cabinet hash databases, `*.tc`
    TokyoCabinet,
    /// DBM files, `*.dbm`
    Dbm,
    /// SQLite 3 databases, `*.sql3`
    Sqlite3,
}

impl StorageFormat {
    pub const ALL: [StorageFormat; 3] = [Self::TokyoCabinet, Self::Dbm, Self::Sqlite3];

    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension {
            "tc" => Some(Self::TokyoCabinet),
            "dbm" => Some(Self::Dbm),
            "sql3" => Some(Self::Sqlite3),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::TokyoCabinet => "tc",
            Self::Dbm => "dbm",
            Self::Sqlite3 => "sql3",
        }
    }

    /// File holding partition `index`.
    pub fn partition_file(&self, dir: &Path, index: usize) -> PathBuf {
        dir.join(format!("{}.{}", index, self.extension()))
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Format and partition count of the data files in `dir`.
///
/// The format comes from partition file `0.*`; the partition count is the
/// number of files sharing its extension. Anything else fails.
pub fn detect_format(dir: &Path) -> Result<(StorageFormat, usize)> {
    if !dir.is_dir() {
        return Err(RecoverError::Storage(format!(
            "{} does not exist or is not a directory",
            dir.display()
        )));
    }

    let mut extensions = Vec::new();
    let entries = fs::read_dir(dir)
        .map_err(|e| RecoverError::Storage(format!("cannot list {}: {}", dir.display(), e)))?;
    for entry in entries {
        let path = entry
            .map_err(|e| RecoverError::Storage(format!("cannot list {}: {}", dir.display(), e)))?
            .path();
        if !path.is_file() {
            continue;
        }
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default()
            .to_string();
        extensions.push((path, extension));
    }
    extensions.sort();

    let first_partition = extensions
        .iter()
        .filter(|(path, _)| path.file_stem().and_then(|s| s.to_str()) == Some("0"))
        .map(|(_, ext)| ext.as_str())
        .collect::<Vec<_>>();
    let format = first_partition
        .iter()
        .find_map(|ext| StorageFormat::from_extension(ext))
        .ok_or_else(|| RecoverError::UnsupportedStorageFormat {
            path: dir.to_path_buf(),
            extension: first_partition.first().copied().unwrap_or_default().to_string(),
        })?;

    let partitions = extensions
        .iter()
        .filter(|(_, ext)| ext == format.extension())
        .count();
    Ok((format, partitions))
}
