use crate::core::{RecoverError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// A named directory holding one storage backend's files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardUnit {
    pub name: String,
    pub path: PathBuf,
}

impl ShardUnit {
    /// Every subdirectory of `root`, ordered by name.
    pub fn discover(root: &Path) -> Result<Vec<ShardUnit>> {
        let entries = fs::read_dir(root).map_err(|e| {
            RecoverError::Storage(format!("cannot list storage root {}: {}", root.display(), e))
        })?;

        let mut units = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                RecoverError::Storage(format!("cannot list storage root {}: {}", root.display(), e))
            })?;
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            units.push(ShardUnit {
                name: name.to_string(),
                path: path.clone(),
            });
        }
        units.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(units)
    }
}
