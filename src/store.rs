//! Persistence of the active pack size configuration.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::model::PackSizeConfiguration;

/// Storage backend for the pack size configuration.
pub trait ConfigurationStore: Send + Sync {
    /// Loads the stored sizes, `None` when nothing has been stored yet.
    fn load(&self) -> Result<Option<Vec<u64>>, StoreError>;

    /// Stores the sizes of `config`, replacing any previous contents.
    fn save(&self, config: &PackSizeConfiguration) -> Result<(), StoreError>;
}

#[derive(Serialize, Deserialize)]
struct StoredSizes {
    sizes: Vec<u64>,
}

/// Stores the configuration as `{"sizes": [...]}` in a JSON file.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so readers never observe a partially written file.
#[derive(Clone, Debug)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ConfigurationStore for JsonFileStore {
    fn load(&self) -> Result<Option<Vec<u64>>, StoreError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let stored: StoredSizes = serde_json::from_str(&contents)?;
        Ok(Some(stored.sizes))
    }

    fn save(&self, config: &PackSizeConfiguration) -> Result<(), StoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;

        let stored = StoredSizes {
            sizes: config.sizes().to_vec(),
        };
        let mut file = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut file, &stored)?;
        file.write_all(b"\n")?;
        file.as_file().sync_all()?;
        file.persist(&self.path).map_err(|err| err.error)?;

        tracing::debug!(path = %self.path.display(), "pack sizes persisted");
        Ok(())
    }
}
