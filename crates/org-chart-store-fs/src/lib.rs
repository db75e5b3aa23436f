// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Filesystem-backed `KeyValueStore` for the organization chart (uses the
//! platform data dir). One file per key; writes go through a temp file and a
//! rename so a crash never leaves a half-written slot.

use directories::ProjectDirs;
use org_chart_core::storage::{KeyValueStore, StorageError};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

const EXTENSION: &str = "value";

/// Store slots as files under a base directory.
#[derive(Debug, Clone)]
pub struct FsStore {
    base: PathBuf,
    quota: Option<u64>,
}

impl FsStore {
    /// Create a store rooted at the user data directory (e.g. `~/.local/share/OrgChart`).
    pub fn new() -> Result<Self, StorageError> {
        let proj = ProjectDirs::from("dev", "flyingrobots", "OrgChart")
            .ok_or_else(|| StorageError::Other("could not resolve data dir".into()))?;
        Self::with_base(proj.data_dir())
    }

    /// Create a store rooted at `base`, creating the directory if needed.
    pub fn with_base(base: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base = base.as_ref().to_path_buf();
        fs::create_dir_all(&base)?;
        Ok(Self { base, quota: None })
    }

    /// Cap the total bytes (keys plus values) the store may hold.
    #[must_use]
    pub fn with_quota(mut self, bytes: u64) -> Self {
        self.quota = Some(bytes);
        self
    }

    /// Directory holding the slot files.
    pub fn base(&self) -> &Path {
        &self.base
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StorageError::InvalidKey(key.to_owned()));
        }
        Ok(self.base.join(format!("{key}.{EXTENSION}")))
    }

    fn used_bytes_without(&self, key: &str) -> Result<u64, StorageError> {
        let mut total = 0;
        for other in self.keys()? {
            if other == key {
                continue;
            }
            let len = fs::metadata(self.path_for(&other)?)?.len();
            total += other.len() as u64 + len;
        }
        Ok(total)
    }
}

impl KeyValueStore for FsStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(path) {
            Ok(value) => Ok(Some(value)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        if let Some(quota) = self.quota {
            if self.used_bytes_without(key)? + (key.len() + value.len()) as u64 > quota {
                return Err(StorageError::QuotaExceeded { key: key.to_owned() });
            }
        }
        let tmp = path.with_extension("tmp");
        let written = fs::write(&tmp, value).and_then(|()| fs::rename(&tmp, &path));
        match written {
            Ok(()) => {
                debug!(key, bytes = value.len(), "slot written");
                Ok(())
            }
            Err(err) => {
                let _ = fs::remove_file(&tmp);
                if err.kind() == io::ErrorKind::StorageFull {
                    Err(StorageError::QuotaExceeded { key: key.to_owned() })
                } else {
                    Err(StorageError::Io(err))
                }
            }
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(StorageError::Io(err)),
        }
    }

    fn keys(&self) -> Result<Vec<String>, StorageError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.base)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_owned());
            }
        }
        keys.sort();
        Ok(keys)
    }
}
