//! Mirror Files
//!
//! One file per live key inside the storage directory. The filename is the
//! hex SHA-256 of the key plus a fixed suffix, so arbitrary keys never put
//! filesystem-unsafe characters in a path and lookup needs no index file.
//! Values may be sensitive, so the directory is created mode 0700 and files
//! are written mode 0600 on Unix.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

use crate::error::{Result, StoreError};

/// Suffix identifying store-owned files; anything else in the directory is ignored
const MIRROR_SUFFIX: &str = ".store.json";

/// On-disk form of one entry. Carries the original key so recovery never has
/// to invert the filename hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MirrorRecord<V> {
    pub key: String,
    pub value: V,
    pub expires_at_ms: u64,
}

/// Write-through mirror of the store inside one directory
#[derive(Debug)]
pub struct MirrorDir {
    dir: PathBuf,
}

impl MirrorDir {
    /// Open the mirror directory, creating it (with parents) if absent
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        create_private_dir(&dir).map_err(|source| StoreError::Storage {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    /// Mirror path for a key: deterministic and collision-resistant
    fn path_for(&self, key: &str) -> PathBuf {
        let digest = Sha256::digest(key.as_bytes());
        self.dir
            .join(format!("{}{}", hex::encode(digest), MIRROR_SUFFIX))
    }

    /// Serialize and write the record, replacing any previous file for the key
    pub fn write<V: Serialize>(&self, record: &MirrorRecord<V>) -> Result<()> {
        let data = serde_json::to_vec(record).map_err(|source| StoreError::Serialize {
            key: record.key.clone(),
            source,
        })?;
        write_private_file(&self.path_for(&record.key), &data).map_err(|source| {
            StoreError::PersistenceWrite {
                key: record.key.clone(),
                source,
            }
        })
    }

    /// Remove the mirror file for a key. A file that is already gone counts
    /// as success, so deletes stay idempotent.
    pub fn remove(&self, key: &str) -> Result<()> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::PersistenceDelete {
                key: key.to_string(),
                source,
            }),
        }
    }

    /// Read every record in the directory. Unreadable or corrupt files are
    /// skipped with a warning so one bad record cannot block recovery of the
    /// rest. Used once, at store construction.
    pub fn load_all<V: DeserializeOwned>(&self) -> Result<Vec<MirrorRecord<V>>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| StoreError::Storage {
            path: self.dir.clone(),
            source,
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StoreError::Storage {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if !is_mirror_file(&path) {
                continue;
            }
            let data = match fs::read(&path) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable mirror file");
                    continue;
                }
            };
            match serde_json::from_slice(&data) {
                Ok(record) => records.push(record),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping corrupt mirror file");
                }
            }
        }
        Ok(records)
    }
}

fn is_mirror_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.ends_with(MIRROR_SUFFIX))
        .unwrap_or(false)
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> io::Result<()> {
    fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(data)
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, data: &[u8]) -> io::Result<()> {
    fs::write(path, data)
}
