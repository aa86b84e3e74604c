//! Specgraph snapshot storage
//!
//! A snapshot is stored as two files in the store directory:
//!
//! ```text
//! <name>.json            serialized database (entities and relationships)
//! <name>.manifest.json   creation time, SHA-256 of the data file, counts
//! ```
//!
//! Loading verifies the digest before deserializing, then revalidates and
//! freezes the database, so a loaded snapshot holds the same invariants as
//! a freshly built one.

#[cfg(test)]
mod tests;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use specgraph_db::{Database, DbError, LegacyTag, Region, Resource, Service, Snapshot, TypeDefinition};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const DATA_SUFFIX: &str = ".json";
const MANIFEST_SUFFIX: &str = ".manifest.json";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot (de)serialize {}: {source}", .path.display())]
    Serde {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("snapshot {name} is corrupt: expected sha256 {expected}, found {actual}")]
    DigestMismatch {
        name: String,
        expected: String,
        actual: String,
    },

    #[error("{0:?} is not a valid snapshot name")]
    InvalidName(String),

    #[error("stored snapshot failed to load: {0}")]
    Db(#[from] DbError),
}

pub type Result<T> = std::result::Result<T, StorageError>;

// ============================================================================
// Manifest
// ============================================================================

/// Written next to every stored snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotManifest {
    pub name: String,
    pub created_at: DateTime<Utc>,
    /// Lowercase hex digest of the data file
    pub sha256: String,
    pub bytes: u64,
    /// Entity counts by kind, plus `relationships`
    pub counts: BTreeMap<String, usize>,
}

fn counts(snapshot: &Snapshot) -> BTreeMap<String, usize> {
    BTreeMap::from([
        ("service".to_string(), snapshot.count::<Service>()),
        ("resource".to_string(), snapshot.count::<Resource>()),
        ("typeDefinition".to_string(), snapshot.count::<TypeDefinition>()),
        ("region".to_string(), snapshot.count::<Region>()),
        ("legacyTag".to_string(), snapshot.count::<LegacyTag>()),
        ("relationships".to_string(), snapshot.relationships().len()),
    ])
}

fn sha256_hex(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

// ============================================================================
// Store
// ============================================================================

/// A directory of named snapshots.
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    /// Open (creating if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| StorageError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn data_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{DATA_SUFFIX}"))
    }

    fn manifest_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}{MANIFEST_SUFFIX}"))
    }

    /// Write `snapshot` under `name`, replacing any snapshot of that name.
    pub fn save(&self, name: &str, snapshot: &Snapshot) -> Result<SnapshotManifest> {
        check_name(name)?;
        let data_path = self.data_path(name);
        let bytes = serde_json::to_vec_pretty(snapshot).map_err(|source| StorageError::Serde {
            path: data_path.clone(),
            source,
        })?;
        let manifest = SnapshotManifest {
            name: name.to_string(),
            created_at: Utc::now(),
            sha256: sha256_hex(&bytes),
            bytes: bytes.len() as u64,
            counts: counts(snapshot),
        };
        write_atomic(&data_path, &bytes)?;

        let manifest_path = self.manifest_path(name);
        let manifest_bytes =
            serde_json::to_vec_pretty(&manifest).map_err(|source| StorageError::Serde {
                path: manifest_path.clone(),
                source,
            })?;
        write_atomic(&manifest_path, &manifest_bytes)?;

        tracing::info!(
            name,
            bytes = manifest.bytes,
            sha256 = %manifest.sha256,
            "saved snapshot"
        );
        Ok(manifest)
    }

    pub fn manifest(&self, name: &str) -> Result<SnapshotManifest> {
        check_name(name)?;
        let path = self.manifest_path(name);
        let bytes = read(&path)?;
        serde_json::from_slice(&bytes).map_err(|source| StorageError::Serde { path, source })
    }

    /// Load and verify the snapshot stored under `name`.
    pub fn load(&self, name: &str) -> Result<Snapshot> {
        let manifest = self.manifest(name)?;
        let path = self.data_path(name);
        let bytes = read(&path)?;
        let actual = sha256_hex(&bytes);
        if actual != manifest.sha256 {
            tracing::warn!(name, expected = %manifest.sha256, actual = %actual, "snapshot digest mismatch");
            return Err(StorageError::DigestMismatch {
                name: name.to_string(),
                expected: manifest.sha256,
                actual,
            });
        }
        let db: Database =
            serde_json::from_slice(&bytes).map_err(|source| StorageError::Serde { path, source })?;
        let snapshot = db.freeze()?;
        tracing::debug!(name, resources = snapshot.count::<Resource>(), "loaded snapshot");
        Ok(snapshot)
    }

    /// Names of stored snapshots, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| StorageError::Io {
            path: self.dir.clone(),
            source,
        })?;
        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| StorageError::Io {
                path: self.dir.clone(),
                source,
            })?;
            let file_name = entry.file_name();
            if let Some(name) = file_name.to_str().and_then(|f| f.strip_suffix(MANIFEST_SUFFIX)) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn check_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}

fn read(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| StorageError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write through a temporary sibling, then rename over `path`.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes)
        .and_then(|()| std::fs::rename(&tmp, path))
        .map_err(|source| StorageError::Io {
            path: path.to_path_buf(),
            source,
        })
}
