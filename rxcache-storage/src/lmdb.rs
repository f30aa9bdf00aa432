//! LMDB-backed persistent storage.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep envelopes in a single
//! unnamed database of a memory-mapped environment.
//!
//! # Value Layout
//!
//! - zero bytes: a value-less entry (`put` with `None`)
//! - otherwise `[captured_at_millis: 8 bytes LE][payload as JSON]`
//!
//! # Recovery
//!
//! If the environment cannot be opened because its files are corrupted or
//! are not LMDB files, they are deleted once and the environment is
//! recreated empty. Entries that cannot be decoded are deleted and reported
//! as absent. Both are logged.

use std::io;
use std::path::{Path, PathBuf};

use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions, MdbError};
use rxcache_core::{CacheResult, ConfigError, StorageError, StorageKey, StoredEnvelope};
use serde_json::Value;

use crate::Storage;

const TIMESTAMP_LEN: usize = 8;
const DATA_FILE: &str = "data.mdb";
const LOCK_FILE: &str = "lock.mdb";
const BYTES_PER_MB: usize = 1024 * 1024;

/// Error type for opening an LMDB environment.
#[derive(Debug, thiserror::Error)]
pub enum LmdbStorageError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// The environment files are corrupted or not LMDB files.
    #[error("LMDB environment is corrupted: {0}")]
    Corrupted(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<LmdbStorageError> for rxcache_core::CacheError {
    fn from(e: LmdbStorageError) -> Self {
        rxcache_core::CacheError::Storage(StorageError::Backend {
            reason: e.to_string(),
        })
    }
}

/// Location and size of an LMDB environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LmdbConfig {
    /// Directory holding the environment files.
    pub path: PathBuf,
    /// Maximum size of the memory map in megabytes.
    pub max_size_mb: usize,
}

impl LmdbConfig {
    pub const DEFAULT_MAX_SIZE_MB: usize = 64;

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_size_mb: Self::DEFAULT_MAX_SIZE_MB,
        }
    }

    pub fn with_max_size_mb(mut self, max_size_mb: usize) -> Self {
        self.max_size_mb = max_size_mb;
        self
    }

    /// Load from environment variables.
    ///
    /// - `RXCACHE_LMDB_PATH`: environment directory (required)
    /// - `RXCACHE_LMDB_MAX_SIZE_MB`: map size (default: 64)
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var("RXCACHE_LMDB_PATH")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                field: "RXCACHE_LMDB_PATH".to_string(),
            })?;

        let mut config = Self::new(path);
        if let Ok(raw) = std::env::var("RXCACHE_LMDB_MAX_SIZE_MB") {
            config.max_size_mb = raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|mb| *mb > 0 && mb.checked_mul(BYTES_PER_MB).is_some())
                .ok_or_else(|| ConfigError::InvalidValue {
                    field: "RXCACHE_LMDB_MAX_SIZE_MB".to_string(),
                    value: raw.clone(),
                    reason: "must be a positive integer of addressable megabytes".to_string(),
                })?;
        }
        Ok(config)
    }

    /// Map size in bytes, `None` if it does not fit in `usize`.
    pub fn map_size_bytes(&self) -> Option<usize> {
        self.max_size_mb.checked_mul(BYTES_PER_MB)
    }
}

/// Persistent [`Storage`] over an LMDB environment.
///
/// # Example
///
/// ```ignore
/// use rxcache_storage::{LmdbConfig, LmdbStorage, Storage};
///
/// let storage = LmdbStorage::open(&LmdbConfig::new("/var/cache/app"))?;
/// storage.put(Some("alice"), "profile", Some(&envelope))?;
/// ```
pub struct LmdbStorage {
    env: Env,
    db: Database<Bytes, Bytes>,
    path: PathBuf,
}

impl std::fmt::Debug for LmdbStorage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LmdbStorage").field("path", &self.path).finish()
    }
}

impl LmdbStorage {
    /// Open (or create) the environment at `path`.
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbStorageError> {
        Self::open(&LmdbConfig::new(path.as_ref()).with_max_size_mb(max_size_mb))
    }

    /// Open (or create) the environment described by `config`, recreating it
    /// once if its files are corrupted.
    pub fn open(config: &LmdbConfig) -> Result<Self, LmdbStorageError> {
        std::fs::create_dir_all(&config.path)?;
        tracing::info!(path = %config.path.display(), max_size_mb = config.max_size_mb, "Opening LMDB cache storage");

        match Self::open_env(config) {
            Err(LmdbStorageError::Corrupted(reason)) => {
                tracing::warn!(
                    path = %config.path.display(),
                    %reason,
                    "LMDB cache storage seems corrupted, deleting it"
                );
                remove_if_exists(&config.path.join(DATA_FILE))?;
                remove_if_exists(&config.path.join(LOCK_FILE))?;
                Self::open_env(config)
            }
            other => other,
        }
    }

    fn open_env(config: &LmdbConfig) -> Result<Self, LmdbStorageError> {
        let map_size = config.map_size_bytes().ok_or_else(|| {
            LmdbStorageError::EnvOpen(format!(
                "max_size_mb {} overflows the map size",
                config.max_size_mb
            ))
        })?;
        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(map_size)
                .max_dbs(1)
                .open(&config.path)
        }
        .map_err(|e| match e {
            heed::Error::Mdb(err @ (MdbError::Corrupted | MdbError::Invalid)) => {
                LmdbStorageError::Corrupted(err.to_string())
            }
            other => LmdbStorageError::EnvOpen(other.to_string()),
        })?;

        let mut wtxn = env
            .write_txn()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbStorageError::DbOpen(e.to_string()))?;

        wtxn.commit()
            .map_err(|e| LmdbStorageError::Transaction(e.to_string()))?;

        Ok(Self {
            env,
            db,
            path: config.path.clone(),
        })
    }

    /// Directory of the environment.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Composed keys starting with `prefix`.
    fn collect_keys_with_prefix(&self, prefix: &[u8]) -> CacheResult<Vec<Vec<u8>>> {
        let backend = |e: heed::Error| StorageError::Backend {
            reason: e.to_string(),
        };
        let rtxn = self.env.read_txn().map_err(backend)?;

        let mut keys = Vec::new();
        for result in self.db.iter(&rtxn).map_err(backend)? {
            let (key, _) = result.map_err(backend)?;
            if key.starts_with(prefix) {
                keys.push(key.to_vec());
            }
        }
        Ok(keys)
    }

    fn delete_composed(&self, composed: &str) -> CacheResult<bool> {
        let failed = |e: heed::Error| StorageError::DeleteFailed {
            key: composed.to_string(),
            reason: e.to_string(),
        };
        let mut wtxn = self.env.write_txn().map_err(failed)?;
        let deleted = self.db.delete(&mut wtxn, composed.as_bytes()).map_err(failed)?;
        wtxn.commit().map_err(failed)?;
        Ok(deleted)
    }
}

fn remove_if_exists(path: &Path) -> io::Result<()> {
    match std::fs::remove_file(path) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
        _ => Ok(()),
    }
}

fn encode(envelope: Option<&StoredEnvelope>) -> Result<Vec<u8>, StorageError> {
    let Some(envelope) = envelope else {
        return Ok(Vec::new());
    };
    let payload = serde_json::to_vec(envelope.payload()).map_err(|e| StorageError::Serialization {
        reason: e.to_string(),
    })?;

    let mut bytes = Vec::with_capacity(TIMESTAMP_LEN + payload.len());
    bytes.extend_from_slice(&envelope.captured_at_millis().to_le_bytes());
    bytes.extend_from_slice(&payload);
    Ok(bytes)
}

/// `Ok(None)` for a value-less entry, `Err` with a reason for undecodable bytes.
fn decode(bytes: &[u8]) -> Result<Option<StoredEnvelope>, String> {
    if bytes.is_empty() {
        return Ok(None);
    }
    let (timestamp, payload) = bytes
        .split_first_chunk::<TIMESTAMP_LEN>()
        .ok_or_else(|| format!("value is {} bytes, shorter than its timestamp", bytes.len()))?;
    let captured_at_millis = i64::from_le_bytes(*timestamp);
    let value: Value = serde_json::from_slice(payload).map_err(|e| e.to_string())?;
    Ok(Some(StoredEnvelope::from_value(captured_at_millis, value)))
}

impl Storage for LmdbStorage {
    fn close(&self) -> CacheResult<()> {
        tracing::trace!(path = %self.path.display(), "Closing LMDB cache storage");
        self.env.force_sync().map_err(|e| StorageError::Backend {
            reason: e.to_string(),
        })?;
        Ok(())
    }

    fn clear(&self) -> CacheResult<()> {
        let backend = |e: heed::Error| StorageError::Backend {
            reason: e.to_string(),
        };
        let mut wtxn = self.env.write_txn().map_err(backend)?;
        self.db.clear(&mut wtxn).map_err(backend)?;
        wtxn.commit().map_err(backend)?;
        Ok(())
    }

    fn clear_prefix(&self, session: Option<&str>, key_prefix: &str) -> CacheResult<()> {
        let prefix = StorageKey::namespace_prefix(session, key_prefix);
        let keys = self.collect_keys_with_prefix(prefix.as_bytes())?;
        if keys.is_empty() {
            return Ok(());
        }

        let failed = |e: heed::Error| StorageError::DeleteFailed {
            key: prefix.clone(),
            reason: e.to_string(),
        };
        let mut wtxn = self.env.write_txn().map_err(failed)?;
        for key in &keys {
            self.db.delete(&mut wtxn, key).map_err(failed)?;
        }
        wtxn.commit().map_err(failed)?;
        Ok(())
    }

    fn delete(&self, session: Option<&str>, key: &str) -> CacheResult<()> {
        let composed = StorageKey::new(session, key).compose();
        self.delete_composed(&composed)?;
        Ok(())
    }

    fn put(
        &self,
        session: Option<&str>,
        key: &str,
        envelope: Option<&StoredEnvelope>,
    ) -> CacheResult<()> {
        let composed = StorageKey::new(session, key).compose();
        let bytes = encode(envelope)?;

        let failed = |e: heed::Error| StorageError::WriteFailed {
            key: composed.clone(),
            reason: e.to_string(),
        };
        let mut wtxn = self.env.write_txn().map_err(failed)?;
        self.db
            .put(&mut wtxn, composed.as_bytes(), &bytes)
            .map_err(failed)?;
        wtxn.commit().map_err(failed)?;
        Ok(())
    }

    fn get(&self, session: Option<&str>, key: &str) -> CacheResult<Option<StoredEnvelope>> {
        let composed = StorageKey::new(session, key).compose();
        let failed = |e: heed::Error| StorageError::ReadFailed {
            key: composed.clone(),
            reason: e.to_string(),
        };

        let bytes = {
            let rtxn = self.env.read_txn().map_err(failed)?;
            self.db
                .get(&rtxn, composed.as_bytes())
                .map_err(failed)?
                .map(<[u8]>::to_vec)
        };
        let Some(bytes) = bytes else {
            return Ok(None);
        };

        match decode(&bytes) {
            Ok(envelope) => Ok(envelope),
            Err(reason) => {
                tracing::warn!(key = %composed, %reason, "Cached entry couldn't be decoded, deleting it");
                self.delete_composed(&composed)?;
                Ok(None)
            }
        }
    }

    fn exists(&self, session: Option<&str>, key: &str) -> CacheResult<bool> {
        let composed = StorageKey::new(session, key).compose();
        let failed = |e: heed::Error| StorageError::ReadFailed {
            key: composed.clone(),
            reason: e.to_string(),
        };
        let rtxn = self.env.read_txn().map_err(failed)?;
        Ok(self.db.get(&rtxn, composed.as_bytes()).map_err(failed)?.is_some())
    }

    fn count(&self) -> CacheResult<u64> {
        let backend = |e: heed::Error| StorageError::Backend {
            reason: e.to_string(),
        };
        let rtxn = self.env.read_txn().map_err(backend)?;
        Ok(self.db.len(&rtxn).map_err(backend)?)
    }

    fn count_prefix(&self, session: Option<&str>, key_prefix: &str) -> CacheResult<u64> {
        let prefix = StorageKey::namespace_prefix(session, key_prefix);
        Ok(self.collect_keys_with_prefix(prefix.as_bytes())?.len() as u64)
    }
}
