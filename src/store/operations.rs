//! Record file reads, writes, and listing.

use super::record::LeaseRecord;
use super::types::{CorruptRecord, CreateOutcome, StoredEntry, StoredLease};
use crate::codec::RecordKey;
use crate::error::{CadlockError, Result};
use crate::fs::{atomic_create, atomic_write};
use chrono::{DateTime, Utc};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Handle on the shared lease directory.
#[derive(Debug, Clone)]
pub struct LeaseStore {
    dir: PathBuf,
    suffix: String,
    writer_tag: String,
}

impl LeaseStore {
    /// Open a store rooted at `dir` with record files ending in `suffix`.
    ///
    /// `writer_tag` distinguishes this writer's temporary files from those of
    /// other agents sharing the directory.
    pub fn new(dir: impl Into<PathBuf>, suffix: impl Into<String>, writer_tag: &str) -> Self {
        Self {
            dir: dir.into(),
            suffix: suffix.into(),
            writer_tag: format!("{}.{}", writer_tag, std::process::id()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn suffix(&self) -> &str {
        &self.suffix
    }

    /// Create the store directory if it does not exist yet.
    pub fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            CadlockError::StorageUnavailable(format!(
                "failed to create lock directory '{}': {}",
                self.dir.display(),
                e
            ))
        })
    }

    /// Path of the record file for `key`.
    pub fn record_path(&self, key: &RecordKey) -> PathBuf {
        self.dir.join(key.file_name(&self.suffix))
    }

    /// Read the record stored under `key`. `Ok(None)` means absent.
    pub fn read(&self, key: &RecordKey) -> Result<Option<StoredLease>> {
        read_record_file(&self.record_path(key))
    }

    /// Read a record file found by [`LeaseStore::list`].
    pub fn read_path(&self, path: &Path) -> Result<Option<StoredLease>> {
        read_record_file(path)
    }

    /// Check that the store directory is reachable.
    pub fn probe(&self) -> Result<()> {
        match fs::metadata(&self.dir) {
            Ok(meta) if meta.is_dir() => Ok(()),
            Ok(_) => Err(CadlockError::StorageUnavailable(format!(
                "'{}' is not a directory",
                self.dir.display()
            ))),
            Err(e) => Err(CadlockError::StorageUnavailable(format!(
                "lock directory '{}' is unreachable: {}",
                self.dir.display(),
                e
            ))),
        }
    }

    /// Write `record` under `key` only if no record file exists yet.
    pub fn create(&self, key: &RecordKey, record: &LeaseRecord) -> Result<CreateOutcome> {
        let json = record.to_json()?;
        if atomic_create(self.record_path(key), json.as_bytes(), &self.writer_tag)? {
            Ok(CreateOutcome::Created)
        } else {
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    /// Atomically overwrite the record stored under `key`.
    pub fn replace(&self, key: &RecordKey, record: &LeaseRecord) -> Result<()> {
        let json = record.to_json()?;
        atomic_write(self.record_path(key), json.as_bytes(), &self.writer_tag)
    }

    /// Delete the record stored under `key`. Returns `false` if it was already gone.
    pub fn remove(&self, key: &RecordKey) -> Result<bool> {
        remove_record_file(&self.record_path(key))
    }

    /// Delete a record file found by [`LeaseStore::list`].
    pub fn remove_path(&self, path: &Path) -> Result<bool> {
        remove_record_file(path)
    }

    /// List every record file in the store, sorted by key.
    ///
    /// Files not ending in the record suffix and dot-files (temporary files,
    /// stop markers) are skipped. Records that disappear while listing are
    /// skipped as well.
    pub fn list(&self) -> Result<Vec<StoredEntry>> {
        let entries = fs::read_dir(&self.dir).map_err(|e| {
            CadlockError::StorageUnavailable(format!(
                "failed to read lock directory '{}': {}",
                self.dir.display(),
                e
            ))
        })?;

        let mut records = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                CadlockError::StorageUnavailable(format!(
                    "failed to read lock directory entry: {}",
                    e
                ))
            })?;

            let name = entry.file_name();
            let Some(key) = name
                .to_str()
                .and_then(|n| RecordKey::from_file_name(n, &self.suffix))
            else {
                continue;
            };

            let path = entry.path();
            match read_record_file(&path) {
                Ok(Some(lease)) => records.push(StoredEntry { key, path, lease }),
                Ok(None) => debug!(path = %path.display(), "record vanished while listing"),
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable record"),
            }
        }

        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

fn read_record_file(path: &Path) -> Result<Option<StoredLease>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) if e.kind() == io::ErrorKind::InvalidData => String::new(),
        Err(e) => {
            return Err(CadlockError::StorageUnavailable(format!(
                "failed to read lease record '{}': {}",
                path.display(),
                e
            )));
        }
    };

    match LeaseRecord::from_json(&content) {
        Ok(record) => Ok(Some(StoredLease::Valid(record))),
        Err(e) => {
            let modified = match fs::metadata(path).and_then(|m| m.modified()) {
                Ok(time) => DateTime::<Utc>::from(time),
                Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(_) => Utc::now(),
            };
            Ok(Some(StoredLease::Corrupt(CorruptRecord {
                path: path.to_path_buf(),
                modified,
                reason: e.to_string(),
            })))
        }
    }
}

fn remove_record_file(path: &Path) -> Result<bool> {
    match fs::remove_file(path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(CadlockError::StorageUnavailable(format!(
            "failed to remove lease record '{}': {}",
            path.display(),
            e
        ))),
    }
}
