//! Store read results.

use super::record::LeaseRecord;
use crate::codec::RecordKey;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Result of reading one record file.
#[derive(Debug, Clone)]
pub enum StoredLease {
    /// A parseable lease record.
    Valid(LeaseRecord),
    /// A record file whose body could not be parsed.
    Corrupt(CorruptRecord),
}

impl StoredLease {
    /// The record, if it parsed.
    pub fn record(&self) -> Option<&LeaseRecord> {
        match self {
            StoredLease::Valid(record) => Some(record),
            StoredLease::Corrupt(_) => None,
        }
    }
}

/// A record file that exists but cannot be parsed.
#[derive(Debug, Clone)]
pub struct CorruptRecord {
    /// Path to the record file.
    pub path: PathBuf,

    /// Last modification time of the file, used for aging it out.
    pub modified: DateTime<Utc>,

    /// Why parsing failed.
    pub reason: String,
}

/// One record file found while listing the store.
#[derive(Debug, Clone)]
pub struct StoredEntry {
    /// Key recovered from the file name.
    pub key: RecordKey,

    /// Path to the record file.
    pub path: PathBuf,

    /// Parsed content.
    pub lease: StoredLease,
}

/// Outcome of an exclusive create.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The record file did not exist and now holds the new record.
    Created,
    /// A record file already existed; nothing was written.
    AlreadyExists,
}
