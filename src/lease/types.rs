//! Lease manager results.

use crate::codec::{PathCodec, RecordKey};
use crate::resource::{Owner, ResourceId};
use crate::store::{CorruptRecord, LeaseRecord, StoredLease, format_age};
use std::path::PathBuf;

/// Result of an acquisition attempt.
#[derive(Debug, Clone)]
pub enum Acquisition {
    /// The caller holds the lease.
    Granted {
        record: LeaseRecord,
        /// Whether a new record was written (false for an idempotent re-acquire).
        created: bool,
    },
    /// Another owner holds the lease.
    Denied { holder: LeaseRecord },
}

/// Result of a renewal.
#[derive(Debug, Clone)]
pub enum Renewal {
    /// `last_renewed_at` was advanced.
    Renewed(LeaseRecord),
    /// The record had vanished and was acquired again.
    Reacquired(Acquisition),
    /// The record now belongs to someone else; it was left untouched.
    Lost { holder: LeaseRecord },
}

/// Lease state of one resource, from the caller's point of view.
#[derive(Debug, Clone)]
pub enum LeaseStatus {
    Free,
    HeldByCaller(LeaseRecord),
    HeldByOther(LeaseRecord),
    Corrupt(CorruptRecord),
}

/// A record file as shown to an operator.
#[derive(Debug, Clone)]
pub struct LeaseInfo {
    /// The record file path.
    pub path: PathBuf,

    /// The record key.
    pub key: RecordKey,

    /// The record content.
    pub lease: StoredLease,

    /// Whether the record is past the staleness threshold.
    pub is_stale: bool,

    /// Whether the caller owns the record.
    pub is_mine: bool,
}

impl std::fmt::Display for LeaseInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.lease {
            StoredLease::Valid(record) => write!(
                f,
                "{} (owner: {}, renewed: {} ago, origin: {}{}{})",
                record.resource,
                record.owner,
                format_age(record.age()),
                record.origin,
                if self.is_mine { ", MINE" } else { "" },
                if self.is_stale { ", STALE" } else { "" }
            ),
            StoredLease::Corrupt(corrupt) => {
                // Hashed keys cannot be decoded; show the raw key instead.
                match PathCodec::decode(&self.key) {
                    Some(decoded) => write!(f, "{}", decoded.path)?,
                    None => write!(f, "{}", self.key)?,
                }
                write!(
                    f,
                    " (CORRUPT: {}{})",
                    corrupt.reason,
                    if self.is_stale { ", STALE" } else { "" }
                )
            }
        }
    }
}

/// What one reconciliation cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// Resources whose lease was newly written this cycle.
    pub acquired: Vec<ResourceId>,

    /// Newly active resources held by someone else.
    pub denied: Vec<(ResourceId, Owner)>,

    /// Number of leases renewed.
    pub renewed: usize,

    /// Resources whose lease was deleted by the caller this cycle.
    pub released: Vec<ResourceId>,

    /// Held resources whose record was taken over by another owner.
    pub lost: Vec<(ResourceId, Owner)>,

    /// Stale records of any owner removed by garbage collection.
    pub reclaimed: usize,

    /// Per-resource operations that failed and will be retried next cycle.
    pub failures: usize,
}
