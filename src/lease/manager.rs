//! Acquire, renew, release, and reclaim.

use super::types::{Acquisition, LeaseInfo, LeaseStatus, Renewal};
use crate::codec::{PathCodec, RecordKey};
use crate::config::types::default_stale_minutes;
use crate::error::{CadlockError, Result};
use crate::resource::{Owner, ResourceId};
use crate::store::{CreateOutcome, LeaseRecord, LeaseStore, Origin, StoredLease, is_stale};
use chrono::{Duration, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// How many times a lost create race is re-read before giving up.
const MAX_ACQUIRE_ATTEMPTS: usize = 3;

/// Lease operations on behalf of one owner.
#[derive(Debug, Clone)]
pub struct LeaseManager {
    store: LeaseStore,
    codec: PathCodec,
    owner: Owner,

    /// Age past which another owner's record no longer blocks acquisition.
    stale_after: Duration,
}

impl LeaseManager {
    pub fn new(store: LeaseStore, codec: PathCodec, owner: Owner) -> Self {
        Self {
            store,
            codec,
            owner,
            stale_after: Duration::minutes(i64::from(default_stale_minutes())),
        }
    }

    /// Treat foreign records older than `stale_after` as abandoned when acquiring.
    pub fn with_stale_after(mut self, stale_after: Duration) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn owner(&self) -> &Owner {
        &self.owner
    }

    pub fn store(&self) -> &LeaseStore {
        &self.store
    }

    /// Record key for a resource.
    pub fn key_for(&self, resource: &ResourceId) -> RecordKey {
        self.codec.encode(resource)
    }

    /// Acquire the lease on `resource`.
    ///
    /// Absent (or corrupt) records are created; a record already owned by the
    /// caller is refreshed; a record owned by anyone else is left alone and
    /// returned as [`Acquisition::Denied`], unless it is past the staleness
    /// threshold, in which case it is removed and replaced. A `Manual`
    /// acquisition upgrades the caller's own `AutoDetected` record, never the
    /// reverse.
    pub fn acquire(&self, resource: &ResourceId, origin: Origin) -> Result<Acquisition> {
        let key = self.key_for(resource);

        for attempt in 1..=MAX_ACQUIRE_ATTEMPTS {
            match self.store.read(&key)? {
                Some(StoredLease::Valid(record)) if record.resource != *resource => {
                    return Err(self.key_collision(&key, resource, &record));
                }
                None => {
                    let record = LeaseRecord::new(resource.clone(), self.owner.clone(), origin);
                    match self.store.create(&key, &record)? {
                        CreateOutcome::Created => {
                            if let Some(outcome) = self.confirm(&key, true)? {
                                return Ok(outcome);
                            }
                        }
                        CreateOutcome::AlreadyExists => {
                            debug!(resource = %resource, attempt, "lost create race, re-reading");
                        }
                    }
                }
                Some(StoredLease::Valid(mut record)) if record.owner == self.owner => {
                    record.touch();
                    if origin == Origin::Manual {
                        record.origin = Origin::Manual;
                    }
                    self.store.replace(&key, &record)?;
                    return Ok(Acquisition::Granted {
                        record,
                        created: false,
                    });
                }
                Some(StoredLease::Valid(holder)) if holder.is_stale(self.stale_after) => {
                    self.take_over(&key, &holder)?;
                }
                Some(StoredLease::Valid(holder)) => {
                    debug!(resource = %resource, holder = %holder.owner, "lease held by another owner");
                    return Ok(Acquisition::Denied { holder });
                }
                Some(StoredLease::Corrupt(corrupt)) => {
                    warn!(
                        path = %corrupt.path.display(),
                        reason = %corrupt.reason,
                        "corrupt lease record treated as absent"
                    );
                    let record = LeaseRecord::new(resource.clone(), self.owner.clone(), origin);
                    self.store.replace(&key, &record)?;
                    if let Some(outcome) = self.confirm(&key, true)? {
                        return Ok(outcome);
                    }
                }
            }
        }

        Err(CadlockError::RaceLost(format!(
            "lease for '{}' kept changing after {} attempts",
            resource, MAX_ACQUIRE_ATTEMPTS
        )))
    }

    /// Remove a foreign record found stale, re-checking it right before the
    /// delete. The caller re-reads afterwards either way.
    fn take_over(&self, key: &RecordKey, holder: &LeaseRecord) -> Result<()> {
        match self.store.read(key)? {
            Some(StoredLease::Valid(current))
                if current.owner == holder.owner && current.is_stale(self.stale_after) =>
            {
                if self.store.remove(key)? {
                    info!(
                        resource = %current.resource,
                        holder = %current.owner,
                        last_renewed_at = %current.last_renewed_at,
                        "removed stale lease before acquiring"
                    );
                }
            }
            _ => debug!(key = %key, "stale lease changed before takeover, re-reading"),
        }
        Ok(())
    }

    /// Two distinct resources encoded to the same key, which happens when
    /// agents sharing a lock directory use different resource roots.
    fn key_collision(
        &self,
        key: &RecordKey,
        resource: &ResourceId,
        record: &LeaseRecord,
    ) -> CadlockError {
        warn!(
            key = %key,
            resource = %resource,
            recorded = %record.resource,
            holder = %record.owner,
            "lease key collision"
        );
        CadlockError::KeyCollision(format!(
            "lease record '{}' is for '{}' (owner {}), not '{}'\n\
             Fix: every agent sharing a lock directory must use the same resource_root.",
            key, record.resource, record.owner, resource
        ))
    }

    /// Re-read a record just written. `None` means it vanished or was
    /// clobbered, and the caller should start over.
    fn confirm(&self, key: &RecordKey, created: bool) -> Result<Option<Acquisition>> {
        match self.store.read(key)? {
            Some(StoredLease::Valid(record)) if record.owner == self.owner => {
                Ok(Some(Acquisition::Granted { record, created }))
            }
            Some(StoredLease::Valid(holder)) => {
                info!(key = %key, holder = %holder.owner, "lease taken by another owner while writing");
                Ok(Some(Acquisition::Denied { holder }))
            }
            _ => Ok(None),
        }
    }

    /// Delete the caller's lease on `resource`. Returns whether a record was removed.
    ///
    /// A missing record or one owned by someone else is a no-op.
    pub fn release(&self, resource: &ResourceId) -> Result<bool> {
        self.release_matching(resource, None)
    }

    /// Like [`LeaseManager::release`], restricted to records of one origin.
    pub(crate) fn release_matching(
        &self,
        resource: &ResourceId,
        only: Option<Origin>,
    ) -> Result<bool> {
        let key = self.key_for(resource);
        match self.store.read(&key)? {
            Some(StoredLease::Valid(record)) if record.resource != *resource => {
                // Never delete a record for a different resource.
                self.key_collision(&key, resource, &record);
                Ok(false)
            }
            Some(StoredLease::Valid(record))
                if record.owner == self.owner && only.is_none_or(|o| o == record.origin) =>
            {
                self.store.remove(&key)
            }
            Some(StoredLease::Valid(record)) if record.owner != self.owner => {
                debug!(resource = %resource, holder = %record.owner, "not releasing foreign lease");
                Ok(false)
            }
            _ => Ok(false),
        }
    }

    /// Advance `last_renewed_at` on the caller's lease.
    ///
    /// A vanished record (reclaimed while still in use) is acquired again as
    /// `AutoDetected`; a record now owned by someone else is reported as lost.
    pub fn renew(&self, resource: &ResourceId) -> Result<Renewal> {
        let key = self.key_for(resource);
        match self.store.read(&key)? {
            Some(StoredLease::Valid(record)) if record.resource != *resource => {
                Err(self.key_collision(&key, resource, &record))
            }
            Some(StoredLease::Valid(mut record)) if record.owner == self.owner => {
                record.touch();
                self.store.replace(&key, &record)?;
                Ok(Renewal::Renewed(record))
            }
            Some(StoredLease::Valid(holder)) => {
                warn!(resource = %resource, holder = %holder.owner, "held lease now owned by another owner");
                Ok(Renewal::Lost { holder })
            }
            None | Some(StoredLease::Corrupt(_)) => {
                warn!(resource = %resource, "held lease vanished, re-acquiring");
                Ok(Renewal::Reacquired(
                    self.acquire(resource, Origin::AutoDetected)?,
                ))
            }
        }
    }

    /// Delete stale records and return how many were removed.
    ///
    /// With `owned_only`, candidates are restricted to the caller's own
    /// `AutoDetected` leases (cleanup when activity ends or on shutdown);
    /// otherwise any owner's record past `max_age` is removed (garbage
    /// collection of leases abandoned by crashed agents), together with corrupt
    /// files whose modification time is past `max_age`.
    pub fn reclaim_stale(&self, max_age: Duration, owned_only: bool) -> Result<usize> {
        Ok(self.reclaim(max_age, owned_only)?.len())
    }

    /// [`LeaseManager::reclaim_stale`], returning the removed records.
    pub(crate) fn reclaim(&self, max_age: Duration, owned_only: bool) -> Result<Vec<LeaseRecord>> {
        let mut removed = Vec::new();

        for entry in self.store.list()? {
            match &entry.lease {
                StoredLease::Valid(record) => {
                    if !self.reclaimable(record, max_age, owned_only) {
                        continue;
                    }

                    // Re-check right before deleting: the owner may have renewed,
                    // or upgraded the lease to manual.
                    let still_stale = match self.store.read_path(&entry.path) {
                        Ok(Some(StoredLease::Valid(current))) => {
                            current.owner == record.owner
                                && self.reclaimable(&current, max_age, owned_only)
                        }
                        Ok(_) => false,
                        Err(e) => {
                            warn!(path = %entry.path.display(), error = %e, "skipping reclaim");
                            false
                        }
                    };
                    if !still_stale {
                        continue;
                    }

                    match self.store.remove_path(&entry.path) {
                        Ok(true) => {
                            info!(
                                resource = %record.resource,
                                owner = %record.owner,
                                "reclaimed lease"
                            );
                            removed.push(record.clone());
                        }
                        Ok(false) => {}
                        Err(e) => warn!(path = %entry.path.display(), error = %e, "reclaim failed"),
                    }
                }
                StoredLease::Corrupt(corrupt) => {
                    if owned_only {
                        continue;
                    }
                    let age = Utc::now().signed_duration_since(corrupt.modified);
                    if !is_stale(age, max_age) {
                        debug!(path = %corrupt.path.display(), "corrupt record not old enough to remove");
                        continue;
                    }
                    match self.store.remove_path(&corrupt.path) {
                        Ok(true) => {
                            warn!(path = %corrupt.path.display(), "removed corrupt lease record");
                        }
                        Ok(false) => {}
                        Err(e) => {
                            warn!(path = %corrupt.path.display(), error = %e, "reclaim failed")
                        }
                    }
                }
            }
        }

        Ok(removed)
    }

    /// Whether a reclaim pass may delete `record`.
    ///
    /// An owned-only pass with a zero `max_age` drains every own auto lease
    /// regardless of its timestamp. Any other pass needs the record to be
    /// strictly older than `max_age`.
    pub(super) fn reclaimable(&self, record: &LeaseRecord, max_age: Duration, owned_only: bool) -> bool {
        if owned_only {
            self.is_own_auto(record) && (max_age <= Duration::zero() || record.is_stale(max_age))
        } else {
            record.is_stale(max_age)
        }
    }

    fn is_own_auto(&self, record: &LeaseRecord) -> bool {
        record.owner == self.owner && record.origin == Origin::AutoDetected
    }

    /// Lease state of one resource.
    pub fn status(&self, resource: &ResourceId) -> Result<LeaseStatus> {
        let key = self.key_for(resource);
        Ok(match self.store.read(&key)? {
            Some(StoredLease::Valid(record)) if record.resource != *resource => {
                return Err(self.key_collision(&key, resource, &record));
            }
            None => LeaseStatus::Free,
            Some(StoredLease::Valid(record)) if record.owner == self.owner => {
                LeaseStatus::HeldByCaller(record)
            }
            Some(StoredLease::Valid(record)) => LeaseStatus::HeldByOther(record),
            Some(StoredLease::Corrupt(corrupt)) => LeaseStatus::Corrupt(corrupt),
        })
    }

    /// Every record in the store, annotated for display.
    pub fn list(&self, stale_after: Duration) -> Result<Vec<LeaseInfo>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .map(|entry| {
                let (is_stale, is_mine) = match &entry.lease {
                    StoredLease::Valid(record) => {
                        (record.is_stale(stale_after), record.owner == self.owner)
                    }
                    StoredLease::Corrupt(corrupt) => (
                        is_stale(Utc::now() - corrupt.modified, stale_after),
                        false,
                    ),
                };
                LeaseInfo {
                    path: entry.path,
                    key: entry.key,
                    lease: entry.lease,
                    is_stale,
                    is_mine,
                }
            })
            .collect())
    }

    /// Resources the caller currently holds `AutoDetected` leases on.
    pub fn owned_auto_leases(&self) -> Result<BTreeSet<ResourceId>> {
        Ok(self
            .store
            .list()?
            .into_iter()
            .filter_map(|entry| match entry.lease {
                StoredLease::Valid(record) if self.is_own_auto(&record) => Some(record.resource),
                _ => None,
            })
            .collect())
    }
}
