use super::event::CollisionEvent;
use crate::error::Result;
use crate::resource::{Owner, ResourceId};
use crate::store::{LeaseStore, StoredEntry};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Per-agent collision detector with episode suppression.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    owner: Owner,

    /// Foreign holders last reported per active resource.
    foreign: BTreeMap<ResourceId, BTreeSet<Owner>>,

    /// Owner sets last reported per multi-owner resource.
    multi: BTreeMap<ResourceId, BTreeSet<Owner>>,
}

impl ConflictDetector {
    pub fn new(owner: Owner) -> Self {
        Self {
            owner,
            foreign: BTreeMap::new(),
            multi: BTreeMap::new(),
        }
    }

    /// Scan the store and return collisions not reported yet.
    pub fn detect(
        &mut self,
        store: &LeaseStore,
        my_active: &BTreeSet<ResourceId>,
    ) -> Result<Vec<CollisionEvent>> {
        let entries = store.list()?;
        Ok(self.detect_in(&entries, my_active))
    }

    /// Like [`ConflictDetector::detect`], over an already listed store.
    pub fn detect_in(
        &mut self,
        entries: &[StoredEntry],
        my_active: &BTreeSet<ResourceId>,
    ) -> Vec<CollisionEvent> {
        let groups = owners_by_resource(entries);
        let mut events = Vec::new();

        self.foreign.retain(|resource, _| my_active.contains(resource));
        for resource in my_active {
            let holders: BTreeSet<Owner> = groups
                .get(resource)
                .map(|(_, owners)| {
                    owners
                        .iter()
                        .filter(|o| **o != self.owner)
                        .cloned()
                        .collect()
                })
                .unwrap_or_default();

            if holders.is_empty() {
                self.foreign.remove(resource);
                continue;
            }
            if self.foreign.get(resource) == Some(&holders) {
                continue;
            }

            let named = groups
                .get(resource)
                .map(|(r, _)| r.clone())
                .unwrap_or_else(|| resource.clone());
            warn!(
                resource = %named,
                holders = holders.len(),
                "resource in use here is leased by another owner"
            );
            events.push(CollisionEvent::ForeignOwnedActiveUse {
                resource: named,
                holders: holders.iter().cloned().collect(),
            });
            self.foreign.insert(resource.clone(), holders);
        }

        self.multi
            .retain(|resource, _| groups.get(resource).is_some_and(|(_, o)| o.len() > 1));
        for (resource, (named, owners)) in &groups {
            if owners.len() < 2 {
                continue;
            }
            if self.multi.get(resource) == Some(owners) {
                debug!(resource = %named, "multi-owner collision already reported");
                continue;
            }

            warn!(resource = %named, owners = owners.len(), "resource leased by several owners");
            events.push(CollisionEvent::MultipleOwners {
                resource: named.clone(),
                owners: owners.iter().cloned().collect(),
            });
            self.multi.insert(resource.clone(), owners.clone());
        }

        events
    }
}

/// Group valid records by normalized resource.
///
/// Each group keeps the resource as spelled by its first record, together
/// with the distinct owners holding a record for it. Corrupt records are
/// ignored.
pub fn owners_by_resource(
    entries: &[StoredEntry],
) -> BTreeMap<ResourceId, (ResourceId, BTreeSet<Owner>)> {
    let mut groups: BTreeMap<ResourceId, (ResourceId, BTreeSet<Owner>)> = BTreeMap::new();
    for record in entries.iter().filter_map(|e| e.lease.record()) {
        groups
            .entry(record.resource.clone())
            .or_insert_with(|| (record.resource.clone(), BTreeSet::new()))
            .1
            .insert(record.owner.clone());
    }
    groups
}
