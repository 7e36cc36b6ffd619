//! Per-cycle reconciliation of active resources against held leases.

use super::manager::LeaseManager;
use super::types::{Acquisition, CycleReport, Renewal};
use crate::error::Result;
use crate::resource::ResourceId;
use crate::store::Origin;
use chrono::Duration;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// What the caller knew at the end of the previous cycle.
#[derive(Debug, Clone, Default)]
pub struct ReconcileState {
    /// Active set from the previous snapshot.
    pub active: BTreeSet<ResourceId>,

    /// Active resources the caller holds a lease on.
    pub held: BTreeSet<ResourceId>,
}

impl ReconcileState {
    /// Seed state from leases left behind by an earlier run of this agent, so
    /// that any of them no longer active get released on the first cycle.
    pub fn recover(manager: &LeaseManager) -> Result<Self> {
        let held = manager.owned_auto_leases()?;
        if !held.is_empty() {
            info!(count = held.len(), "recovered auto leases from a previous run");
        }
        Ok(Self {
            active: held.clone(),
            held,
        })
    }
}

impl LeaseManager {
    /// Run one reconciliation step.
    ///
    /// - host application not running: drop every owned auto lease
    /// - held but no longer active: release (auto leases only)
    /// - active and held: renew
    /// - active and not held: acquire as `AutoDetected`
    ///
    /// An unreachable store fails the whole cycle. Failures on single
    /// resources are logged, counted, and retried on the next cycle.
    pub fn reconcile(
        &self,
        state: &mut ReconcileState,
        active: &BTreeSet<ResourceId>,
        host_running: bool,
    ) -> Result<CycleReport> {
        self.store().probe()?;
        let mut report = CycleReport::default();

        if !host_running {
            let dropped = self.reclaim(Duration::zero(), true)?;
            if !dropped.is_empty() {
                info!(count = dropped.len(), "host application closed, dropped auto leases");
            }
            report.released = dropped.into_iter().map(|r| r.resource).collect();
            state.active.clear();
            state.held.clear();
            return Ok(report);
        }

        let gone: Vec<ResourceId> = state.held.difference(active).cloned().collect();
        for resource in gone {
            match self.release_matching(&resource, Some(Origin::AutoDetected)) {
                Ok(removed) => {
                    if removed {
                        debug!(resource = %resource, "released lease");
                        report.released.push(resource.clone());
                    }
                    state.held.remove(&resource);
                }
                Err(e) => {
                    warn!(resource = %resource, error = %e, "release failed, will retry");
                    report.failures += 1;
                }
            }
        }

        for resource in active {
            if state.held.contains(resource) {
                self.renew_held(resource, state, &mut report);
            } else {
                let newly_active = !state.active.contains(resource);
                self.acquire_active(resource, newly_active, state, &mut report);
            }
        }

        state.active = active.clone();
        Ok(report)
    }

    fn renew_held(
        &self,
        resource: &ResourceId,
        state: &mut ReconcileState,
        report: &mut CycleReport,
    ) {
        match self.renew(resource) {
            Ok(Renewal::Renewed(_)) => report.renewed += 1,
            Ok(Renewal::Reacquired(Acquisition::Granted { created, .. })) => {
                if created {
                    report.acquired.push(resource.clone());
                }
            }
            Ok(Renewal::Reacquired(Acquisition::Denied { holder })) | Ok(Renewal::Lost { holder }) => {
                state.held.remove(resource);
                report.lost.push((resource.clone(), holder.owner));
            }
            Err(e) => {
                warn!(resource = %resource, error = %e, "renew failed, will retry");
                report.failures += 1;
            }
        }
    }

    fn acquire_active(
        &self,
        resource: &ResourceId,
        newly_active: bool,
        state: &mut ReconcileState,
        report: &mut CycleReport,
    ) {
        match self.acquire(resource, Origin::AutoDetected) {
            Ok(Acquisition::Granted { created, .. }) => {
                state.held.insert(resource.clone());
                if created {
                    info!(resource = %resource, "acquired lease");
                    report.acquired.push(resource.clone());
                }
            }
            Ok(Acquisition::Denied { holder }) => {
                if newly_active {
                    info!(resource = %resource, holder = %holder.owner, "lease denied");
                    report.denied.push((resource.clone(), holder.owner));
                }
            }
            Err(e) => {
                warn!(resource = %resource, error = %e, "acquire failed, will retry");
                report.failures += 1;
            }
        }
    }
}
