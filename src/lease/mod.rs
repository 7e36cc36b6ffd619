//! Lease manager: one agent's view of the lease store.
//!
//! A [`LeaseManager`] acts for a single `(user, host)` owner. It acquires,
//! renews, and releases that owner's leases and garbage-collects stale ones,
//! and drives the per-cycle reconciliation between the resources active on
//! this workstation and the leases recorded in the shared directory.
//!
//! # Rules
//!
//! - Another owner's record is never overwritten; acquiring a foreign-held
//!   resource yields [`Acquisition::Denied`].
//! - Every write re-reads the record right before committing, and every read
//!   tolerates the record disappearing. Losing a race means re-reading, never
//!   forcing.
//! - Foreign records are only deleted once stale, and are re-checked for
//!   staleness right before deletion.
//! - Corrupt records count as absent when acquiring and age out by file
//!   modification time.

mod manager;
mod reconcile;
mod types;


pub use manager::LeaseManager;
pub use reconcile::ReconcileState;
pub use types::{Acquisition, CycleReport, LeaseInfo, LeaseStatus, Renewal};
