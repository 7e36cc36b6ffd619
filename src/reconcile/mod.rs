//! Reconciliation loop: the per-agent scheduler.
//!
//! A [`ReconcileLoop`] moves through `Stopped -> Running -> Stopping ->
//! Stopped`. While running it repeats a fixed cycle every poll interval:
//!
//! 1. snapshot the activity source
//! 2. reconcile the active set against the lease store
//! 3. garbage-collect stale leases of any owner (optional)
//! 4. run the conflict detector
//! 5. hand lease and collision notifications to the [`Notifier`]
//!
//! A failing cycle is logged and skipped; the loop itself only ends on a stop
//! request. On the way out it releases every auto lease of its owner, so a
//! clean shutdown leaves nothing behind for other agents to wait out.
//!
//! Notifications go through a bounded queue served by a dispatcher thread,
//! so a slow sink can never stall lease renewal.

mod notifier;
mod runner;


pub use notifier::{Notification, NotificationSink, Notifier};
pub use runner::{CycleOutcome, LoopHandle, LoopSettings, LoopState, LoopSummary, ReconcileLoop};
