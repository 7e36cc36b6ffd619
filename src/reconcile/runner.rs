//! The per-agent reconciliation state machine.

use super::notifier::{Notification, Notifier};
use crate::activity::ActivitySource;
use crate::conflict::{CollisionEvent, ConflictDetector};
use crate::error::{CadlockError, Result};
use crate::events::{Event, EventAction, EventLog};
use crate::lease::{CycleReport, LeaseManager, ReconcileState};
use crate::resource::ResourceId;
use chrono::Duration;
use serde_json::json;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, info_span, warn};

/// Lifecycle of a [`ReconcileLoop`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Stopped,
    Running,
    Stopping,
}

/// Loop timing and housekeeping knobs.
#[derive(Debug, Clone)]
pub struct LoopSettings {
    /// Sleep between cycles.
    pub poll_interval: std::time::Duration,

    /// Age past which any owner's lease is garbage-collected.
    pub stale_after: Duration,

    /// Garbage-collect stale leases at the end of every cycle.
    pub gc_each_cycle: bool,

    /// File whose appearance asks the loop to stop.
    pub stop_marker: Option<PathBuf>,
}

/// What one successful cycle did.
#[derive(Debug, Clone, Default)]
pub struct CycleOutcome {
    pub report: CycleReport,
    pub collisions: Vec<CollisionEvent>,
}

/// Totals over a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoopSummary {
    /// Cycles attempted.
    pub cycles: u64,

    /// Cycles skipped because of an error.
    pub failed_cycles: u64,

    /// Leases released while stopping.
    pub drained: usize,

    /// Notifications lost to a full queue.
    pub dropped_notifications: usize,
}

/// Reconciliation loop for one agent.
#[derive(Debug)]
pub struct ReconcileLoop<A: ActivitySource> {
    manager: LeaseManager,
    activity: A,
    detector: ConflictDetector,
    notifier: Notifier,
    events: EventLog,
    settings: LoopSettings,
    state: LoopState,
    leases: ReconcileState,
    summary: LoopSummary,
}

impl<A: ActivitySource> ReconcileLoop<A> {
    pub fn new(
        manager: LeaseManager,
        activity: A,
        notifier: Notifier,
        settings: LoopSettings,
    ) -> Self {
        let detector = ConflictDetector::new(manager.owner().clone());
        Self {
            manager,
            activity,
            detector,
            notifier,
            events: EventLog::default(),
            settings,
            state: LoopState::Stopped,
            leases: ReconcileState::default(),
            summary: LoopSummary::default(),
        }
    }

    /// Also record lease activity in `events`.
    pub fn with_event_log(mut self, events: EventLog) -> Self {
        self.events = events;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn summary(&self) -> &LoopSummary {
        &self.summary
    }

    /// `Stopped -> Running`.
    ///
    /// Leases this owner left behind in an earlier run are picked up so that
    /// the first cycle releases the ones no longer in use. A stop request
    /// left over from before the start is discarded.
    pub fn start(&mut self) {
        if self.state != LoopState::Stopped {
            return;
        }

        self.leases = ReconcileState::recover(&self.manager).unwrap_or_else(|e| {
            warn!(error = %e, "could not recover previous leases, starting empty");
            ReconcileState::default()
        });

        if let Some(marker) = &self.settings.stop_marker
            && fs::remove_file(marker).is_ok()
        {
            debug!(marker = %marker.display(), "discarded stale stop request");
        }

        self.state = LoopState::Running;
        info!(
            owner = %self.manager.owner(),
            interval_secs = self.settings.poll_interval.as_secs(),
            "reconciliation loop started"
        );
        self.record(Event::new(EventAction::MonitorStart, self.manager.owner()).with_details(
            json!({
                "lock_dir": self.manager.store().dir().display().to_string(),
                "poll_interval_secs": self.settings.poll_interval.as_secs(),
            }),
        ));
    }

    /// Run one cycle: snapshot, reconcile, garbage-collect, detect, notify.
    ///
    /// An error means the cycle was skipped; nothing is retried until the
    /// next cycle.
    pub fn run_cycle(&mut self) -> Result<CycleOutcome> {
        if self.state != LoopState::Running {
            return Err(CadlockError::UserError(
                "reconciliation loop is not running".to_string(),
            ));
        }

        self.summary.cycles += 1;
        let span = info_span!("cycle", n = self.summary.cycles);
        let _enter = span.enter();

        let host_running = self.activity.host_application_running();
        let active = if host_running {
            self.activity.snapshot()?
        } else {
            debug!("host application not running");
            BTreeSet::new()
        };

        let mut report = self.manager.reconcile(&mut self.leases, &active, host_running)?;

        if self.settings.gc_each_cycle {
            match self.manager.reclaim(self.settings.stale_after, false) {
                Ok(reclaimed) => {
                    report.reclaimed = reclaimed.len();
                    for record in &reclaimed {
                        self.record(
                            Event::new(EventAction::Reclaim, self.manager.owner())
                                .with_resource(&record.resource)
                                .with_details(json!({
                                    "owner": record.owner.to_string(),
                                    "last_renewed_at": record.last_renewed_at,
                                })),
                        );
                    }
                }
                Err(e) => warn!(error = %e, "garbage collection skipped"),
            }
        }

        let collisions = match self.detector.detect(self.manager.store(), &active) {
            Ok(collisions) => collisions,
            Err(e) => {
                warn!(error = %e, "conflict detection skipped");
                Vec::new()
            }
        };

        self.emit(&report, &collisions);

        debug!(
            active = active.len(),
            acquired = report.acquired.len(),
            renewed = report.renewed,
            released = report.released.len(),
            collisions = collisions.len(),
            "cycle complete"
        );

        Ok(CycleOutcome { report, collisions })
    }

    /// Run a cycle, absorbing its error. Returns `true` if a stop was requested.
    pub fn tick(&mut self) -> bool {
        if let Err(e) = self.run_cycle() {
            self.summary.failed_cycles += 1;
            error!(error = %e, "cycle failed, retrying next period");
        }
        self.stop_requested()
    }

    fn stop_requested(&self) -> bool {
        let Some(marker) = &self.settings.stop_marker else {
            return false;
        };
        if !marker.exists() {
            return false;
        }
        if let Err(e) = fs::remove_file(marker) {
            debug!(marker = %marker.display(), error = %e, "could not remove stop request");
        }
        info!("stop requested");
        true
    }

    /// `Running -> Stopping -> Stopped`, releasing every auto lease this owner
    /// holds. Returns how many were released.
    pub fn stop(&mut self) -> usize {
        if self.state != LoopState::Running {
            return 0;
        }
        self.state = LoopState::Stopping;

        let drained = match self.manager.reclaim(Duration::zero(), true) {
            Ok(released) => {
                for record in &released {
                    self.released(&record.resource);
                }
                released.len()
            }
            Err(e) => {
                warn!(error = %e, "could not release leases on stop, they will go stale");
                0
            }
        };

        self.leases = ReconcileState::default();
        self.summary.drained = drained;
        self.state = LoopState::Stopped;
        info!(released = drained, "reconciliation loop stopped");
        self.record(
            Event::new(EventAction::MonitorStop, self.manager.owner()).with_details(json!({
                "cycles": self.summary.cycles,
                "failed_cycles": self.summary.failed_cycles,
                "released": drained,
            })),
        );
        drained
    }

    /// Start, cycle until stopped, and drain.
    ///
    /// Stops when `stop` receives a message or its sender goes away, when a
    /// stop marker appears, or after `max_cycles` cycles.
    pub fn run(mut self, stop: Receiver<()>, max_cycles: Option<u64>) -> LoopSummary {
        self.start();

        loop {
            if self.tick() {
                break;
            }
            if max_cycles.is_some_and(|max| self.summary.cycles >= max) {
                break;
            }
            match stop.recv_timeout(self.settings.poll_interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        }

        self.stop();
        self.summary.dropped_notifications = self.notifier.dropped();
        let summary = self.summary.clone();
        self.notifier.shutdown();
        summary
    }

    fn emit(&self, report: &CycleReport, collisions: &[CollisionEvent]) {
        let owner = self.manager.owner();

        for resource in &report.acquired {
            self.notifier
                .notify(Notification::LeaseAcquired(resource.clone()));
            self.record(Event::new(EventAction::Acquire, owner).with_resource(resource));
        }
        for resource in &report.released {
            self.released(resource);
        }
        for (resource, holder) in &report.denied {
            self.record(
                Event::new(EventAction::Deny, owner)
                    .with_resource(resource)
                    .with_details(json!({ "holder": holder.to_string() })),
            );
        }
        for (resource, holder) in &report.lost {
            self.record(
                Event::new(EventAction::Lost, owner)
                    .with_resource(resource)
                    .with_details(json!({ "holder": holder.to_string() })),
            );
        }
        for collision in collisions {
            self.notifier
                .notify(Notification::Collision(collision.clone()));
            let details = serde_json::to_value(collision).unwrap_or_default();
            self.record(
                Event::new(EventAction::Collision, owner)
                    .with_resource(collision.resource())
                    .with_details(details),
            );
        }
    }

    fn released(&self, resource: &ResourceId) {
        self.notifier
            .notify(Notification::LeaseReleased(resource.clone()));
        self.record(Event::new(EventAction::Release, self.manager.owner()).with_resource(resource));
    }

    fn record(&self, event: Event) {
        if let Err(e) = self.events.append(&event) {
            warn!(error = %e, action = %event.action, "failed to write event log");
        }
    }
}

impl<A: ActivitySource + 'static> ReconcileLoop<A> {
    /// Run the loop on a background thread.
    pub fn spawn(self, max_cycles: Option<u64>) -> Result<LoopHandle> {
        let (stop_tx, stop_rx) = mpsc::channel();
        let thread = thread::Builder::new()
            .name("cadlock-reconcile".to_string())
            .spawn(move || self.run(stop_rx, max_cycles))
            .map_err(|e| {
                CadlockError::UserError(format!("failed to start reconciliation loop: {}", e))
            })?;

        Ok(LoopHandle { stop_tx, thread })
    }
}

/// Handle on a loop running in the background.
#[derive(Debug)]
pub struct LoopHandle {
    stop_tx: Sender<()>,
    thread: JoinHandle<LoopSummary>,
}

impl LoopHandle {
    /// Ask the loop to stop and wait for it to drain.
    pub fn stop(self) -> Result<LoopSummary> {
        let _ = self.stop_tx.send(());
        self.join()
    }

    /// Wait for the loop to stop on its own.
    pub fn join(self) -> Result<LoopSummary> {
        let LoopHandle { stop_tx, thread } = self;
        let summary = thread
            .join()
            .map_err(|_| CadlockError::UserError("reconciliation loop panicked".to_string()));
        drop(stop_tx);
        summary
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }
}
