//! Non-blocking delivery of lease and collision notifications.

use crate::conflict::CollisionEvent;
use crate::resource::ResourceId;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

/// Something the loop wants the outside world to know about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    Collision(CollisionEvent),
    LeaseAcquired(ResourceId),
    LeaseReleased(ResourceId),
}

/// Consumer of notifications (tray icon, popup, console...).
///
/// Called from the dispatcher thread, never from the loop itself, so a slow
/// sink only ever delays other notifications.
pub trait NotificationSink: Send + 'static {
    fn on_collision(&mut self, event: &CollisionEvent);
    fn on_lease_acquired(&mut self, resource: &ResourceId);
    fn on_lease_released(&mut self, resource: &ResourceId);
}

/// Bounded queue in front of a [`NotificationSink`].
///
/// [`Notifier::notify`] never blocks: when the queue is full the notification
/// is dropped and counted.
pub struct Notifier {
    tx: Option<SyncSender<Notification>>,
    dispatcher: Option<JoinHandle<()>>,
    dropped: AtomicUsize,
    disconnected: AtomicBool,
}

impl Notifier {
    /// Start a dispatcher thread feeding `sink` from a queue of `capacity`.
    pub fn spawn(sink: impl NotificationSink, capacity: usize) -> Self {
        let (tx, rx) = mpsc::sync_channel(capacity.max(1));
        let dispatcher = thread::Builder::new()
            .name("cadlock-notify".to_string())
            .spawn(move || dispatch(rx, sink));

        match dispatcher {
            Ok(handle) => Self {
                tx: Some(tx),
                dispatcher: Some(handle),
                dropped: AtomicUsize::new(0),
                disconnected: AtomicBool::new(false),
            },
            Err(e) => {
                warn!(error = %e, "failed to start notification dispatcher, notifications disabled");
                Self::disabled()
            }
        }
    }

    /// A notifier that discards everything.
    pub fn disabled() -> Self {
        Self {
            tx: None,
            dispatcher: None,
            dropped: AtomicUsize::new(0),
            disconnected: AtomicBool::new(true),
        }
    }

    /// Queue a notification. Returns whether it was queued.
    pub fn notify(&self, notification: Notification) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };

        match tx.try_send(notification) {
            Ok(()) => true,
            Err(TrySendError::Full(dropped)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(notification = ?dropped, "notification queue full, dropping");
                false
            }
            Err(TrySendError::Disconnected(_)) => {
                if !self.disconnected.swap(true, Ordering::Relaxed) {
                    warn!("notification dispatcher is gone, notifications are lost");
                }
                false
            }
        }
    }

    /// Notifications dropped because the queue was full.
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Deliver everything still queued, then stop the dispatcher.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.dispatcher.take()
            && handle.join().is_err()
        {
            warn!("notification dispatcher panicked");
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier")
            .field("enabled", &self.tx.is_some())
            .field("dropped", &self.dropped())
            .finish()
    }
}

fn dispatch(rx: Receiver<Notification>, mut sink: impl NotificationSink) {
    for notification in rx {
        match &notification {
            Notification::Collision(event) => sink.on_collision(event),
            Notification::LeaseAcquired(resource) => sink.on_lease_acquired(resource),
            Notification::LeaseReleased(resource) => sink.on_lease_released(resource),
        }
    }
    debug!("notification dispatcher finished");
}
