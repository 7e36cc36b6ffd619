//! Local event log for cadlock.
//!
//! Lease activity on this agent is appended to an NDJSON file (one JSON object
//! per line) when `events_log` is configured. The log is local to the agent,
//! never written into the shared lock directory.
//!
//! # Event Format
//!
//! Each event is a JSON object with the following fields:
//! - `ts`: RFC3339 timestamp
//! - `action`: The action performed (acquire, release, collision, etc.)
//! - `actor`: The owner string (e.g., `user@HOST`)
//! - `resource`: Optional resource path for resource-specific events
//! - `details`: Freeform object with action-specific details
//!
//! # Usage
//!
//! ```no_run
//! use cadlock::events::{Event, EventAction, EventLog};
//! use cadlock::resource::Owner;
//! use serde_json::json;
//!
//! let log = EventLog::new(Some("cadlock-events.ndjson".into()));
//! let event = Event::new(EventAction::MonitorStart, &Owner::current())
//!     .with_details(json!({"poll_interval_secs": 10}));
//! log.append(&event)?;
//! # Ok::<(), cadlock::error::CadlockError>(())
//! ```

use crate::error::{CadlockError, Result};
use crate::resource::{Owner, ResourceId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Actions that can be logged as events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventAction {
    /// Lease written for a resource
    Acquire,
    /// Lease deleted by its owner
    Release,
    /// Acquisition refused, another owner holds the lease
    Deny,
    /// A held lease was taken over by another owner
    Lost,
    /// Stale lease removed by garbage collection
    Reclaim,
    /// Collision detected
    Collision,
    /// Forced cleanup from the command line
    Cleanup,
    /// Resource opened through the launcher
    Open,
    /// Reconciliation loop started
    MonitorStart,
    /// Reconciliation loop stopped
    MonitorStop,
}

impl std::fmt::Display for EventAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EventAction::Acquire => write!(f, "acquire"),
            EventAction::Release => write!(f, "release"),
            EventAction::Deny => write!(f, "deny"),
            EventAction::Lost => write!(f, "lost"),
            EventAction::Reclaim => write!(f, "reclaim"),
            EventAction::Collision => write!(f, "collision"),
            EventAction::Cleanup => write!(f, "cleanup"),
            EventAction::Open => write!(f, "open"),
            EventAction::MonitorStart => write!(f, "monitor_start"),
            EventAction::MonitorStop => write!(f, "monitor_stop"),
        }
    }
}

/// An event record for the local log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// RFC3339 timestamp when the event occurred.
    pub ts: DateTime<Utc>,

    /// The action that was performed.
    pub action: EventAction,

    /// The owner on whose behalf the action ran (e.g., `user@HOST`).
    pub actor: String,

    /// Resource the event is about, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource: Option<String>,

    /// Freeform details object with action-specific information.
    pub details: Value,
}

impl Event {
    pub fn new(action: EventAction, actor: &Owner) -> Self {
        Self {
            ts: Utc::now(),
            action,
            actor: actor.to_string(),
            resource: None,
            details: Value::Object(serde_json::Map::new()),
        }
    }

    pub fn with_resource(mut self, resource: &ResourceId) -> Self {
        self.resource = Some(resource.as_str().to_string());
        self
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Serialize the event to a single-line JSON string.
    pub fn to_ndjson_line(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| {
            CadlockError::UserError(format!("failed to serialize event to JSON: {}", e))
        })
    }
}

/// Append-only NDJSON log. A log without a path drops every event.
#[derive(Debug, Clone, Default)]
pub struct EventLog {
    path: Option<PathBuf>,
}

impl EventLog {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one event as a line, creating the file and its directory as needed.
    pub fn append(&self, event: &Event) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let json_line = event.to_ndjson_line()?;

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            fs::create_dir_all(parent).map_err(|e| {
                CadlockError::UserError(format!(
                    "failed to create events directory '{}': {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| {
                CadlockError::UserError(format!(
                    "failed to open events file '{}': {}",
                    path.display(),
                    e
                ))
            })?;

        writeln!(file, "{}", json_line).map_err(|e| {
            CadlockError::UserError(format!(
                "failed to write event to '{}': {}",
                path.display(),
                e
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn alice() -> Owner {
        Owner::new("alice", "CAD-01")
    }

    #[test]
    fn test_event_creation() {
        let event = Event::new(EventAction::Acquire, &alice());

        assert_eq!(event.action, EventAction::Acquire);
        assert_eq!(event.actor, "alice@CAD-01");
        assert!(event.resource.is_none());
        let age = Utc::now().signed_duration_since(event.ts);
        assert!(age.num_minutes() < 1);
    }

    #[test]
    fn test_event_serialization() {
        let event = Event::new(EventAction::Deny, &alice())
            .with_resource(&ResourceId::new(r"G:\CAD\P1.sldprt"))
            .with_details(json!({"holder": "bob@CAD-02"}));

        let json_line = event.to_ndjson_line().unwrap();
        assert!(!json_line.contains('\n'));

        let parsed: Event = serde_json::from_str(&json_line).unwrap();
        assert_eq!(parsed.action, EventAction::Deny);
        assert_eq!(parsed.resource.as_deref(), Some(r"G:\CAD\P1.sldprt"));
        assert_eq!(parsed.details["holder"], "bob@CAD-02");
    }

    #[test]
    fn test_event_without_resource_omits_field() {
        let json_line = Event::new(EventAction::MonitorStart, &alice())
            .to_ndjson_line()
            .unwrap();
        let parsed: Value = serde_json::from_str(&json_line).unwrap();
        assert!(parsed.get("resource").is_none());
        assert_eq!(parsed["action"], "monitor_start");
    }

    #[test]
    fn test_append_creates_file_and_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("logs").join("events.ndjson");
        let log = EventLog::new(Some(path.clone()));

        log.append(&Event::new(EventAction::MonitorStart, &alice()))
            .unwrap();
        log.append(&Event::new(EventAction::MonitorStop, &alice()))
            .unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.ends_with('\n'));
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let last: Event = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(last.action, EventAction::MonitorStop);
    }

    #[test]
    fn test_disabled_log_writes_nothing() {
        let log = EventLog::default();
        assert!(log.path().is_none());
        log.append(&Event::new(EventAction::Cleanup, &alice()))
            .unwrap();
    }

    #[test]
    fn test_event_action_display() {
        assert_eq!(EventAction::Acquire.to_string(), "acquire");
        assert_eq!(EventAction::Reclaim.to_string(), "reclaim");
        assert_eq!(EventAction::MonitorStop.to_string(), "monitor_stop");
    }
}
