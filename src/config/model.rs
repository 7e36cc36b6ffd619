//! Config struct definition and default implementation.

use super::types::*;
use serde::{Deserialize, Serialize};

/// Configuration for one cadlock agent.
///
/// This struct represents the contents of `cadlock.yaml`.
/// Unknown fields in the YAML are ignored for forward compatibility.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    // =========================================================================
    // Locations
    // =========================================================================
    /// Directory the protected resources live under.
    #[serde(default = "default_resource_root")]
    pub resource_root: String,

    /// Shared lock directory (default: `{resource_root}/Locks`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_dir: Option<String>,

    /// Suffix of lease record files.
    #[serde(default = "default_lock_suffix")]
    pub lock_suffix: String,

    // =========================================================================
    // Lease timing
    // =========================================================================
    /// Seconds between reconciliation cycles.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Minutes without renewal after which any lease may be reclaimed.
    #[serde(default = "default_stale_minutes")]
    pub stale_minutes: u32,

    /// Whether every running cycle garbage-collects stale leases of all owners.
    #[serde(default = "default_true")]
    pub gc_each_cycle: bool,

    // =========================================================================
    // Activity detection
    // =========================================================================
    /// File name patterns of protected resources (case-insensitive).
    #[serde(default = "default_resource_globs")]
    pub resource_globs: Vec<String>,

    /// Prefix of the marker file the host application keeps beside open documents.
    #[serde(default = "default_marker_prefix")]
    pub marker_prefix: String,

    /// Command whose success means the host application is running
    /// (shell-words parsed; no shell). Unset means always running.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_probe_command: Option<String>,

    // =========================================================================
    // Launcher
    // =========================================================================
    /// Command that opens a resource; the path is appended as the last argument.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub launcher_command: Option<String>,

    /// Extra arguments for opening a resource read-only.
    #[serde(default = "default_read_only_args")]
    pub read_only_args: Vec<String>,

    // =========================================================================
    // Notifications
    // =========================================================================
    /// Local NDJSON event log (unset disables it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events_log: Option<String>,

    /// Capacity of the notification queue; overflowing notifications are dropped.
    #[serde(default = "default_notification_queue")]
    pub notification_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            resource_root: default_resource_root(),
            lock_dir: None,
            lock_suffix: default_lock_suffix(),
            poll_interval_secs: default_poll_interval_secs(),
            stale_minutes: default_stale_minutes(),
            gc_each_cycle: default_true(),
            resource_globs: default_resource_globs(),
            marker_prefix: default_marker_prefix(),
            host_probe_command: None,
            launcher_command: None,
            read_only_args: default_read_only_args(),
            events_log: None,
            notification_queue: default_notification_queue(),
        }
    }
}
