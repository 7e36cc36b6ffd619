//! Configuration constants and defaults for cadlock.

/// Environment variable naming the config file.
pub const CONFIG_ENV_VAR: &str = "CADLOCK_CONFIG";

/// Config file looked up in the working directory when nothing else is given.
pub const DEFAULT_CONFIG_FILE: &str = "cadlock.yaml";

/// Lock directory name under the resource root when `lock_dir` is unset.
pub const DEFAULT_LOCK_DIR_NAME: &str = "Locks";

/// Default resource file patterns (SolidWorks parts, assemblies, drawings).
pub fn default_resource_globs() -> Vec<String> {
    vec![
        "*.sldprt".to_string(),
        "*.sldasm".to_string(),
        "*.slddrw".to_string(),
    ]
}

// Default value functions for serde
pub(crate) fn default_resource_root() -> String {
    ".".to_string()
}
pub(crate) fn default_lock_suffix() -> String {
    ".lock".to_string()
}
pub(crate) fn default_poll_interval_secs() -> u64 {
    10
}
pub(crate) fn default_stale_minutes() -> u32 {
    24 * 60
}
pub(crate) fn default_marker_prefix() -> String {
    "~$".to_string()
}
pub(crate) fn default_read_only_args() -> Vec<String> {
    vec!["/r".to_string()]
}
pub(crate) fn default_notification_queue() -> usize {
    64
}
pub(crate) fn default_true() -> bool {
    true
}
