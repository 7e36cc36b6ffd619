//! Config loading, validation, and utility operations.

use super::model::Config;
use crate::activity::{HostProbe, build_globset};
use crate::error::{CadlockError, Result};
use std::path::Path;

impl Config {
    /// Load config from a YAML file.
    ///
    /// Unknown fields in the YAML are silently ignored for forward compatibility.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the cadlock.yaml file
    ///
    /// # Returns
    ///
    /// * `Ok(Config)` - Successfully loaded and validated config
    /// * `Err(CadlockError::UserError)` - Read error, parse error, or validation failure
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        let content = std::fs::read_to_string(path).map_err(|e| {
            CadlockError::UserError(format!(
                "failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;

        Self::from_yaml(&content)
    }

    /// Parse config from a YAML string.
    ///
    /// An empty document yields the defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = if yaml.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(yaml).map_err(|e| {
                CadlockError::UserError(format!("failed to parse config YAML: {}", e))
            })?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate config values and return error on invalid values.
    ///
    /// Validation rules:
    /// - `poll_interval_secs`, `stale_minutes` and `notification_queue` must be positive
    /// - `lock_suffix` must start with a dot and have something after it
    /// - `marker_prefix` must be non-empty
    /// - `resource_globs` must compile
    /// - `host_probe_command` and `launcher_command` must parse
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            return Err(invalid("poll_interval_secs must be greater than 0"));
        }

        if self.stale_minutes == 0 {
            return Err(invalid("stale_minutes must be greater than 0"));
        }

        if self.notification_queue == 0 {
            return Err(invalid("notification_queue must be greater than 0"));
        }

        if !self.lock_suffix.starts_with('.') || self.lock_suffix.len() < 2 {
            return Err(CadlockError::UserError(format!(
                "config validation failed: lock_suffix must look like '.lock' (found '{}')",
                self.lock_suffix
            )));
        }

        if self.marker_prefix.is_empty() {
            return Err(invalid("marker_prefix must be non-empty"));
        }

        if self.resource_globs.is_empty() {
            return Err(invalid("resource_globs must list at least one pattern"));
        }
        build_globset(&self.resource_globs)?;

        if let Some(probe) = &self.host_probe_command {
            HostProbe::parse(probe)?;
        }

        if let Some(launcher) = &self.launcher_command
            && !shell_words::split(launcher).is_ok_and(|args| !args.is_empty())
        {
            return Err(CadlockError::UserError(format!(
                "config validation failed: launcher_command '{}' does not parse to a command",
                launcher
            )));
        }

        Ok(())
    }

    /// Staleness threshold for garbage collection.
    pub fn stale_after(&self) -> chrono::Duration {
        chrono::Duration::minutes(i64::from(self.stale_minutes))
    }

    /// Time between reconciliation cycles.
    pub fn poll_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.poll_interval_secs)
    }
}

fn invalid(message: &str) -> CadlockError {
    CadlockError::UserError(format!("config validation failed: {}", message))
}
