//! Agent context resolution for cadlock.
//!
//! Resolves which config file applies, loads it, and turns its relative
//! locations into absolute paths. Every command builds its lease manager,
//! activity source and event log from the resulting [`AgentContext`], so all
//! of them agree on the resource root and the shared lock directory.
//!
//! Config lookup order:
//! 1. the `--config` flag
//! 2. the `CADLOCK_CONFIG` environment variable
//! 3. `cadlock.yaml` in the working directory, if present
//!
//! Relative paths in the config are taken relative to the directory holding
//! the config file, or to the working directory when running on defaults.

use crate::activity::{HostProbe, MarkerScan};
use crate::codec::PathCodec;
use crate::config::types::DEFAULT_LOCK_DIR_NAME;
use crate::config::{CONFIG_ENV_VAR, Config, DEFAULT_CONFIG_FILE};
use crate::error::{CadlockError, Result};
use crate::events::EventLog;
use crate::lease::LeaseManager;
use crate::resource::{Owner, ResourceId};
use crate::store::LeaseStore;
use std::env;
use std::path::{Path, PathBuf};

/// Resolved configuration and paths for one agent.
///
/// All paths are absolute.
#[derive(Debug, Clone)]
pub struct AgentContext {
    /// The loaded configuration.
    pub config: Config,

    /// Config file the configuration came from, if any.
    pub config_path: Option<PathBuf>,

    /// Working directory the command was started from.
    pub cwd: PathBuf,

    /// Directory the protected resources live under.
    pub resource_root: PathBuf,

    /// Shared lock directory.
    pub lock_dir: PathBuf,

    /// Principal this agent acts for.
    pub owner: Owner,
}

impl AgentContext {
    /// Resolve the context from the current working directory.
    pub fn resolve(explicit_config: Option<&Path>) -> Result<Self> {
        let cwd = env::current_dir().map_err(|e| {
            CadlockError::UserError(format!("failed to get current working directory: {}", e))
        })?;

        Self::resolve_from(&cwd, explicit_config)
    }

    /// Resolve the context as if started from `cwd`.
    pub fn resolve_from(cwd: &Path, explicit_config: Option<&Path>) -> Result<Self> {
        let cwd = absolute(cwd)?;

        let (config, config_path) = match Self::locate_config(&cwd, explicit_config) {
            Some(path) => (Config::load(&path)?, Some(path)),
            None => (Config::default(), None),
        };

        let base = config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| cwd.clone());

        let resource_root = absolute(&base.join(&config.resource_root))?;
        let lock_dir = match &config.lock_dir {
            Some(dir) => absolute(&base.join(dir))?,
            None => resource_root.join(DEFAULT_LOCK_DIR_NAME),
        };

        Ok(Self {
            config,
            config_path,
            cwd,
            resource_root,
            lock_dir,
            owner: Owner::current(),
        })
    }

    /// Pick the config file to load. `None` means run on defaults.
    ///
    /// An explicitly named file (flag or environment) is returned even if it
    /// does not exist, so that loading reports it.
    fn locate_config(cwd: &Path, explicit: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit {
            return Some(cwd.join(path));
        }

        if let Ok(path) = env::var(CONFIG_ENV_VAR)
            && !path.trim().is_empty()
        {
            return Some(cwd.join(path.trim()));
        }

        let default = cwd.join(DEFAULT_CONFIG_FILE);
        default.is_file().then_some(default)
    }

    /// Act for a different owner than the current user.
    pub fn with_owner(mut self, owner: Owner) -> Self {
        self.owner = owner;
        self
    }

    /// The shared lease store.
    pub fn lease_store(&self) -> LeaseStore {
        LeaseStore::new(&self.lock_dir, self.config.lock_suffix.clone(), &self.owner.key())
    }

    /// A lease manager for this agent's owner.
    pub fn lease_manager(&self) -> LeaseManager {
        LeaseManager::new(
            self.lease_store(),
            PathCodec::new(Some(ResourceId::from_path(&self.resource_root))),
            self.owner.clone(),
        )
        .with_stale_after(self.config.stale_after())
    }

    /// The marker-scan activity source configured for this agent.
    pub fn activity_source(&self) -> Result<MarkerScan> {
        let probe = self
            .config
            .host_probe_command
            .as_deref()
            .map(HostProbe::parse)
            .transpose()?;

        Ok(MarkerScan::new(
            &self.resource_root,
            &self.config.resource_globs,
            self.config.marker_prefix.clone(),
        )?
        .skip_dir(&self.lock_dir)
        .with_probe(probe))
    }

    /// The local event log (disabled when `events_log` is unset).
    pub fn event_log(&self) -> EventLog {
        EventLog::new(
            self.config
                .events_log
                .as_ref()
                .map(|p| self.base_dir().join(p)),
        )
    }

    /// Marker file asking this owner's running loop to stop.
    pub fn stop_marker_path(&self) -> PathBuf {
        self.lock_dir.join(format!(".{}.stop", self.owner.key()))
    }

    /// Resource identifier for a path given on the command line.
    pub fn resource_id(&self, raw: &str) -> Result<ResourceId> {
        let raw = raw.trim();
        if raw.is_empty() {
            return Err(CadlockError::UserError("resource path is empty".to_string()));
        }
        Ok(ResourceId::from_path(&absolute(&self.cwd.join(raw))?))
    }

    fn base_dir(&self) -> PathBuf {
        self.config_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.cwd.clone())
    }
}

/// Make `path` absolute and lexically clean (`.` and `..` removed) without
/// touching the filesystem, so unreachable network paths still resolve.
fn absolute(path: &Path) -> Result<PathBuf> {
    let path = std::path::absolute(path).map_err(|e| {
        CadlockError::UserError(format!("failed to resolve path '{}': {}", path.display(), e))
    })?;

    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            std::path::Component::ParentDir => {
                clean.pop();
            }
            std::path::Component::CurDir => {}
            other => clean.push(other),
        }
    }
    Ok(clean)
}
