use super::ActivitySource;
use super::probe::HostProbe;
use crate::error::{CadlockError, Result};
use crate::resource::ResourceId;
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Activity source backed by marker files under a resource root.
#[derive(Debug, Clone)]
pub struct MarkerScan {
    root: PathBuf,
    skip: Vec<PathBuf>,
    globs: GlobSet,
    prefix: String,
    probe: Option<HostProbe>,
}

impl MarkerScan {
    /// Scan `root` for `{prefix}{name}` markers where `name` matches `globs`.
    pub fn new(root: impl Into<PathBuf>, globs: &[String], prefix: impl Into<String>) -> Result<Self> {
        Ok(Self {
            root: root.into(),
            skip: Vec::new(),
            globs: build_globset(globs)?,
            prefix: prefix.into(),
            probe: None,
        })
    }

    /// Never descend into `dir` (the lock directory, typically).
    pub fn skip_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.skip.push(dir.into());
        self
    }

    /// Decide host liveness with `probe` instead of assuming it runs.
    pub fn with_probe(mut self, probe: Option<HostProbe>) -> Self {
        self.probe = probe;
        self
    }

    fn scan_dir(&self, dir: &Path, found: &mut BTreeSet<ResourceId>, pending: &mut Vec<PathBuf>) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "skipping unreadable directory");
                return;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };

            if file_type.is_dir() {
                if !self.skip.iter().any(|s| s == &path) {
                    pending.push(path);
                }
                continue;
            }

            let name = entry.file_name();
            let Some(document) = name
                .to_str()
                .and_then(|n| n.strip_prefix(self.prefix.as_str()))
            else {
                continue;
            };

            if document.is_empty() || !self.globs.is_match(document) {
                continue;
            }

            let target = dir.join(document);
            if target.is_file() {
                trace!(resource = %target.display(), "marker found");
                found.insert(ResourceId::from_path(&target));
            }
        }
    }
}

impl ActivitySource for MarkerScan {
    fn snapshot(&self) -> Result<BTreeSet<ResourceId>> {
        if !self.root.is_dir() {
            return Err(CadlockError::StorageUnavailable(format!(
                "resource root '{}' is not a readable directory",
                self.root.display()
            )));
        }

        let mut found = BTreeSet::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            self.scan_dir(&dir, &mut found, &mut pending);
        }

        debug!(active = found.len(), "activity snapshot");
        Ok(found)
    }

    fn host_application_running(&self) -> bool {
        self.probe.as_ref().is_none_or(HostProbe::is_running)
    }
}

/// Build a case-insensitive GlobSet from file name patterns.
pub fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();

    for pattern in patterns {
        let glob = GlobBuilder::new(pattern.trim())
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                CadlockError::UserError(format!(
                    "invalid glob pattern in resource_globs: '{}' - {}",
                    pattern, e
                ))
            })?;
        builder.add(glob);
    }

    builder
        .build()
        .map_err(|e| CadlockError::UserError(format!("failed to compile resource_globs: {}", e)))
}
