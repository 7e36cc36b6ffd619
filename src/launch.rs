//! Opening resources in the external editor.
//!
//! Opening takes a manual lease first. If the lease is granted the resource
//! opens normally; if another owner holds it the resource opens read-only
//! and the caller is told who holds it.

use crate::error::{CadlockError, Result};
use crate::lease::{Acquisition, LeaseManager};
use crate::resource::ResourceId;
use crate::store::{LeaseRecord, Origin};
use std::path::Path;
use std::process::{Command, Stdio};
use tracing::{debug, info};

/// How the editor should open a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Normal,
    ReadOnly,
}

impl std::fmt::Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenMode::Normal => write!(f, "normal"),
            OpenMode::ReadOnly => write!(f, "read-only"),
        }
    }
}

/// Decision on how to open a resource.
#[derive(Debug, Clone)]
pub struct OpenPlan {
    pub resource: ResourceId,
    pub mode: OpenMode,

    /// The foreign lease that forced read-only mode.
    pub holder: Option<LeaseRecord>,
}

/// Take a manual lease on `resource` and decide the open mode from it.
pub fn plan_open(manager: &LeaseManager, resource: &ResourceId) -> Result<OpenPlan> {
    let plan = match manager.acquire(resource, Origin::Manual)? {
        Acquisition::Granted { .. } => OpenPlan {
            resource: resource.clone(),
            mode: OpenMode::Normal,
            holder: None,
        },
        Acquisition::Denied { holder } => OpenPlan {
            resource: resource.clone(),
            mode: OpenMode::ReadOnly,
            holder: Some(holder),
        },
    };
    info!(resource = %resource, mode = %plan.mode, "open planned");
    Ok(plan)
}

/// The configured editor command.
#[derive(Debug, Clone)]
pub struct Launcher {
    program: String,
    args: Vec<String>,
    read_only_args: Vec<String>,
}

impl Launcher {
    /// Parse `command` (shell-words, no shell). The resource path is appended
    /// after `read_only_args` when opening read-only.
    pub fn parse(command: &str, read_only_args: &[String]) -> Result<Self> {
        let args = shell_words::split(command).map_err(|e| {
            CadlockError::UserError(format!(
                "failed to parse launcher_command '{}': {}\n\
                 Fix: check for unmatched quotes or invalid escape sequences.",
                command, e
            ))
        })?;

        let mut args = args.into_iter();
        let Some(program) = args.next() else {
            return Err(CadlockError::UserError(
                "launcher_command is empty after parsing".to_string(),
            ));
        };

        Ok(Self {
            program,
            args: args.collect(),
            read_only_args: read_only_args.to_vec(),
        })
    }

    /// Full argument list (program first) for opening `path` in `mode`.
    pub fn command_line(&self, path: &Path, mode: OpenMode) -> Vec<String> {
        let mut line = Vec::with_capacity(self.args.len() + self.read_only_args.len() + 2);
        line.push(self.program.clone());
        line.extend(self.args.iter().cloned());
        if mode == OpenMode::ReadOnly {
            line.extend(self.read_only_args.iter().cloned());
        }
        line.push(path.display().to_string());
        line
    }

    /// Start the editor without waiting for it.
    pub fn launch(&self, path: &Path, mode: OpenMode) -> Result<()> {
        let line = self.command_line(path, mode);
        debug!(command = ?line, "launching editor");

        Command::new(&line[0])
            .args(&line[1..])
            .stdin(Stdio::null())
            .spawn()
            .map_err(|e| {
                CadlockError::LaunchError(format!(
                    "failed to start '{}': {}\nFix: check launcher_command in the config.",
                    self.program, e
                ))
            })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::PathCodec;
    use crate::resource::Owner;
    use crate::store::LeaseStore;
    use tempfile::TempDir;

    fn manager_for(dir: &Path, user: &str) -> LeaseManager {
        let owner = Owner::new(user, "CAD");
        let store = LeaseStore::new(dir.join("Locks"), ".lock", &owner.key());
        store.ensure_dir().unwrap();
        LeaseManager::new(store, PathCodec::new(None), owner)
    }

    #[test]
    fn test_plan_open_granted_then_read_only_for_others() {
        let temp_dir = TempDir::new().unwrap();
        let alice = manager_for(temp_dir.path(), "alice");
        let bob = manager_for(temp_dir.path(), "bob");
        let p1 = ResourceId::new("/cad/P1.sldprt");

        let plan = plan_open(&alice, &p1).unwrap();
        assert_eq!(plan.mode, OpenMode::Normal);
        assert!(plan.holder.is_none());

        let plan = plan_open(&bob, &p1).unwrap();
        assert_eq!(plan.mode, OpenMode::ReadOnly);
        assert_eq!(plan.holder.unwrap().owner, *alice.owner());
    }

    #[test]
    fn test_plan_open_takes_manual_lease() {
        let temp_dir = TempDir::new().unwrap();
        let alice = manager_for(temp_dir.path(), "alice");
        let p1 = ResourceId::new("/cad/P1.sldprt");
        alice.acquire(&p1, Origin::AutoDetected).unwrap();

        plan_open(&alice, &p1).unwrap();

        match alice.status(&p1).unwrap() {
            crate::lease::LeaseStatus::HeldByCaller(record) => {
                assert_eq!(record.origin, Origin::Manual)
            }
            other => panic!("unexpected status: {:?}", other),
        }
    }

    #[test]
    fn test_command_line_modes() {
        let launcher =
            Launcher::parse("'C:/Program Files/CAD/cad.exe' --new-window", &["/r".to_string()])
                .unwrap();
        let path = Path::new("/cad/P1.sldprt");

        assert_eq!(
            launcher.command_line(path, OpenMode::Normal),
            vec!["C:/Program Files/CAD/cad.exe", "--new-window", "/cad/P1.sldprt"]
        );
        assert_eq!(
            launcher.command_line(path, OpenMode::ReadOnly),
            vec!["C:/Program Files/CAD/cad.exe", "--new-window", "/r", "/cad/P1.sldprt"]
        );
    }

    #[test]
    fn test_parse_rejects_empty_and_malformed() {
        assert!(Launcher::parse("   ", &[]).is_err());
        assert!(Launcher::parse("cad 'oops", &[]).is_err());
    }

    #[test]
    fn test_launch_failure_is_launch_error() {
        let launcher = Launcher::parse("cadlock-no-such-editor", &[]).unwrap();
        let err = launcher
            .launch(Path::new("/cad/P1.sldprt"), OpenMode::Normal)
            .unwrap_err();
        assert!(matches!(err, CadlockError::LaunchError(_)));
        assert_eq!(err.exit_code(), crate::exit_codes::LAUNCH_FAILURE);
    }
}
