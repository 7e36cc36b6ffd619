use crate::error::{CadlockError, Result};
use std::process::{Command, Stdio};
use tracing::warn;

/// External command that tells whether the host application is running.
///
/// Exit status zero means running, any other status means not running.
#[derive(Debug, Clone)]
pub struct HostProbe {
    command: String,
    args: Vec<String>,
}

impl HostProbe {
    /// Parse a probe command line such as `pgrep -x SLDWORKS`.
    pub fn parse(command: &str) -> Result<Self> {
        let args = shell_words::split(command).map_err(|e| {
            CadlockError::UserError(format!(
                "failed to parse host_probe_command '{}': {}\n\
                 Fix: check for unmatched quotes or invalid escape sequences.",
                command, e
            ))
        })?;

        let mut args = args.into_iter();
        let Some(program) = args.next() else {
            return Err(CadlockError::UserError(
                "host_probe_command is empty after parsing".to_string(),
            ));
        };

        Ok(Self {
            command: program,
            args: args.collect(),
        })
    }

    /// Run the probe.
    ///
    /// A probe that cannot be started reports "running", so a broken probe
    /// never tears down leases.
    pub fn is_running(&self) -> bool {
        match Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
        {
            Ok(status) => status.success(),
            Err(e) => {
                warn!(command = %self.command, error = %e, "host probe failed to run");
                true
            }
        }
    }
}
