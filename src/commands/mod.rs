//! Command implementations for cadlock.
//!
//! This module provides the dispatcher that routes CLI commands to their
//! implementations. Every handler resolves the agent context first, so the
//! config file, resource root and lock directory are shared by all of them.

mod acquire;
mod cleanup;
mod monitor;
mod open;
mod status;

#[cfg(test)]
mod tests;

use crate::cli::Command;
use crate::context::AgentContext;
use crate::error::Result;
use crate::events::{Event, EventLog};
use crate::lease::LeaseManager;
use std::path::Path;
use tracing::warn;

pub use acquire::{cmd_acquire, cmd_release};
pub use cleanup::{cmd_cleanup, cmd_release_all};
pub use monitor::{cmd_monitor, cmd_stop};
pub use open::cmd_open;
pub use status::cmd_status;

/// Dispatch a command to its implementation.
///
/// `config` is the `--config` flag, if given.
pub fn dispatch(command: Command, config: Option<&Path>) -> Result<()> {
    let ctx = AgentContext::resolve(config)?;

    match command {
        Command::Acquire(args) => cmd_acquire(&ctx, &args),
        Command::Release(args) => cmd_release(&ctx, &args),
        Command::Status(args) => cmd_status(&ctx, &args),
        Command::Cleanup(args) => cmd_cleanup(&ctx, &args),
        Command::ReleaseAll => cmd_release_all(&ctx),
        Command::Open(args) => cmd_open(&ctx, &args),
        Command::Monitor(args) => cmd_monitor(&ctx, &args),
        Command::Stop => cmd_stop(&ctx),
    }
}

/// Lease manager for commands that write to the store.
///
/// Creates the lock directory on first use.
fn writable_manager(ctx: &AgentContext) -> Result<LeaseManager> {
    let manager = ctx.lease_manager();
    manager.store().ensure_dir()?;
    Ok(manager)
}

/// Append to the event log. A failed write only warns: the lease operation
/// itself already happened.
fn record(log: &EventLog, event: Event) {
    if let Err(e) = log.append(&event) {
        warn!(error = %e, action = %event.action, "failed to write event log");
    }
}
