//! Implementation of the `cadlock cleanup` and `cadlock release-all` commands.

use super::{record, writable_manager};
use crate::cli::CleanupArgs;
use crate::context::AgentContext;
use crate::error::Result;
use crate::events::{Event, EventAction};
use chrono::Duration;
use serde_json::json;

/// Execute the `cadlock cleanup` command.
///
/// Removes leases of any owner not renewed within the age limit, plus corrupt
/// record files older than the limit.
pub fn cmd_cleanup(ctx: &AgentContext, args: &CleanupArgs) -> Result<()> {
    let manager = writable_manager(ctx)?;
    let minutes = args.max_age_minutes.unwrap_or(ctx.config.stale_minutes);

    let removed = manager.reclaim(Duration::minutes(i64::from(minutes)), false)?;

    let log = ctx.event_log();
    for lease in &removed {
        println!("  removed {} (owner: {})", lease.resource, lease.owner);
        record(
            &log,
            Event::new(EventAction::Cleanup, manager.owner())
                .with_resource(&lease.resource)
                .with_details(json!({
                    "owner": lease.owner.to_string(),
                    "max_age_minutes": minutes,
                    "last_renewed_at": lease.last_renewed_at,
                })),
        );
    }

    println!(
        "Removed {} lease(s) older than {} minutes.",
        removed.len(),
        minutes
    );
    Ok(())
}

/// Execute the `cadlock release-all` command.
///
/// Releases every automatic lease of the current owner. Manual leases are
/// kept; release them one by one.
pub fn cmd_release_all(ctx: &AgentContext) -> Result<()> {
    let manager = writable_manager(ctx)?;
    let released = manager.reclaim(Duration::zero(), true)?;

    let log = ctx.event_log();
    for lease in &released {
        println!("  released {}", lease.resource);
        record(
            &log,
            Event::new(EventAction::Release, manager.owner()).with_resource(&lease.resource),
        );
    }

    println!("Released {} lease(s).", released.len());
    Ok(())
}
