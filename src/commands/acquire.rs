//! Implementation of the `cadlock acquire` and `cadlock release` commands.

use super::{record, writable_manager};
use crate::cli::PathArgs;
use crate::context::AgentContext;
use crate::error::{CadlockError, Result};
use crate::events::{Event, EventAction};
use crate::lease::Acquisition;
use crate::store::{Origin, format_age};
use serde_json::json;

/// Execute the `cadlock acquire` command.
///
/// Takes a manual lease. A resource held by someone else fails with
/// `LeaseDenied` naming the holder.
pub fn cmd_acquire(ctx: &AgentContext, args: &PathArgs) -> Result<()> {
    let manager = writable_manager(ctx)?;
    let resource = ctx.resource_id(&args.path)?;
    let log = ctx.event_log();

    match manager.acquire(&resource, Origin::Manual)? {
        Acquisition::Granted { record: lease, created } => {
            if created {
                record(
                    &log,
                    Event::new(EventAction::Acquire, manager.owner())
                        .with_resource(&resource)
                        .with_details(json!({ "origin": lease.origin.to_string() })),
                );
                println!("Acquired lease on {}", resource);
            } else {
                println!(
                    "Already holding {} (since {}, origin: {})",
                    resource,
                    lease.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                    lease.origin
                );
            }
            Ok(())
        }
        Acquisition::Denied { holder } => {
            record(
                &log,
                Event::new(EventAction::Deny, manager.owner())
                    .with_resource(&resource)
                    .with_details(json!({ "holder": holder.owner.to_string() })),
            );
            Err(CadlockError::LeaseDenied(format!(
                "{} is held by {} (since {}, renewed {} ago)",
                resource,
                holder.owner,
                holder.created_at.format("%Y-%m-%d %H:%M:%S UTC"),
                format_age(holder.age())
            )))
        }
    }
}

/// Execute the `cadlock release` command.
///
/// Releasing a resource you do not hold is not an error.
pub fn cmd_release(ctx: &AgentContext, args: &PathArgs) -> Result<()> {
    let manager = ctx.lease_manager();
    let resource = ctx.resource_id(&args.path)?;

    if manager.release(&resource)? {
        record(
            &ctx.event_log(),
            Event::new(EventAction::Release, manager.owner()).with_resource(&resource),
        );
        println!("Released lease on {}", resource);
    } else {
        println!("No lease of yours on {}", resource);
    }

    Ok(())
}
