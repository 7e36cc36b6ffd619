//! Implementation of the `cadlock status` command.

use crate::cli::StatusArgs;
use crate::context::AgentContext;
use crate::error::Result;
use crate::lease::LeaseStatus;
use crate::store::{LeaseRecord, StoredLease, format_age};

/// Execute the `cadlock status` command.
///
/// With a path, shows who holds that resource. Without one, lists every
/// record in the lock directory, stale and corrupt ones included.
pub fn cmd_status(ctx: &AgentContext, args: &StatusArgs) -> Result<()> {
    let manager = ctx.lease_manager();

    if let Some(path) = &args.path {
        let resource = ctx.resource_id(path)?;
        match manager.status(&resource)? {
            LeaseStatus::Free => println!("{}: free", resource),
            LeaseStatus::HeldByCaller(lease) => {
                println!("{}: held by you", resource);
                print_holder(&lease);
            }
            LeaseStatus::HeldByOther(lease) => {
                println!("{}: held by {}", resource, lease.owner);
                print_holder(&lease);
            }
            LeaseStatus::Corrupt(corrupt) => {
                println!("{}: unreadable lease record", resource);
                println!("  file:   {}", corrupt.path.display());
                println!("  reason: {}", corrupt.reason);
            }
        }
        return Ok(());
    }

    let leases = manager.list(ctx.config.stale_after())?;

    println!("Leases in {}", manager.store().dir().display());
    println!();

    if leases.is_empty() {
        println!("No leases.");
        return Ok(());
    }

    for info in &leases {
        println!("  - {}", info);
    }

    let stale = leases.iter().filter(|l| l.is_stale).count();
    let corrupt = leases
        .iter()
        .filter(|l| matches!(l.lease, StoredLease::Corrupt(_)))
        .count();

    println!();
    println!("{} lease(s), {} stale, {} corrupt", leases.len(), stale, corrupt);
    if stale > 0 {
        println!(
            "Run `cadlock cleanup` to remove leases older than {} minutes.",
            ctx.config.stale_minutes
        );
    }

    Ok(())
}

fn print_holder(lease: &LeaseRecord) {
    println!("  owner:   {}", lease.owner);
    println!("  origin:  {}", lease.origin);
    println!(
        "  since:   {}",
        lease.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  renewed: {} ago", format_age(lease.age()));
}
