//! Implementation of the `cadlock open` command.

use super::{record, writable_manager};
use crate::cli::PathArgs;
use crate::context::AgentContext;
use crate::error::Result;
use crate::events::{Event, EventAction};
use crate::launch::{Launcher, OpenMode, plan_open};
use crate::store::format_age;
use serde_json::json;
use std::path::Path;

/// Execute the `cadlock open` command.
///
/// Takes a manual lease and opens the resource in the configured editor,
/// read-only when someone else holds it. Without a `launcher_command` only
/// the lease is taken.
pub fn cmd_open(ctx: &AgentContext, args: &PathArgs) -> Result<()> {
    let manager = writable_manager(ctx)?;
    let resource = ctx.resource_id(&args.path)?;

    let launcher = ctx
        .config
        .launcher_command
        .as_deref()
        .map(|cmd| Launcher::parse(cmd, &ctx.config.read_only_args))
        .transpose()?;

    let plan = plan_open(&manager, &resource)?;

    if let Some(holder) = &plan.holder {
        println!(
            "{} is held by {} (renewed {} ago), opening read-only",
            resource,
            holder.owner,
            format_age(holder.age())
        );
    }

    record(
        &ctx.event_log(),
        Event::new(EventAction::Open, manager.owner())
            .with_resource(&resource)
            .with_details(json!({
                "mode": plan.mode.to_string(),
                "holder": plan.holder.as_ref().map(|h| h.owner.to_string()),
            })),
    );

    match launcher {
        Some(launcher) => {
            launcher.launch(Path::new(resource.as_str()), plan.mode)?;
            println!("Opened {} ({})", resource, plan.mode);
        }
        None => {
            if plan.mode == OpenMode::Normal {
                println!("Acquired lease on {}", resource);
            }
            println!("No launcher_command configured; open the document yourself.");
        }
    }

    Ok(())
}
