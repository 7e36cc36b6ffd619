//! Implementation of the `cadlock monitor` and `cadlock stop` commands.

use super::writable_manager;
use crate::cli::MonitorArgs;
use crate::conflict::CollisionEvent;
use crate::context::AgentContext;
use crate::error::Result;
use crate::fs::atomic_write;
use crate::reconcile::{
    LoopHandle, LoopSettings, LoopSummary, NotificationSink, Notifier, ReconcileLoop,
};
use crate::resource::ResourceId;
use std::io::{self, BufRead, IsTerminal};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::Duration;
use tracing::debug;

const QUIT_POLL: Duration = Duration::from_millis(200);

/// Prints notifications to stdout.
struct ConsoleSink;

impl NotificationSink for ConsoleSink {
    fn on_collision(&mut self, event: &CollisionEvent) {
        println!("COLLISION: {}", event);
    }

    fn on_lease_acquired(&mut self, resource: &ResourceId) {
        println!("leased   {}", resource);
    }

    fn on_lease_released(&mut self, resource: &ResourceId) {
        println!("released {}", resource);
    }
}

/// Execute the `cadlock monitor` command.
///
/// Runs the reconciliation loop on a background thread until `q` (or end of
/// input) is typed on an interactive terminal, `cadlock stop` is run for the
/// same owner, or the requested number of cycles is done. Auto leases are
/// released on the way out.
pub fn cmd_monitor(ctx: &AgentContext, args: &MonitorArgs) -> Result<()> {
    let manager = writable_manager(ctx)?;
    let activity = ctx.activity_source()?;
    let notifier = if args.quiet {
        Notifier::disabled()
    } else {
        Notifier::spawn(ConsoleSink, ctx.config.notification_queue)
    };

    let settings = LoopSettings {
        poll_interval: ctx.config.poll_interval(),
        stale_after: ctx.config.stale_after(),
        gc_each_cycle: ctx.config.gc_each_cycle,
        stop_marker: Some(ctx.stop_marker_path()),
    };

    eprintln!("cadlock monitor started");
    eprintln!("  owner:    {}", ctx.owner);
    eprintln!("  root:     {}", ctx.resource_root.display());
    eprintln!("  locks:    {}", ctx.lock_dir.display());
    eprintln!("  interval: {}s", ctx.config.poll_interval_secs);
    if let Some(path) = ctx.event_log().path() {
        eprintln!("  events:   {}", path.display());
    }
    eprintln!();

    let handle = ReconcileLoop::new(manager, activity, notifier, settings)
        .with_event_log(ctx.event_log())
        .spawn(args.max_cycles())?;

    let summary = if io::stdin().is_terminal() {
        eprintln!("Type `q` and Enter to stop.");
        let (quit_tx, quit_rx) = mpsc::channel();
        watch_stdin(quit_tx);
        wait_for_quit(handle, &quit_rx)?
    } else {
        handle.join()?
    };

    eprintln!(
        "cadlock monitor stopped after {} cycle(s) ({} failed), released {} lease(s)",
        summary.cycles, summary.failed_cycles, summary.drained
    );
    if summary.dropped_notifications > 0 {
        eprintln!(
            "  {} notification(s) dropped, raise notification_queue to keep them",
            summary.dropped_notifications
        );
    }
    Ok(())
}

/// Wait until the loop ends by itself or a quit arrives, then stop it.
fn wait_for_quit(handle: LoopHandle, quit: &Receiver<()>) -> Result<LoopSummary> {
    while !handle.is_finished() {
        match quit.recv_timeout(QUIT_POLL) {
            Ok(()) => return handle.stop(),
            // No watcher thread; only the loop itself can end the run.
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => continue,
        }
    }
    handle.join()
}

/// Send on `quit` when `q` or end of input is read. The thread is left to die
/// with the process.
fn watch_stdin(quit: Sender<()>) {
    let spawned = thread::Builder::new()
        .name("cadlock-stdin".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                match line {
                    Ok(line) if line.trim().eq_ignore_ascii_case("q") => break,
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            let _ = quit.send(());
        });

    if let Err(e) = spawned {
        debug!(error = %e, "stdin watcher not started");
    }
}

/// Execute the `cadlock stop` command.
///
/// Drops a stop request for this owner into the lock directory. The running
/// monitor picks it up at the end of its current cycle.
pub fn cmd_stop(ctx: &AgentContext) -> Result<()> {
    writable_manager(ctx)?;
    let marker = ctx.stop_marker_path();

    atomic_write(&marker, ctx.owner.to_string().as_bytes(), &ctx.owner.key())?;

    println!("Stop requested for {}", ctx.owner);
    println!("The monitor stops at the end of its current cycle.");
    Ok(())
}
