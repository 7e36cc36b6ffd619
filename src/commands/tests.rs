//! Tests for the command handlers.
//!
//! Each test builds an agent context over a temporary resource root with an
//! explicit config file, and plays several owners against the same lock
//! directory by swapping the context's owner.

use super::*;
use crate::cli::{CleanupArgs, MonitorArgs, PathArgs, StatusArgs};
use crate::error::CadlockError;
use crate::events::EventAction;
use crate::exit_codes;
use crate::lease::LeaseStatus;
use crate::resource::Owner;
use crate::store::{LeaseRecord, Origin};
use chrono::{Duration, Utc};
use std::fs;
use tempfile::TempDir;

fn context(temp_dir: &TempDir, extra_yaml: &str, owner: Owner) -> AgentContext {
    let config_path = temp_dir.path().join("cadlock.yaml");
    let yaml = format!(
        "resource_root: .\nevents_log: events.ndjson\n{}",
        extra_yaml
    );
    fs::write(&config_path, yaml).unwrap();
    AgentContext::resolve_from(temp_dir.path(), Some(&config_path))
        .unwrap()
        .with_owner(owner)
}

fn alice(temp_dir: &TempDir) -> AgentContext {
    context(temp_dir, "", Owner::new("alice", "CAD-01"))
}

fn bob(temp_dir: &TempDir) -> AgentContext {
    context(temp_dir, "", Owner::new("bob", "CAD-02"))
}

fn path_args(path: &str) -> PathArgs {
    PathArgs {
        path: path.to_string(),
    }
}

fn logged_actions(ctx: &AgentContext) -> Vec<EventAction> {
    let Some(path) = ctx.event_log().path().map(|p| p.to_path_buf()) else {
        return Vec::new();
    };
    let Ok(content) = fs::read_to_string(path) else {
        return Vec::new();
    };
    content
        .lines()
        .map(|line| serde_json::from_str::<crate::events::Event>(line).unwrap().action)
        .collect()
}

fn status_of(ctx: &AgentContext, path: &str) -> LeaseStatus {
    let resource = ctx.resource_id(path).unwrap();
    ctx.lease_manager().status(&resource).unwrap()
}

fn write_aged(ctx: &AgentContext, path: &str, owner: Owner, origin: Origin, age: Duration) {
    let manager = ctx.lease_manager();
    manager.store().ensure_dir().unwrap();
    let resource = ctx.resource_id(path).unwrap();
    let mut record = LeaseRecord::new(resource.clone(), owner, origin);
    record.created_at = Utc::now() - age;
    record.last_renewed_at = Utc::now() - age;
    manager
        .store()
        .replace(&manager.key_for(&resource), &record)
        .unwrap();
}

#[test]
fn test_acquire_takes_manual_lease_and_logs() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);

    cmd_acquire(&ctx, &path_args("P1.sldprt")).unwrap();

    match status_of(&ctx, "P1.sldprt") {
        LeaseStatus::HeldByCaller(record) => assert_eq!(record.origin, Origin::Manual),
        other => panic!("unexpected status: {:?}", other),
    }
    assert!(ctx.lock_dir.is_dir());
    assert_eq!(logged_actions(&ctx), vec![EventAction::Acquire]);
}

#[test]
fn test_acquire_twice_is_idempotent() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);

    cmd_acquire(&ctx, &path_args("P1.sldprt")).unwrap();
    cmd_acquire(&ctx, &path_args("P1.sldprt")).unwrap();

    assert_eq!(logged_actions(&ctx), vec![EventAction::Acquire]);
}

#[test]
fn test_acquire_held_by_other_is_denied() {
    let temp_dir = TempDir::new().unwrap();
    cmd_acquire(&alice(&temp_dir), &path_args("P1.sldprt")).unwrap();

    let ctx = bob(&temp_dir);
    let err = cmd_acquire(&ctx, &path_args("P1.sldprt")).unwrap_err();

    assert!(matches!(err, CadlockError::LeaseDenied(_)));
    assert_eq!(err.exit_code(), exit_codes::LOCK_FAILURE);
    assert!(err.to_string().contains("alice@CAD-01"));
    match status_of(&ctx, "P1.sldprt") {
        LeaseStatus::HeldByOther(record) => {
            assert_eq!(record.owner, Owner::new("alice", "CAD-01"))
        }
        other => panic!("unexpected status: {:?}", other),
    }
}

#[test]
fn test_acquire_replaces_abandoned_foreign_lease() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = context(&temp_dir, "stale_minutes: 60\n", Owner::new("alice", "CAD-01"));
    write_aged(
        &ctx,
        "P1.sldprt",
        Owner::new("bob", "CAD-02"),
        Origin::AutoDetected,
        Duration::hours(2),
    );

    cmd_acquire(&ctx, &path_args("P1.sldprt")).unwrap();

    match status_of(&ctx, "P1.sldprt") {
        LeaseStatus::HeldByCaller(record) => assert_eq!(record.origin, Origin::Manual),
        other => panic!("unexpected status: {:?}", other),
    }
    assert_eq!(logged_actions(&ctx), vec![EventAction::Acquire]);
}

#[test]
fn test_acquire_rejects_empty_path() {
    let temp_dir = TempDir::new().unwrap();
    let err = cmd_acquire(&alice(&temp_dir), &path_args("  ")).unwrap_err();
    assert_eq!(err.exit_code(), exit_codes::USER_ERROR);
}

#[test]
fn test_release_own_and_absent() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);
    cmd_acquire(&ctx, &path_args("P1.sldprt")).unwrap();

    cmd_release(&ctx, &path_args("P1.sldprt")).unwrap();
    assert!(matches!(status_of(&ctx, "P1.sldprt"), LeaseStatus::Free));

    cmd_release(&ctx, &path_args("P1.sldprt")).unwrap();
    assert_eq!(
        logged_actions(&ctx),
        vec![EventAction::Acquire, EventAction::Release]
    );
}

#[test]
fn test_release_leaves_foreign_lease() {
    let temp_dir = TempDir::new().unwrap();
    cmd_acquire(&alice(&temp_dir), &path_args("P1.sldprt")).unwrap();

    let ctx = bob(&temp_dir);
    cmd_release(&ctx, &path_args("P1.sldprt")).unwrap();

    assert!(matches!(
        status_of(&ctx, "P1.sldprt"),
        LeaseStatus::HeldByOther(_)
    ));
}

#[test]
fn test_status_single_and_listing() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);

    cmd_status(&ctx, &StatusArgs { path: None }).unwrap();

    cmd_acquire(&ctx, &path_args("P1.sldprt")).unwrap();
    fs::write(ctx.lock_dir.join("garbage.lock"), "{ not json").unwrap();

    cmd_status(&ctx, &StatusArgs { path: None }).unwrap();
    cmd_status(
        &ctx,
        &StatusArgs {
            path: Some("P1.sldprt".to_string()),
        },
    )
    .unwrap();
    cmd_status(
        &ctx,
        &StatusArgs {
            path: Some("A1.sldasm".to_string()),
        },
    )
    .unwrap();
}

#[test]
fn test_cleanup_removes_only_old_leases() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);
    write_aged(
        &ctx,
        "Old.sldprt",
        Owner::new("carol", "CAD-03"),
        Origin::AutoDetected,
        Duration::minutes(30),
    );
    cmd_acquire(&bob(&temp_dir), &path_args("Fresh.sldprt")).unwrap();

    cmd_cleanup(&ctx, &CleanupArgs { max_age_minutes: None }).unwrap();
    assert!(matches!(
        status_of(&ctx, "Old.sldprt"),
        LeaseStatus::HeldByOther(_)
    ));

    cmd_cleanup(
        &ctx,
        &CleanupArgs {
            max_age_minutes: Some(10),
        },
    )
    .unwrap();

    assert!(matches!(status_of(&ctx, "Old.sldprt"), LeaseStatus::Free));
    assert!(matches!(
        status_of(&ctx, "Fresh.sldprt"),
        LeaseStatus::HeldByOther(_)
    ));
    assert_eq!(logged_actions(&ctx), vec![EventAction::Cleanup]);
}

#[test]
fn test_cleanup_zero_age_keeps_future_stamped_lease() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);
    write_aged(
        &ctx,
        "Skewed.sldprt",
        Owner::new("bob", "CAD-02"),
        Origin::Manual,
        Duration::minutes(-5),
    );

    cmd_cleanup(
        &ctx,
        &CleanupArgs {
            max_age_minutes: Some(0),
        },
    )
    .unwrap();

    assert!(matches!(
        status_of(&ctx, "Skewed.sldprt"),
        LeaseStatus::HeldByOther(_)
    ));
}

#[test]
fn test_release_all_keeps_manual_and_foreign_leases() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);
    write_aged(
        &ctx,
        "Auto.sldprt",
        ctx.owner.clone(),
        Origin::AutoDetected,
        Duration::seconds(5),
    );
    cmd_acquire(&ctx, &path_args("Manual.sldprt")).unwrap();
    cmd_acquire(&bob(&temp_dir), &path_args("Bob.sldprt")).unwrap();

    cmd_release_all(&ctx).unwrap();

    assert!(matches!(status_of(&ctx, "Auto.sldprt"), LeaseStatus::Free));
    assert!(matches!(
        status_of(&ctx, "Manual.sldprt"),
        LeaseStatus::HeldByCaller(_)
    ));
    assert!(matches!(
        status_of(&ctx, "Bob.sldprt"),
        LeaseStatus::HeldByOther(_)
    ));
}

#[test]
fn test_open_without_launcher_takes_lease() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);

    cmd_open(&ctx, &path_args("D1.slddrw")).unwrap();

    assert!(matches!(
        status_of(&ctx, "D1.slddrw"),
        LeaseStatus::HeldByCaller(_)
    ));
    assert_eq!(logged_actions(&ctx), vec![EventAction::Open]);
}

#[test]
fn test_open_held_elsewhere_is_not_an_error() {
    let temp_dir = TempDir::new().unwrap();
    cmd_open(&alice(&temp_dir), &path_args("D1.slddrw")).unwrap();

    let ctx = bob(&temp_dir);
    cmd_open(&ctx, &path_args("D1.slddrw")).unwrap();

    match status_of(&ctx, "D1.slddrw") {
        LeaseStatus::HeldByOther(record) => {
            assert_eq!(record.owner, Owner::new("alice", "CAD-01"))
        }
        other => panic!("unexpected status: {:?}", other),
    }
}

#[test]
fn test_open_with_missing_editor_is_launch_error() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = context(
        &temp_dir,
        "launcher_command: cadlock-no-such-editor\n",
        Owner::new("alice", "CAD-01"),
    );

    let err = cmd_open(&ctx, &path_args("D1.slddrw")).unwrap_err();

    assert!(matches!(err, CadlockError::LaunchError(_)));
    assert_eq!(err.exit_code(), exit_codes::LAUNCH_FAILURE);
}

#[test]
fn test_stop_writes_marker() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);

    cmd_stop(&ctx).unwrap();

    let marker = ctx.stop_marker_path();
    assert!(marker.is_file());
    assert_eq!(fs::read_to_string(marker).unwrap(), "alice@CAD-01");
}

#[test]
fn test_monitor_once_leases_open_document_then_drains() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);
    fs::write(temp_dir.path().join("P1.sldprt"), "part").unwrap();
    fs::write(temp_dir.path().join("~$P1.sldprt"), "").unwrap();

    cmd_monitor(
        &ctx,
        &MonitorArgs {
            cycles: None,
            once: true,
            quiet: false,
        },
    )
    .unwrap();

    assert!(matches!(status_of(&ctx, "P1.sldprt"), LeaseStatus::Free));
    assert_eq!(
        logged_actions(&ctx),
        vec![
            EventAction::MonitorStart,
            EventAction::Acquire,
            EventAction::Release,
            EventAction::MonitorStop,
        ]
    );
}

#[test]
fn test_monitor_discards_stop_request_from_before_start() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = alice(&temp_dir);
    cmd_stop(&ctx).unwrap();

    cmd_monitor(
        &ctx,
        &MonitorArgs {
            cycles: None,
            once: true,
            quiet: false,
        },
    )
    .unwrap();

    assert!(!ctx.stop_marker_path().exists());
}

#[test]
fn test_monitor_survives_unreadable_root() {
    let temp_dir = TempDir::new().unwrap();
    let ctx = AgentContext {
        resource_root: temp_dir.path().join("missing"),
        ..alice(&temp_dir)
    };

    // A failed cycle is skipped, not returned.
    cmd_monitor(
        &ctx,
        &MonitorArgs {
            cycles: None,
            once: true,
            quiet: true,
        },
    )
    .unwrap();

    assert_eq!(
        logged_actions(&ctx),
        vec![EventAction::MonitorStart, EventAction::MonitorStop]
    );
}
