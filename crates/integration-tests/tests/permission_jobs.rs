//! Permission jobs through the supervisor with the real walkdir normalizer

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use vsl_core::application::{
    BroadcastNotifier, JobOutcome, Supervisor, SupervisorConfig, TaskEvent, TaskRegistry,
};
use vsl_core::domain::{NotificationKind, TaskStatus, TaskType};
use vsl_core::port::id_provider::UuidProvider;
use vsl_core::port::launcher::mocks::MockLauncher;
use vsl_core::port::time_provider::SystemTimeProvider;
use vsl_infra_system::WalkdirNormalizer;

fn supervisor() -> (Supervisor, Arc<BroadcastNotifier>) {
    let notifier = Arc::new(BroadcastNotifier::new());
    let supervisor = Supervisor::new(
        Arc::new(TaskRegistry::new(
            Arc::new(UuidProvider),
            Arc::new(SystemTimeProvider),
        )),
        Arc::new(MockLauncher::new_exit(0)),
        Arc::new(WalkdirNormalizer::new()),
        notifier.clone(),
        Arc::new(UuidProvider),
        SupervisorConfig::default(),
    );
    (supervisor, notifier)
}

fn mode_of(path: &Path) -> u32 {
    fs::metadata(path).unwrap().permissions().mode() & 0o777
}

/// Layout of an extracted game build
fn game_tree(root: &Path) {
    fs::create_dir_all(root.join("Mods")).unwrap();
    fs::create_dir_all(root.join("assets/game/shaders")).unwrap();
    fs::write(root.join("Vintagestory"), b"#!/bin/sh\n").unwrap();
    fs::write(root.join("Mods/VSSurvivalMod.dll"), b"").unwrap();
    fs::write(root.join("assets/game/shaders/sky.vsh"), b"").unwrap();
    for file in ["Vintagestory", "Mods/VSSurvivalMod.dll", "assets/game/shaders/sky.vsh"] {
        fs::set_permissions(root.join(file), fs::Permissions::from_mode(0o600)).unwrap();
    }
}

#[tokio::test]
async fn change_permissions_normalizes_whole_tree() {
    let (supervisor, notifier) = supervisor();
    let mut notifications = notifier.subscribe();
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("1.19.8");
    game_tree(&root);

    let ticket = supervisor.change_permissions(vec![root.clone()], 0o755);
    let task_id = ticket.task_id.clone();
    assert_eq!(ticket.wait().await, JobOutcome::Done);

    for path in [
        root.clone(),
        root.join("Vintagestory"),
        root.join("Mods"),
        root.join("Mods/VSSurvivalMod.dll"),
        root.join("assets/game/shaders"),
        root.join("assets/game/shaders/sky.vsh"),
    ] {
        assert_eq!(mode_of(&path), 0o755, "{}", path.display());
    }

    let task = supervisor.registry().get(&task_id).unwrap();
    assert_eq!(task.task_type, TaskType::PermissionNormalize);
    assert_eq!(task.status, TaskStatus::Completed);
    assert_eq!(task.progress, 100.0);

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.kind, NotificationKind::Success);
}

#[tokio::test]
async fn missing_roots_do_not_fail_the_job() {
    let (supervisor, _) = supervisor();
    let dir = TempDir::new().unwrap();
    let present = dir.path().join("present");
    game_tree(&present);

    let outcome = supervisor
        .change_permissions(
            vec![dir.path().join("gone"), present.clone(), dir.path().join("also-gone")],
            0o700,
        )
        .wait()
        .await;

    assert_eq!(outcome, JobOutcome::Done);
    assert_eq!(mode_of(&present.join("Mods/VSSurvivalMod.dll")), 0o700);
}

#[tokio::test]
async fn progress_is_observed_in_order() {
    let (supervisor, _) = supervisor();
    let mut events = supervisor.registry().subscribe();
    let dir = TempDir::new().unwrap();
    let roots: Vec<_> = (0..4).map(|i| dir.path().join(format!("root-{}", i))).collect();
    for root in &roots {
        game_tree(root);
    }

    let outcome = supervisor.change_permissions(roots, 0o755).wait().await;
    assert_eq!(outcome, JobOutcome::Done);

    let mut observed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TaskEvent::Updated(task) = event {
            observed.push(task.progress);
        }
    }
    assert!(observed.windows(2).all(|w| w[0] <= w[1]));
    assert!(observed.contains(&25.0));
    assert_eq!(observed.last().copied(), Some(100.0));
}

#[tokio::test]
async fn unreadable_subtree_fails_the_task_but_finishes_the_walk() {
    let (supervisor, notifier) = supervisor();
    let mut notifications = notifier.subscribe();
    let dir = TempDir::new().unwrap();
    let broken = dir.path().join("broken");
    let healthy = dir.path().join("healthy");
    game_tree(&broken);
    game_tree(&healthy);
    let locked = broken.join("Mods/locked");
    fs::create_dir(&locked).unwrap();
    fs::set_permissions(&locked, fs::Permissions::from_mode(0o000)).unwrap();
    if fs::read_dir(&locked).is_ok() {
        // Privileged user: nothing is unreadable
        return;
    }

    let ticket = supervisor.change_permissions(vec![broken.clone(), healthy.clone()], 0o755);
    let task_id = ticket.task_id.clone();
    let outcome = ticket.wait().await;

    let expected = format!("could not change permissions of {}", locked.display());
    match outcome {
        JobOutcome::Failed(reason) => assert!(reason.starts_with(&expected), "{}", reason),
        JobOutcome::Done => panic!("expected the locked directory to fail the job"),
    }
    assert_eq!(mode_of(&broken.join("Mods/VSSurvivalMod.dll")), 0o755);
    assert_eq!(mode_of(&healthy.join("assets/game/shaders/sky.vsh")), 0o755);
    assert_eq!(mode_of(&locked), 0o755);

    let task = supervisor.registry().get(&task_id).unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.progress, 100.0);

    let notification = notifications.recv().await.unwrap();
    assert_eq!(notification.kind, NotificationKind::Error);
    assert!(notifications.try_recv().is_err());
}
