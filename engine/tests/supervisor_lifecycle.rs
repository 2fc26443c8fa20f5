//! End-to-end supervision tests driven through the public event loop

mod common;

use common::{MockHost, RecordingNotifier};
use esm_engine::{
    CrashContext, GameServer, LaunchParameters, PriorityClass, RecoveryConfig, ServerLayout,
    ServerState, ServerSupervisor, SupervisorTiming, ZombiePolicy,
};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

struct Harness {
    supervisor: Arc<ServerSupervisor>,
    host: Arc<MockHost>,
    notifier: Arc<RecordingNotifier>,
    token: CancellationToken,
    server_log: PathBuf,
    _dir: tempfile::TempDir,
}

/// Build a supervisor with shrunk timings and start its event loop
fn harness(crash: CrashContext) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let executable = dir.path().join("TheIsleServer");
    std::fs::write(&executable, b"#!/bin/sh\n").unwrap();
    let server_log = dir.path().join("TheIsle.log");

    let layout = ServerLayout {
        name: "evrima-test".to_string(),
        executable,
        image_name: "TheIsleServer".to_string(),
        server_log: server_log.clone(),
    };
    let server = GameServer::new(layout, crash, ZombiePolicy::default());
    let host = MockHost::new();
    let notifier = RecordingNotifier::new();

    let (supervisor, exit_rx) = ServerSupervisor::new(
        server,
        host.clone(),
        notifier.clone(),
    );
    let supervisor = Arc::new(
        supervisor
            .with_timing(SupervisorTiming {
                graceful_wait: Duration::from_millis(50),
                graceful_attempts: 2,
                save_settle: Duration::from_millis(1),
                restart_cooldown: Duration::from_millis(1),
                exit_poll: Duration::from_millis(5),
            })
            .with_recovery(RecoveryConfig {
                marker: "engine is initialized".to_string(),
                window: Duration::from_secs(2),
                poll: Duration::from_millis(10),
            }),
    );

    let token = CancellationToken::new();
    {
        let supervisor = supervisor.clone();
        let token = token.clone();
        tokio::spawn(async move {
            supervisor.run(exit_rx, token).await;
        });
    }

    Harness {
        supervisor,
        host,
        notifier,
        token,
        server_log,
        _dir: dir,
    }
}

fn params() -> LaunchParameters {
    LaunchParameters::with_core_count(7777, None, PriorityClass::Normal, "", true, 8).unwrap()
}

/// Poll until the condition holds or two seconds elapse
async fn wait_until<F, Fut>(mut condition: F)
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    for _ in 0..200 {
        if condition().await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 2s");
}

#[tokio::test]
async fn test_crash_loop_exhausts_attempts_then_goes_terminal() {
    let h = harness(CrashContext::new(true, true, 3));
    h.supervisor.start(params()).await.unwrap();
    assert_eq!(h.supervisor.state().await, ServerState::Running);

    // Three crashes, each followed by an automatic restart
    for expected_attempt in 1..=3u32 {
        let pid = h.supervisor.pid().await.unwrap();
        h.host.trigger_exit(pid, 1).await;

        let supervisor = h.supervisor.clone();
        wait_until(|| {
            let supervisor = supervisor.clone();
            async move {
                supervisor.restart_attempts().await == expected_attempt
                    && supervisor.state().await == ServerState::Running
            }
        })
        .await;
    }
    assert_eq!(h.host.spawn_count(), 4);

    // Fourth crash: attempts exhausted, terminal Crashed, no further spawn
    let pid = h.supervisor.pid().await.unwrap();
    h.host.trigger_exit(pid, 1).await;

    let supervisor = h.supervisor.clone();
    wait_until(|| {
        let supervisor = supervisor.clone();
        async move { supervisor.state().await == ServerState::Crashed }
    })
    .await;

    assert_eq!(h.supervisor.restart_attempts().await, 3);
    assert_eq!(h.host.spawn_count(), 4);

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = h.notifier.events().await;
    assert!(events.contains(&"restart:true:1/3".to_string()));
    assert!(events.contains(&"restart:true:2/3".to_string()));
    assert!(events.contains(&"restart:true:3/3".to_string()));
    assert!(events.contains(&"failure:3".to_string()));
    assert_eq!(events.iter().filter(|e| e.starts_with("crash:")).count(), 4);

    h.token.cancel();
}

#[tokio::test]
async fn test_recovery_confirmation_resets_counter() {
    let h = harness(CrashContext::new(true, true, 3));
    h.supervisor.start(params()).await.unwrap();

    let pid = h.supervisor.pid().await.unwrap();
    h.host.trigger_exit(pid, 1).await;

    let supervisor = h.supervisor.clone();
    wait_until(|| {
        let supervisor = supervisor.clone();
        async move { supervisor.restart_attempts().await == 1 }
    })
    .await;

    // The restarted server reports readiness in its log
    let mut log = std::fs::File::create(&h.server_log).unwrap();
    writeln!(log, "LogInit: Display: Engine is initialized. Leaving FEngineLoop::Init()").unwrap();

    let supervisor = h.supervisor.clone();
    wait_until(|| {
        let supervisor = supervisor.clone();
        async move { supervisor.restart_attempts().await == 0 }
    })
    .await;

    tokio::time::sleep(Duration::from_millis(50)).await;
    let events = h.notifier.events().await;
    assert!(events.contains(&"success:1".to_string()));

    h.token.cancel();
}

#[tokio::test]
async fn test_recovery_timeout_leaves_counter_and_server_alone() {
    let h = harness(CrashContext::new(true, true, 3));
    h.supervisor.start(params()).await.unwrap();

    let pid = h.supervisor.pid().await.unwrap();
    h.host.trigger_exit(pid, 1).await;

    let supervisor = h.supervisor.clone();
    wait_until(|| {
        let supervisor = supervisor.clone();
        async move { supervisor.state().await == ServerState::Running }
    })
    .await;

    // No marker ever appears; wait past the 2s recovery window
    tokio::time::sleep(Duration::from_millis(2300)).await;

    assert_eq!(h.supervisor.restart_attempts().await, 1);
    assert_eq!(h.supervisor.state().await, ServerState::Running);
    let events = h.notifier.events().await;
    assert!(!events.iter().any(|e| e.starts_with("success:")));

    h.token.cancel();
}

#[tokio::test]
async fn test_stop_during_supervision_is_not_treated_as_crash() {
    let h = harness(CrashContext::new(true, true, 3));
    h.supervisor.start(params()).await.unwrap();
    h.host.set_graceful_exits(true);

    h.supervisor.stop(None).await.unwrap();

    // Give the event loop time to see the exit event from the graceful stop
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.supervisor.state().await, ServerState::Stopped);
    assert_eq!(h.supervisor.restart_attempts().await, 0);
    assert_eq!(h.host.spawn_count(), 1);
    assert!(h.notifier.events().await.is_empty());

    h.token.cancel();
}

#[tokio::test]
async fn test_stop_converges_from_crashed_state() {
    let h = harness(CrashContext::new(true, false, 3));
    h.supervisor.start(params()).await.unwrap();

    let pid = h.supervisor.pid().await.unwrap();
    h.host.trigger_exit(pid, 1).await;

    let supervisor = h.supervisor.clone();
    wait_until(|| {
        let supervisor = supervisor.clone();
        async move { supervisor.state().await == ServerState::Crashed }
    })
    .await;

    h.supervisor.stop(None).await.unwrap();
    assert_eq!(h.supervisor.state().await, ServerState::Stopped);

    h.token.cancel();
}
