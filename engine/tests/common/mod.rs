#![allow(dead_code)]

//! Shared test doubles for supervisor integration tests

use async_trait::async_trait;
use esm_engine::{
    AffinityMask, DomainError, Notifier, PriorityClass, ProcessHost, Result, SpawnConfig,
    SpawnResult,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{oneshot, Mutex};

/// In-memory process host; exits are triggered by the test
pub struct MockHost {
    running: Arc<Mutex<HashSet<u32>>>,
    exit_txs: Arc<Mutex<HashMap<u32, oneshot::Sender<i32>>>>,
    next_pid: AtomicU32,
    spawn_count: AtomicU32,
    fail_spawn: AtomicBool,
    graceful_exits: AtomicBool,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            running: Arc::new(Mutex::new(HashSet::new())),
            exit_txs: Arc::new(Mutex::new(HashMap::new())),
            next_pid: AtomicU32::new(1000),
            spawn_count: AtomicU32::new(0),
            fail_spawn: AtomicBool::new(false),
            graceful_exits: AtomicBool::new(false),
        })
    }

    pub fn spawn_count(&self) -> u32 {
        self.spawn_count.load(Ordering::SeqCst)
    }

    pub fn set_fail_spawn(&self, fail: bool) {
        self.fail_spawn.store(fail, Ordering::SeqCst);
    }

    pub fn set_graceful_exits(&self, exits: bool) {
        self.graceful_exits.store(exits, Ordering::SeqCst);
    }

    /// Simulate an unexpected exit of a spawned process
    pub async fn trigger_exit(&self, pid: u32, exit_code: i32) {
        self.running.lock().await.remove(&pid);
        if let Some(tx) = self.exit_txs.lock().await.remove(&pid) {
            let _ = tx.send(exit_code);
        }
    }
}

#[async_trait]
impl ProcessHost for MockHost {
    async fn spawn(&self, _config: SpawnConfig) -> Result<SpawnResult> {
        if self.fail_spawn.load(Ordering::SeqCst) {
            return Err(DomainError::SpawnFailed("mock spawn failure".to_string()));
        }
        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.spawn_count.fetch_add(1, Ordering::SeqCst);
        self.running.lock().await.insert(pid);

        let (tx, rx) = oneshot::channel();
        self.exit_txs.lock().await.insert(pid, tx);
        let exit_handle = Box::pin(async move {
            rx.await
                .map_err(|_| DomainError::SpawnFailed("exit handle dropped".to_string()))
        });
        Ok(SpawnResult {
            pid,
            exit_handle: Some(exit_handle),
        })
    }

    async fn set_priority(&self, _pid: u32, _priority: PriorityClass) -> Result<()> {
        Ok(())
    }

    async fn set_affinity(&self, _pid: u32, _mask: AffinityMask) -> Result<()> {
        Ok(())
    }

    async fn signal_graceful(&self, pid: u32) -> Result<()> {
        if self.graceful_exits.load(Ordering::SeqCst) {
            self.trigger_exit(pid, 0).await;
        }
        Ok(())
    }

    async fn force_kill(&self, pid: u32) -> Result<()> {
        self.trigger_exit(pid, 137).await;
        Ok(())
    }

    async fn is_running(&self, pid: u32) -> Result<bool> {
        Ok(self.running.lock().await.contains(&pid))
    }

    async fn find_by_image_name(&self, _image_name: &str) -> Result<Vec<u32>> {
        let mut pids: Vec<u32> = self.running.lock().await.iter().copied().collect();
        pids.sort_unstable();
        Ok(pids)
    }
}

/// Records every notification as a compact event string
pub struct RecordingNotifier {
    events: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            events: Mutex::new(Vec::new()),
        })
    }

    pub async fn events(&self) -> Vec<String> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_crash_notification(
        &self,
        _server_name: &str,
        _crash_time: SystemTime,
        exit_code: Option<i32>,
        _uptime: Option<Duration>,
    ) -> bool {
        self.events
            .lock()
            .await
            .push(format!("crash:{}", exit_code.unwrap_or(-1)));
        true
    }

    async fn send_restart_notification(
        &self,
        _server_name: &str,
        is_auto: bool,
        attempt: u32,
        max_attempts: u32,
    ) -> bool {
        self.events
            .lock()
            .await
            .push(format!("restart:{is_auto}:{attempt}/{max_attempts}"));
        true
    }

    async fn send_auto_restart_success(&self, _server_name: &str, attempt: u32) -> bool {
        self.events.lock().await.push(format!("success:{attempt}"));
        true
    }

    async fn send_auto_restart_failure(&self, _server_name: &str, max_attempts: u32) -> bool {
        self.events
            .lock()
            .await
            .push(format!("failure:{max_attempts}"));
        true
    }
}
