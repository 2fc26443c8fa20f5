//! Tokio Process Host
//! Real implementation of the ProcessHost port
//!
//! Cross-platform process management for the game server:
//! - Unix: signals via libc, niceness/sched_setaffinity, /proc enumeration
//! - Windows: console ctrl events, priority classes, affinity masks, PSAPI

use crate::domain::ports::{ProcessExitHandle, ProcessHost, SpawnConfig, SpawnResult};
use crate::domain::{AffinityMask, DomainError, PriorityClass};
use async_trait::async_trait;
use std::process::{Command, Stdio};
use tracing::{debug, error, info, warn};

/// Tokio-based process host
///
/// This adapter translates domain operations into actual system calls. The
/// graceful-termination signal is SIGTERM on Unix and a console ctrl event on
/// Windows; the state machine never sees the difference.
pub struct TokioProcessHost;

impl TokioProcessHost {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioProcessHost {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProcessHost for TokioProcessHost {
    async fn spawn(&self, config: SpawnConfig) -> Result<SpawnResult, DomainError> {
        info!(
            executable = %config.executable.display(),
            args = ?config.args,
            "Spawning server process"
        );

        let mut cmd = Command::new(&config.executable);
        cmd.args(&config.args);
        if let Some(ref dir) = config.working_dir {
            debug!(working_dir = %dir.display(), "Setting working directory");
            cmd.current_dir(dir);
        }

        // The server writes its own log file; its stdio is not consumed
        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::null());
        cmd.stderr(Stdio::null());

        let child = cmd.spawn().map_err(|e| {
            error!(
                executable = %config.executable.display(),
                error = %e,
                "Failed to spawn server process"
            );
            DomainError::SpawnFailed(format!("{}: {}", config.executable.display(), e))
        })?;

        let pid = child.id();
        info!(pid = pid, "Server process spawned");

        let exit_handle = create_exit_handle(child, pid);
        Ok(SpawnResult {
            pid,
            exit_handle: Some(exit_handle),
        })
    }

    async fn set_priority(&self, pid: u32, priority: PriorityClass) -> Result<(), DomainError> {
        debug!(pid = pid, priority = %priority, "Applying priority class");

        #[cfg(unix)]
        {
            let nice = unix_niceness(priority);
            let rc = unsafe { libc::setpriority(libc::PRIO_PROCESS as _, pid as libc::id_t, nice) };
            if rc != 0 {
                return Err(DomainError::OsApplyFailure {
                    what: "priority class".to_string(),
                    reason: std::io::Error::last_os_error().to_string(),
                });
            }
            Ok(())
        }

        #[cfg(windows)]
        {
            windows_impl::set_priority(pid, priority)
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = (pid, priority);
            Err(DomainError::OsApplyFailure {
                what: "priority class".to_string(),
                reason: "unsupported platform".to_string(),
            })
        }
    }

    async fn set_affinity(&self, pid: u32, mask: AffinityMask) -> Result<(), DomainError> {
        debug!(pid = pid, mask = %mask, "Applying CPU affinity");

        #[cfg(target_os = "linux")]
        {
            let mut set: libc::cpu_set_t = unsafe { std::mem::zeroed() };
            unsafe { libc::CPU_ZERO(&mut set) };
            for core in mask.cores() {
                unsafe { libc::CPU_SET(core, &mut set) };
            }
            let rc = unsafe {
                libc::sched_setaffinity(
                    pid as libc::pid_t,
                    std::mem::size_of::<libc::cpu_set_t>(),
                    &set,
                )
            };
            if rc != 0 {
                return Err(DomainError::OsApplyFailure {
                    what: "CPU affinity".to_string(),
                    reason: std::io::Error::last_os_error().to_string(),
                });
            }
            Ok(())
        }

        #[cfg(windows)]
        {
            windows_impl::set_affinity(pid, mask)
        }

        #[cfg(not(any(target_os = "linux", windows)))]
        {
            let _ = (pid, mask);
            Err(DomainError::OsApplyFailure {
                what: "CPU affinity".to_string(),
                reason: "unsupported platform".to_string(),
            })
        }
    }

    async fn signal_graceful(&self, pid: u32) -> Result<(), DomainError> {
        info!(pid = pid, "Sending graceful termination signal");

        #[cfg(unix)]
        {
            send_signal(pid, libc::SIGTERM)
        }

        #[cfg(windows)]
        {
            let result = tokio::task::spawn_blocking(move || windows_impl::send_ctrl_event(pid))
                .await
                .map_err(|e| DomainError::OsApplyFailure {
                    what: "console ctrl event".to_string(),
                    reason: format!("task failed: {}", e),
                })?;
            result
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = pid;
            Err(DomainError::OsApplyFailure {
                what: "graceful signal".to_string(),
                reason: "unsupported platform".to_string(),
            })
        }
    }

    async fn force_kill(&self, pid: u32) -> Result<(), DomainError> {
        warn!(pid = pid, "Force-killing process");

        #[cfg(unix)]
        {
            send_signal(pid, libc::SIGKILL)
        }

        #[cfg(windows)]
        {
            windows_impl::terminate(pid)
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = pid;
            Err(DomainError::OsApplyFailure {
                what: "force kill".to_string(),
                reason: "unsupported platform".to_string(),
            })
        }
    }

    async fn is_running(&self, pid: u32) -> Result<bool, DomainError> {
        #[cfg(unix)]
        {
            let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
            if rc == 0 {
                return Ok(true);
            }
            match std::io::Error::last_os_error().raw_os_error() {
                Some(libc::ESRCH) => Ok(false),
                // EPERM: the process exists but belongs to someone else
                Some(libc::EPERM) => Ok(true),
                _ => Ok(false),
            }
        }

        #[cfg(windows)]
        {
            windows_impl::is_running(pid)
        }

        #[cfg(not(any(unix, windows)))]
        {
            let _ = pid;
            Ok(false)
        }
    }

    async fn find_by_image_name(&self, image_name: &str) -> Result<Vec<u32>, DomainError> {
        let image = image_name.to_string();

        #[cfg(target_os = "linux")]
        {
            tokio::task::spawn_blocking(move || scan_proc(&image))
                .await
                .map_err(|e| DomainError::OsApplyFailure {
                    what: "process enumeration".to_string(),
                    reason: format!("task failed: {}", e),
                })?
        }

        #[cfg(windows)]
        {
            tokio::task::spawn_blocking(move || windows_impl::find_by_image_name(&image))
                .await
                .map_err(|e| DomainError::OsApplyFailure {
                    what: "process enumeration".to_string(),
                    reason: format!("task failed: {}", e),
                })?
        }

        #[cfg(not(any(target_os = "linux", windows)))]
        {
            let _ = image;
            Ok(Vec::new())
        }
    }
}

/// Monitor the child for exit on a blocking thread; the handle resolves with
/// the exit code once the OS reports termination
fn create_exit_handle(mut child: std::process::Child, pid: u32) -> ProcessExitHandle {
    let (tx, rx) = tokio::sync::oneshot::channel();

    tokio::task::spawn_blocking(move || {
        let result = match child.wait() {
            Ok(status) => {
                let exit_code = exit_code_from_status(status);
                debug!(pid = pid, exit_code = exit_code, "Process exited");
                Ok(exit_code)
            }
            Err(e) => {
                error!(pid = pid, error = %e, "Failed to wait for process");
                Err(DomainError::SpawnFailed(format!(
                    "failed to wait for process: {}",
                    e
                )))
            }
        };
        let _ = tx.send(result);
    });

    let exit_fut = async move {
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(DomainError::SpawnFailed(
                "process monitor task died unexpectedly".to_string(),
            )),
        }
    };
    Box::pin(exit_fut) as ProcessExitHandle
}

#[cfg(unix)]
fn exit_code_from_status(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    // Signal deaths are folded into the 128+n convention
    status
        .code()
        .or_else(|| status.signal().map(|sig| 128 + sig))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code_from_status(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}

#[cfg(unix)]
fn send_signal(pid: u32, signal: i32) -> Result<(), DomainError> {
    let rc = unsafe { libc::kill(pid as libc::pid_t, signal) };
    if rc != 0 {
        let err = std::io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Err(DomainError::ProcessNotFound(pid.to_string()));
        }
        return Err(DomainError::OsApplyFailure {
            what: format!("signal {}", signal),
            reason: err.to_string(),
        });
    }
    Ok(())
}

#[cfg(unix)]
fn unix_niceness(priority: PriorityClass) -> i32 {
    match priority {
        PriorityClass::Idle => 19,
        PriorityClass::BelowNormal => 10,
        PriorityClass::Normal => 0,
        PriorityClass::AboveNormal => -5,
        PriorityClass::High => -10,
        PriorityClass::Realtime => -20,
    }
}

/// Enumerate pids whose comm matches the image name
///
/// `/proc/<pid>/comm` truncates to 15 bytes, so a truncated comm is matched
/// as a prefix of the wanted name.
#[cfg(target_os = "linux")]
fn scan_proc(image_name: &str) -> Result<Vec<u32>, DomainError> {
    let entries = std::fs::read_dir("/proc").map_err(|e| DomainError::OsApplyFailure {
        what: "process enumeration".to_string(),
        reason: e.to_string(),
    })?;

    let mut pids = Vec::new();
    for entry in entries.flatten() {
        let file_name = entry.file_name();
        let Ok(pid) = file_name.to_string_lossy().parse::<u32>() else {
            continue;
        };
        let comm = match std::fs::read_to_string(entry.path().join("comm")) {
            Ok(c) => c.trim().to_string(),
            Err(_) => continue,
        };
        if comm == image_name || (comm.len() == 15 && image_name.starts_with(&comm)) {
            pids.push(pid);
        }
    }
    pids.sort_unstable();
    Ok(pids)
}

// ============================================================================
// Windows-Specific Implementation
// ============================================================================

#[cfg(windows)]
mod windows_impl {
    use super::*;
    use windows::Win32::Foundation::{CloseHandle, HANDLE, WAIT_TIMEOUT};
    use windows::Win32::System::Console::{
        AttachConsole, FreeConsole, GenerateConsoleCtrlEvent, SetConsoleCtrlHandler, CTRL_C_EVENT,
    };
    use windows::Win32::System::ProcessStatus::EnumProcesses;
    use windows::Win32::System::Threading::{
        OpenProcess, QueryFullProcessImageNameW, SetPriorityClass, SetProcessAffinityMask,
        WaitForSingleObject, ABOVE_NORMAL_PRIORITY_CLASS, BELOW_NORMAL_PRIORITY_CLASS,
        HIGH_PRIORITY_CLASS, IDLE_PRIORITY_CLASS, NORMAL_PRIORITY_CLASS,
        PROCESS_NAME_WIN32, PROCESS_QUERY_INFORMATION, PROCESS_QUERY_LIMITED_INFORMATION,
        PROCESS_SET_INFORMATION, PROCESS_SYNCHRONIZE, PROCESS_TERMINATE,
        REALTIME_PRIORITY_CLASS,
    };

    fn open(pid: u32, access: windows::Win32::System::Threading::PROCESS_ACCESS_RIGHTS)
        -> Result<HANDLE, DomainError>
    {
        unsafe {
            OpenProcess(access, false, pid).map_err(|e| DomainError::OsApplyFailure {
                what: "process open".to_string(),
                reason: format!("pid {}: {}", pid, e),
            })
        }
    }

    pub(super) fn set_priority(pid: u32, priority: PriorityClass) -> Result<(), DomainError> {
        let class = match priority {
            PriorityClass::Idle => IDLE_PRIORITY_CLASS,
            PriorityClass::BelowNormal => BELOW_NORMAL_PRIORITY_CLASS,
            PriorityClass::Normal => NORMAL_PRIORITY_CLASS,
            PriorityClass::AboveNormal => ABOVE_NORMAL_PRIORITY_CLASS,
            PriorityClass::High => HIGH_PRIORITY_CLASS,
            PriorityClass::Realtime => REALTIME_PRIORITY_CLASS,
        };

        unsafe {
            let process = open(pid, PROCESS_SET_INFORMATION)?;
            let result = SetPriorityClass(process, class);
            let _ = CloseHandle(process);
            result.map_err(|e| DomainError::OsApplyFailure {
                what: "priority class".to_string(),
                reason: e.to_string(),
            })
        }
    }

    pub(super) fn set_affinity(pid: u32, mask: AffinityMask) -> Result<(), DomainError> {
        unsafe {
            let process = open(pid, PROCESS_SET_INFORMATION | PROCESS_QUERY_INFORMATION)?;
            let result = SetProcessAffinityMask(process, mask.bits() as usize);
            let _ = CloseHandle(process);
            result.map_err(|e| DomainError::OsApplyFailure {
                what: "CPU affinity".to_string(),
                reason: e.to_string(),
            })
        }
    }

    /// Attach to the target's console, raise ctrl-C there, then detach.
    /// The handler suppression keeps the event from also stopping us.
    pub(super) fn send_ctrl_event(pid: u32) -> Result<(), DomainError> {
        unsafe {
            let _ = FreeConsole();
            if let Err(e) = AttachConsole(pid) {
                return Err(DomainError::OsApplyFailure {
                    what: "console attach".to_string(),
                    reason: format!("pid {}: {}", pid, e),
                });
            }
            let _ = SetConsoleCtrlHandler(None, true);
            let result = GenerateConsoleCtrlEvent(CTRL_C_EVENT, 0);
            let _ = FreeConsole();
            let _ = SetConsoleCtrlHandler(None, false);
            result.map_err(|e| DomainError::OsApplyFailure {
                what: "console ctrl event".to_string(),
                reason: e.to_string(),
            })
        }
    }

    pub(super) fn terminate(pid: u32) -> Result<(), DomainError> {
        use windows::Win32::System::Threading::TerminateProcess;

        unsafe {
            let process = open(pid, PROCESS_TERMINATE)?;
            let result = TerminateProcess(process, 1);
            let _ = CloseHandle(process);
            result.map_err(|e| DomainError::OsApplyFailure {
                what: "terminate".to_string(),
                reason: e.to_string(),
            })
        }
    }

    pub(super) fn is_running(pid: u32) -> Result<bool, DomainError> {
        unsafe {
            let process = match OpenProcess(PROCESS_SYNCHRONIZE, false, pid) {
                Ok(h) => h,
                Err(_) => return Ok(false),
            };
            let result = WaitForSingleObject(process, 0);
            let _ = CloseHandle(process);
            Ok(result == WAIT_TIMEOUT)
        }
    }

    pub(super) fn find_by_image_name(image_name: &str) -> Result<Vec<u32>, DomainError> {
        let wanted = image_name.to_lowercase();
        let mut pids = vec![0u32; 4096];
        let mut returned: u32 = 0;

        unsafe {
            EnumProcesses(
                pids.as_mut_ptr(),
                (pids.len() * std::mem::size_of::<u32>()) as u32,
                &mut returned,
            )
            .map_err(|e| DomainError::OsApplyFailure {
                what: "process enumeration".to_string(),
                reason: e.to_string(),
            })?;
        }

        let count = returned as usize / std::mem::size_of::<u32>();
        let mut matches = Vec::new();
        for &pid in &pids[..count] {
            if pid == 0 {
                continue;
            }
            if let Some(name) = query_image_stem(pid) {
                if name.to_lowercase() == wanted {
                    matches.push(pid);
                }
            }
        }
        matches.sort_unstable();
        Ok(matches)
    }

    /// Executable file stem of a process, or None if it cannot be queried
    fn query_image_stem(pid: u32) -> Option<String> {
        unsafe {
            let process = OpenProcess(PROCESS_QUERY_LIMITED_INFORMATION, false, pid).ok()?;
            let mut buf = [0u16; 1024];
            let mut len = buf.len() as u32;
            let result = QueryFullProcessImageNameW(
                process,
                PROCESS_NAME_WIN32,
                windows::core::PWSTR(buf.as_mut_ptr()),
                &mut len,
            );
            let _ = CloseHandle(process);
            result.ok()?;

            let path = String::from_utf16_lossy(&buf[..len as usize]);
            std::path::Path::new(&path)
                .file_stem()
                .map(|s| s.to_string_lossy().to_string())
        }
    }
}
