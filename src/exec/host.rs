/*!
 * Host Command Launcher
 * Spawns real processes inside a sandbox's network namespace
 */

use super::process::LaunchedProcess;
use super::types::*;
use crate::core::types::Pid;
use std::process::Stdio;
use tracing::{debug, info};

#[cfg(target_os = "linux")]
use nix::sched::{setns, CloneFlags};
#[cfg(target_os = "linux")]
use nix::sys::signal::{kill, Signal};
#[cfg(target_os = "linux")]
use nix::unistd::Pid as NixPid;

/// Launcher backed by `tokio::process`
#[derive(Debug, Clone, Default)]
pub struct HostLauncher;

impl HostLauncher {
    pub fn new() -> Self {
        Self
    }

    /// Spawn `req` with exactly its environment; the child enters the
    /// sandbox network namespace when one is bound
    #[cfg(target_os = "linux")]
    pub fn launch(&self, ctx: &ExecContext<'_>, req: &ExecRequest) -> ExecResult<LaunchedProcess> {
        let spawn_err = |reason: String| ExecError::SpawnFailed {
            command: req.command.clone(),
            reason,
        };

        let mut cmd = tokio::process::Command::new(&req.command);
        cmd.args(&req.args)
            .env_clear()
            .envs(req.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(false);

        if ctx.netns.exists() {
            let ns_file = std::fs::File::open(ctx.netns)
                .map_err(|e| spawn_err(format!("cannot open {}: {}", ctx.netns.display(), e)))?;
            // SAFETY: the hook only calls setns(2), which is async-signal-safe
            unsafe {
                cmd.pre_exec(move || {
                    setns(&ns_file, CloneFlags::CLONE_NEWNET).map_err(std::io::Error::from)
                });
            }
        }

        let child = cmd.spawn().map_err(|e| spawn_err(e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| spawn_err("process exited before its pid was read".to_string()))?;

        info!(sandbox = %ctx.sandbox, pid, command = %req.command, "Process launched");
        Ok(LaunchedProcess::host(pid, child))
    }

    #[cfg(not(target_os = "linux"))]
    pub fn launch(&self, _ctx: &ExecContext<'_>, _req: &ExecRequest) -> ExecResult<LaunchedProcess> {
        Err(ExecError::PlatformNotSupported(
            "Sandboxed exec requires Linux".to_string(),
        ))
    }

    /// SIGKILL a detached process; already-exited processes succeed
    #[cfg(target_os = "linux")]
    pub fn terminate(&self, pid: Pid) -> ExecResult<()> {
        let raw = i32::try_from(pid).map_err(|_| ExecError::SignalFailed {
            pid,
            reason: "pid out of range".to_string(),
        })?;
        match kill(NixPid::from_raw(raw), Signal::SIGKILL) {
            Ok(()) => {
                debug!(pid, "Process killed");
                Ok(())
            }
            Err(nix::errno::Errno::ESRCH) => Ok(()),
            Err(e) => Err(ExecError::SignalFailed {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    #[cfg(not(target_os = "linux"))]
    pub fn terminate(&self, _pid: Pid) -> ExecResult<()> {
        Err(ExecError::PlatformNotSupported(
            "Process termination requires Linux".to_string(),
        ))
    }
}
