/*!
 * Launched Process
 * A started process that is either waited on or left running
 */

use super::types::*;
use crate::core::types::Pid;
use tracing::{debug, warn};

enum ProcessInner {
    Host(tokio::process::Child),
    Simulated { exit_code: i32 },
}

/// Process started by a launcher, not yet waited on or detached
pub struct LaunchedProcess {
    pid: Pid,
    inner: ProcessInner,
}

impl LaunchedProcess {
    pub(crate) fn host(pid: Pid, child: tokio::process::Child) -> Self {
        Self {
            pid,
            inner: ProcessInner::Host(child),
        }
    }

    pub(crate) fn simulated(pid: Pid, exit_code: i32) -> Self {
        Self {
            pid,
            inner: ProcessInner::Simulated { exit_code },
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Run to completion and return the exit code (-1 if killed by a signal)
    pub async fn wait(self) -> ExecResult<i32> {
        match self.inner {
            ProcessInner::Host(mut child) => {
                let status = child.wait().await.map_err(|e| ExecError::WaitFailed {
                    pid: self.pid,
                    reason: e.to_string(),
                })?;
                Ok(status.code().unwrap_or(-1))
            }
            ProcessInner::Simulated { exit_code } => Ok(exit_code),
        }
    }

    /// Leave the process running. A background task reaps it and calls
    /// `on_exit` once the pid is no longer valid. Simulated processes never
    /// exit on their own.
    pub fn detach<F>(self, on_exit: F)
    where
        F: FnOnce(Pid) + Send + 'static,
    {
        let pid = self.pid;
        if let ProcessInner::Host(mut child) = self.inner {
            tokio::spawn(async move {
                match child.wait().await {
                    Ok(status) => debug!(pid, code = ?status.code(), "Detached process exited"),
                    Err(e) => warn!(pid, error = %e, "Failed to reap detached process"),
                }
                on_exit(pid);
            });
        }
    }

    /// Kill the process before it was handed out
    pub async fn kill(self) {
        if let ProcessInner::Host(mut child) = self.inner {
            if let Err(e) = child.kill().await {
                warn!(pid = self.pid, error = %e, "Failed to kill process");
            }
        }
    }
}

impl std::fmt::Debug for LaunchedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("LaunchedProcess").field("pid", &self.pid).finish()
    }
}
