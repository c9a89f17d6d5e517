/*!
 * Simulation Command Launcher
 * Hands out synthetic pids and records every launch
 */

use super::process::LaunchedProcess;
use super::types::*;
use crate::core::types::Pid;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tracing::debug;

/// First synthetic pid, well above anything a test host hands out
const FIRST_SIMULATED_PID: Pid = 100_000;

/// Simulation-based launcher
#[derive(Clone)]
pub struct SimulationLauncher {
    next_pid: Arc<AtomicU32>,
    launches: Arc<Mutex<Vec<(Pid, ExecRequest)>>>,
    terminated: Arc<Mutex<Vec<Pid>>>,
    failures: Arc<DashMap<String, ExecError>>,
    exit_codes: Arc<DashMap<String, i32>>,
}

impl SimulationLauncher {
    pub fn new() -> Self {
        Self {
            next_pid: Arc::new(AtomicU32::new(FIRST_SIMULATED_PID)),
            launches: Arc::new(Mutex::new(Vec::new())),
            terminated: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(DashMap::new()),
            exit_codes: Arc::new(DashMap::new()),
        }
    }

    /// Make launching `command` fail with `err`
    pub fn fail_command(&self, command: impl Into<String>, err: ExecError) {
        self.failures.insert(command.into(), err);
    }

    /// Exit code reported when `command` is waited on (default 0)
    pub fn set_exit_code(&self, command: impl Into<String>, code: i32) {
        self.exit_codes.insert(command.into(), code);
    }

    /// Every successful launch so far
    pub fn launches(&self) -> Vec<(Pid, ExecRequest)> {
        self.launches.lock().clone()
    }

    /// Pids killed by sandbox teardown
    pub fn terminated(&self) -> Vec<Pid> {
        self.terminated.lock().clone()
    }

    pub fn launch(&self, ctx: &ExecContext<'_>, req: &ExecRequest) -> ExecResult<LaunchedProcess> {
        if let Some(err) = self.failures.get(&req.command) {
            return Err(err.value().clone());
        }

        let pid = self.next_pid.fetch_add(1, Ordering::SeqCst);
        self.launches.lock().push((pid, req.clone()));

        let exit_code = self.exit_codes.get(&req.command).map(|c| *c).unwrap_or(0);
        debug!(sandbox = %ctx.sandbox, pid, command = %req.command, "Simulated launch");
        Ok(LaunchedProcess::simulated(pid, exit_code))
    }

    pub fn terminate(&self, pid: Pid) -> ExecResult<()> {
        self.terminated.lock().push(pid);
        Ok(())
    }
}

impl Default for SimulationLauncher {
    fn default() -> Self {
        Self::new()
    }
}
