/*!
 * Exec Module
 * Launches commands inside a sandbox's isolation boundary
 */

mod host;
mod process;
mod simulation;
mod types;

pub use host::HostLauncher;
pub use process::LaunchedProcess;
pub use simulation::SimulationLauncher;
pub use types::*;

use crate::core::types::Pid;

/// Launcher chosen at construction
#[derive(Clone)]
pub enum CommandLauncher {
    Host(HostLauncher),
    Simulation(SimulationLauncher),
}

impl CommandLauncher {
    /// Start `req`; the caller confines, then waits on or detaches the result
    pub fn launch(&self, ctx: &ExecContext<'_>, req: &ExecRequest) -> ExecResult<LaunchedProcess> {
        match self {
            CommandLauncher::Host(l) => l.launch(ctx, req),
            CommandLauncher::Simulation(l) => l.launch(ctx, req),
        }
    }

    /// Kill a process previously launched and detached
    pub fn terminate(&self, pid: Pid) -> ExecResult<()> {
        match self {
            CommandLauncher::Host(l) => l.terminate(pid),
            CommandLauncher::Simulation(l) => l.terminate(pid),
        }
    }
}
