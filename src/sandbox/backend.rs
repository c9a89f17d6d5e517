/*!
 * Sandbox Backend
 * The four collaborators a controller runs on, chosen once at construction
 */

use crate::config::{BackendKind, ControllerConfig};
use crate::exec::{CommandLauncher, HostLauncher, SimulationLauncher};
use crate::network::{NetlinkAttacher, NetworkAttacher, SimulationNetwork};
use crate::oom::{OomSource, SimulationOomSource};
use crate::resources::{CgroupFsProvider, ResourceGroupManager, SimulationResourceProvider};
use tracing::info;

/// Resource, OOM, network and exec collaborators
#[derive(Clone)]
pub struct Backend {
    pub resources: ResourceGroupManager,
    pub oom: OomSource,
    pub network: NetworkAttacher,
    pub launcher: CommandLauncher,
}

impl Backend {
    /// Host collaborators: cgroup filesystem, polled OOM counters, rtnetlink, real processes
    pub fn host(config: &ControllerConfig) -> Self {
        Self {
            resources: ResourceGroupManager::with_cgroupfs(
                &config.cgroup_root,
                config.group_prefix.clone(),
            ),
            oom: OomSource::cgroupfs(config.oom_poll_interval()),
            network: NetworkAttacher::Netlink(NetlinkAttacher::new()),
            launcher: CommandLauncher::Host(HostLauncher::new()),
        }
    }

    /// Select collaborators from `config.backend`
    pub fn from_config(config: &ControllerConfig) -> Self {
        let kind = match config.backend {
            BackendKind::Auto => {
                let probe = CgroupFsProvider::new(&config.cgroup_root, config.group_prefix.clone());
                if cfg!(target_os = "linux") && probe.is_available() {
                    BackendKind::Host
                } else {
                    BackendKind::Simulation
                }
            }
            kind => kind,
        };

        info!(requested = ?config.backend, selected = ?kind, "Selecting sandbox backend");
        match kind {
            BackendKind::Host => Self::host(config),
            _ => SimulationBackend::new().backend(),
        }
    }

    /// Replace the resource group manager, keeping the other collaborators
    pub fn with_resources(mut self, resources: ResourceGroupManager) -> Self {
        self.resources = resources;
        self
    }
}

/// In-memory collaborators, kept by the caller for inspection and fault injection
#[derive(Clone, Default)]
pub struct SimulationBackend {
    pub resources: SimulationResourceProvider,
    pub oom: SimulationOomSource,
    pub network: SimulationNetwork,
    pub launcher: SimulationLauncher,
}

impl SimulationBackend {
    /// Freezer, memory and cpu available
    pub fn new() -> Self {
        Self::default()
    }

    /// Only the named subsystems available
    pub fn with_subsystems<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            resources: SimulationResourceProvider::with_subsystems(names),
            ..Self::default()
        }
    }

    /// Backend sharing state with this handle
    pub fn backend(&self) -> Backend {
        Backend {
            resources: ResourceGroupManager::with_simulation(self.resources.clone()),
            oom: OomSource::simulation(self.oom.clone()),
            network: NetworkAttacher::Simulation(self.network.clone()),
            launcher: CommandLauncher::Simulation(self.launcher.clone()),
        }
    }
}
