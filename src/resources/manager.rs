/*!
 * Resource Group Manager
 * Platform-aware orchestration of resource-control subsystems
 */

use super::cgroupfs::CgroupFsProvider;
use super::simulation::SimulationResourceProvider;
use super::traits::*;
use super::types::*;
use crate::core::types::Pid;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Unified resource group manager that selects the appropriate provider.
///
/// Subsystem availability is probed once at construction; joins of a
/// subsystem outside that set fail with `NotFound` without touching the host.
#[derive(Clone)]
pub struct ResourceGroupManager {
    provider: ResourceProviderImpl,
    capabilities: Arc<CapabilitySet>,
}

/// Provider implementations
#[derive(Clone)]
enum ResourceProviderImpl {
    CgroupFs(CgroupFsProvider),
    Simulation(SimulationResourceProvider),
    Custom(Arc<dyn ResourceGroupProvider>),
}

impl ResourceProviderImpl {
    fn as_provider(&self) -> &dyn ResourceGroupProvider {
        match self {
            ResourceProviderImpl::CgroupFs(p) => p,
            ResourceProviderImpl::Simulation(p) => p,
            ResourceProviderImpl::Custom(p) => p.as_ref(),
        }
    }
}

impl ResourceGroupManager {
    /// Auto-detect: host cgroup filesystem when present, simulation otherwise
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        let cgroupfs = CgroupFsProvider::new(root, prefix);
        if cfg!(target_os = "linux") && cgroupfs.is_available() {
            return Self::from_impl(ResourceProviderImpl::CgroupFs(cgroupfs));
        }
        Self::with_simulation(SimulationResourceProvider::new())
    }

    /// Force the host cgroup filesystem provider
    pub fn with_cgroupfs(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self::from_impl(ResourceProviderImpl::CgroupFs(CgroupFsProvider::new(
            root, prefix,
        )))
    }

    /// Use an in-memory provider (shared with the caller through `Clone`)
    pub fn with_simulation(provider: SimulationResourceProvider) -> Self {
        Self::from_impl(ResourceProviderImpl::Simulation(provider))
    }

    /// Use a caller-supplied provider
    pub fn with_provider(provider: Arc<dyn ResourceGroupProvider>) -> Self {
        Self::from_impl(ResourceProviderImpl::Custom(provider))
    }

    fn from_impl(provider: ResourceProviderImpl) -> Self {
        let capabilities = provider.as_provider().discover();
        info!(
            platform = ?provider.as_provider().platform(),
            subsystems = ?capabilities.names().map(|n| n.as_str()).collect::<Vec<_>>(),
            "Resource group manager initialized"
        );
        Self {
            provider,
            capabilities: Arc::new(capabilities),
        }
    }

    /// Get the current platform type
    pub fn platform(&self) -> ResourcePlatform {
        self.provider.as_provider().platform()
    }

    /// Subsystems discovered at startup
    pub fn capabilities(&self) -> &CapabilitySet {
        &self.capabilities
    }

    /// Join `target` to one subsystem
    pub fn join_subsystem(
        &self,
        name: &SubsystemName,
        target: &JoinTarget,
    ) -> ResourceResult<GroupHandle> {
        if !self.capabilities.supports(name) {
            return Err(ResourceError::NotFound(name.to_string()));
        }
        self.provider.as_provider().join_subsystem(name, target)
    }

    /// Join every subsystem in `specs`.
    ///
    /// Absent optional subsystems are skipped. Absent required subsystems
    /// and any other failure release what was already joined and return
    /// the error.
    pub fn join_all(
        &self,
        specs: &[SubsystemSpec],
        target: &JoinTarget,
    ) -> ResourceResult<HashMap<SubsystemName, GroupHandle>> {
        let mut joined = HashMap::with_capacity(specs.len());

        for spec in specs {
            match self.join_subsystem(&spec.name, target) {
                Ok(handle) => {
                    joined.insert(spec.name.clone(), handle);
                }
                Err(e) if e.is_not_found() && !spec.required => {
                    debug!(subsystem = %spec.name, "Optional subsystem absent, skipping");
                }
                Err(e) => {
                    warn!(subsystem = %spec.name, error = %e, "Subsystem join failed, rolling back");
                    for handle in joined.values() {
                        if let Err(release_err) = self.release(handle) {
                            warn!(group = %handle.key(), error = %release_err, "Rollback release failed");
                        }
                    }
                    return Err(e);
                }
            }
        }

        Ok(joined)
    }

    /// Move a process into a joined group
    pub fn attach_process(&self, handle: &GroupHandle, pid: Pid) -> ResourceResult<()> {
        self.provider.as_provider().attach_process(handle, pid)
    }

    /// Freeze or thaw a freezer group
    pub fn set_freeze_state(&self, handle: &GroupHandle, state: FreezeState) -> ResourceResult<()> {
        self.provider.as_provider().set_freeze_state(handle, state)
    }

    /// Release a group; already-gone groups succeed
    pub fn release(&self, handle: &GroupHandle) -> ResourceResult<()> {
        self.provider.as_provider().release(handle)
    }
}
