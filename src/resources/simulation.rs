/*!
 * Simulation Resource Groups
 * In-memory groups for hosts without cgroups, and for tests
 */

use super::traits::*;
use super::types::*;
use crate::core::types::Pid;
use dashmap::DashMap;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone)]
struct SimulatedGroup {
    members: Vec<Pid>,
    freeze: FreezeState,
}

/// Simulation-based resource group provider
/// Tracks group membership without touching the host
pub struct SimulationResourceProvider {
    available: Arc<HashSet<SubsystemName>>,
    failures: Arc<DashMap<SubsystemName, ResourceError>>,
    groups: Arc<DashMap<String, SimulatedGroup>>,
}

impl SimulationResourceProvider {
    /// Provider exposing the given subsystems
    pub fn with_subsystems<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let available: HashSet<SubsystemName> =
            names.into_iter().map(SubsystemName::new).collect();
        info!(count = available.len(), "Resource group manager initialized (simulation mode)");
        Self {
            available: Arc::new(available),
            failures: Arc::new(DashMap::new()),
            groups: Arc::new(DashMap::new()),
        }
    }

    /// Provider exposing freezer, memory and cpu
    pub fn new() -> Self {
        Self::with_subsystems([
            crate::core::limits::FREEZER_SUBSYSTEM,
            crate::core::limits::MEMORY_SUBSYSTEM,
            crate::core::limits::CPU_SUBSYSTEM,
        ])
    }

    /// Make every join of `name` fail with `err`
    pub fn fail_joins(&self, name: impl Into<String>, err: ResourceError) {
        self.failures.insert(SubsystemName::new(name), err);
    }

    /// Current freezer state of a group, if it exists
    pub fn freeze_state(&self, handle: &GroupHandle) -> Option<FreezeState> {
        self.groups.get(&handle.key()).map(|g| g.freeze)
    }

    /// Processes attached to a group
    pub fn members(&self, handle: &GroupHandle) -> Vec<Pid> {
        self.groups
            .get(&handle.key())
            .map(|g| g.members.clone())
            .unwrap_or_default()
    }

    /// Whether the group is still held
    pub fn is_joined(&self, handle: &GroupHandle) -> bool {
        self.groups.contains_key(&handle.key())
    }

    /// Number of live groups across all subsystems
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}

impl Default for SimulationResourceProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceGroupProvider for SimulationResourceProvider {
    fn discover(&self) -> CapabilitySet {
        CapabilitySet::new(self.available.iter().map(|n| n.as_str().to_string()))
    }

    fn join_subsystem(
        &self,
        name: &SubsystemName,
        target: &JoinTarget,
    ) -> ResourceResult<GroupHandle> {
        if let Some(err) = self.failures.get(name) {
            return Err(err.value().clone());
        }
        if !self.available.contains(name) {
            return Err(ResourceError::NotFound(name.to_string()));
        }

        let handle = GroupHandle {
            subsystem: name.clone(),
            group: target.group_name(),
            path: None,
        };
        let members = match target {
            JoinTarget::Process(pid) => vec![*pid],
            JoinTarget::Group(_) => Vec::new(),
        };
        self.groups.entry(handle.key()).or_insert(SimulatedGroup {
            members,
            freeze: FreezeState::Thawed,
        });

        debug!(group = %handle.key(), "Joined simulated subsystem");
        Ok(handle)
    }

    fn attach_process(&self, handle: &GroupHandle, pid: Pid) -> ResourceResult<()> {
        let mut group = self
            .groups
            .get_mut(&handle.key())
            .ok_or_else(|| ResourceError::IoError(format!("group {} is gone", handle.key())))?;
        if !group.members.contains(&pid) {
            group.members.push(pid);
        }
        Ok(())
    }

    fn set_freeze_state(&self, handle: &GroupHandle, state: FreezeState) -> ResourceResult<()> {
        let mut group = self
            .groups
            .get_mut(&handle.key())
            .ok_or_else(|| ResourceError::IoError(format!("group {} is gone", handle.key())))?;
        group.freeze = state;
        Ok(())
    }

    fn release(&self, handle: &GroupHandle) -> ResourceResult<()> {
        if self.groups.remove(&handle.key()).is_some() {
            debug!(group = %handle.key(), "Released simulated group");
        }
        Ok(())
    }

    fn platform(&self) -> ResourcePlatform {
        ResourcePlatform::Simulation
    }
}

impl Clone for SimulationResourceProvider {
    fn clone(&self) -> Self {
        Self {
            available: Arc::clone(&self.available),
            failures: Arc::clone(&self.failures),
            groups: Arc::clone(&self.groups),
        }
    }
}
