/*!
 * Resource Group Traits
 * Platform-agnostic abstractions for resource-control subsystems
 */

use super::types::*;
use crate::core::types::Pid;

/// Host mechanism that can place processes into resource-control groups
pub trait ResourceGroupProvider: Send + Sync {
    /// Subsystems this host offers, probed once at startup
    fn discover(&self) -> CapabilitySet;

    /// Join `target` to the subsystem `name`.
    ///
    /// Returns `ResourceError::NotFound` only when the subsystem itself is
    /// absent; every other failure uses a different variant.
    fn join_subsystem(&self, name: &SubsystemName, target: &JoinTarget)
        -> ResourceResult<GroupHandle>;

    /// Move a process into an already joined group
    fn attach_process(&self, handle: &GroupHandle, pid: Pid) -> ResourceResult<()>;

    /// Write a freezer state to a freezer group
    fn set_freeze_state(&self, handle: &GroupHandle, state: FreezeState) -> ResourceResult<()>;

    /// Remove the group. Succeeds if the group is already gone.
    fn release(&self, handle: &GroupHandle) -> ResourceResult<()>;

    /// Get the platform type
    fn platform(&self) -> ResourcePlatform;
}
