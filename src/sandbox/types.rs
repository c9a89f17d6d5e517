/*!
 * Sandbox Types
 * Lifecycle states, snapshots, and errors shared by sandboxes and the controller
 */

use crate::core::types::SandboxId;
use crate::exec::ExecError;
use crate::network::NetworkError;
use crate::oom::OomError;
use crate::resources::ResourceError;
use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;

/// Result type for sandbox operations
pub type SandboxResult<T> = Result<T, SandboxError>;

/// Sandbox lifecycle state.
///
/// Transitions only move forward, except `Frozen -> Running`. `Removed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxState {
    Created,
    Running,
    Frozen,
    Removed,
}

impl SandboxState {
    pub fn is_removed(&self) -> bool {
        matches!(self, SandboxState::Removed)
    }
}

impl std::fmt::Display for SandboxState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SandboxState::Created => "created",
            SandboxState::Running => "running",
            SandboxState::Frozen => "frozen",
            SandboxState::Removed => "removed",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of a sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SandboxInfo {
    pub id: SandboxId,
    pub state: SandboxState,
    pub interfaces: Vec<String>,
    pub subsystems: Vec<String>,
    pub subscribers: usize,
    pub processes: usize,
    pub created_at: SystemTime,
}

/// Registry counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerStats {
    pub created: u64,
    pub removed: u64,
    pub active: usize,
}

/// Sandbox errors with serialization support
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Diagnostic)]
#[serde(tag = "error_type", content = "details", rename_all = "snake_case")]
pub enum SandboxError {
    #[error("Sandbox {0} not found")]
    #[diagnostic(
        code(sandbox::not_found),
        help("The sandbox was removed or never existed. List sandboxes to check the id.")
    )]
    NotFound(SandboxId),

    #[error("Sandbox {id} is {state}")]
    #[diagnostic(
        code(sandbox::invalid_state),
        help("Operation cannot be performed in the current sandbox state.")
    )]
    InvalidState { id: SandboxId, state: SandboxState },

    #[error("Sandbox {0} is frozen")]
    #[diagnostic(code(sandbox::frozen), help("Thaw the sandbox before running commands."))]
    FrozenState(SandboxId),

    #[error("Failed to create sandbox: {0}")]
    #[diagnostic(
        code(sandbox::creation_failed),
        help("A required subsystem is missing or the resource hierarchy rejected the join.")
    )]
    Creation(String),

    #[error("Failed to join subsystem: {0}")]
    #[diagnostic(code(sandbox::join_failed))]
    Join(String),

    #[error("Failed to open OOM stream: {0}")]
    #[diagnostic(
        code(sandbox::oom_open_failed),
        help("OOM events need the memory subsystem joined with notifications available.")
    )]
    Open(String),

    #[error("Failed to attach interface: {0}")]
    #[diagnostic(code(sandbox::attach_failed))]
    Attach(String),

    #[error("Failed to execute command: {0}")]
    #[diagnostic(code(sandbox::exec_failed))]
    Exec(String),

    #[error("Resource operation failed: {0}")]
    #[diagnostic(code(sandbox::resource_failed))]
    Resource(String),
}

impl From<ResourceError> for SandboxError {
    fn from(err: ResourceError) -> Self {
        SandboxError::Resource(err.to_string())
    }
}

impl From<OomError> for SandboxError {
    fn from(err: OomError) -> Self {
        SandboxError::Open(err.to_string())
    }
}

impl From<NetworkError> for SandboxError {
    fn from(err: NetworkError) -> Self {
        SandboxError::Attach(err.to_string())
    }
}

impl From<ExecError> for SandboxError {
    fn from(err: ExecError) -> Self {
        SandboxError::Exec(err.to_string())
    }
}
