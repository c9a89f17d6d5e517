/*!
 * Sandbox Traits
 * Capability sets exposed to supervising code
 */

use super::sandbox::Sandbox;
use super::types::*;
use crate::core::types::SandboxId;
use crate::exec::{ExecOutcome, ExecRequest};
use crate::network::InterfaceRef;
use std::future::Future;
use std::sync::Arc;

/// Sandbox registry lifecycle
pub trait SandboxLifecycle: Send + Sync {
    /// Ids of every live sandbox
    fn list(&self) -> Vec<SandboxId>;

    /// Look up a live sandbox
    fn get(&self, id: &SandboxId) -> SandboxResult<Arc<Sandbox>>;

    /// Create and register a sandbox
    fn create(&self) -> SandboxResult<SandboxId>;

    /// Tear down and unregister a sandbox
    fn remove(&self, id: &SandboxId) -> impl Future<Output = SandboxResult<()>> + Send;
}

/// Operations on one sandbox
pub trait SandboxOps: Send + Sync {
    /// Run a command inside the sandbox
    fn exec(&self, req: ExecRequest) -> impl Future<Output = SandboxResult<ExecOutcome>> + Send;

    /// Move a host interface into the sandbox
    fn add_net_iface(&self, iface: InterfaceRef) -> impl Future<Output = SandboxResult<()>> + Send;
}
