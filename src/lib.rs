/*!
 * Sandbox Controller Library
 * Creates, tracks, and tears down isolated execution environments
 */

pub mod config;
pub mod core;
pub mod exec;
pub mod monitoring;
pub mod network;
pub mod oom;
pub mod resources;
pub mod sandbox;

// Re-exports
pub use config::{BackendKind, ConfigError, ControllerConfig};
pub use crate::core::types::{Pid, SandboxId};
pub use exec::{ExecMode, ExecOutcome, ExecRequest};
pub use monitoring::init_tracing;
pub use network::InterfaceRef;
pub use oom::{OomEvent, OomSubscription};
pub use resources::{CapabilitySet, SubsystemName, SubsystemSpec};
pub use sandbox::{
    Backend, ControllerStats, Sandbox, SandboxController, SandboxError, SandboxInfo,
    SandboxLifecycle, SandboxOps, SandboxResult, SandboxState, SimulationBackend,
};
