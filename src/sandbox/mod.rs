/*!
 * Sandbox Module
 * Sandbox entities and the controller that owns them
 */

mod backend;
mod controller;
#[allow(clippy::module_inception)]
mod sandbox;
mod traits;
mod types;

pub use backend::{Backend, SimulationBackend};
pub use controller::SandboxController;
pub use sandbox::Sandbox;
pub use traits::{SandboxLifecycle, SandboxOps};
pub use types::*;
