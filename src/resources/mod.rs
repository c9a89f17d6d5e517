/*!
 * Resource Group Module
 * Joins sandboxes to resource-control subsystems, tolerating subsystems
 * the host does not offer
 */

mod cgroupfs;
mod manager;
mod simulation;
mod traits;
mod types;

pub use cgroupfs::CgroupFsProvider;
pub use manager::ResourceGroupManager;
pub use simulation::SimulationResourceProvider;
pub use traits::*;
pub use types::*;
