/*!
 * Network Attachment Module
 * Hands host interfaces to a sandbox's isolated network view
 */

mod netlink;
mod simulation;
mod types;

pub use netlink::NetlinkAttacher;
pub use simulation::SimulationNetwork;
pub use types::*;

use std::path::Path;

/// Interface attacher chosen at construction
#[derive(Clone)]
pub enum NetworkAttacher {
    Netlink(NetlinkAttacher),
    Simulation(SimulationNetwork),
}

impl NetworkAttacher {
    pub fn platform(&self) -> NetworkPlatform {
        match self {
            NetworkAttacher::Netlink(_) => NetworkPlatform::Netlink,
            NetworkAttacher::Simulation(_) => NetworkPlatform::Simulation,
        }
    }

    /// Move `iface` into the namespace at `netns`
    pub async fn attach(&self, netns: &Path, iface: &InterfaceRef) -> NetworkResult<()> {
        match self {
            NetworkAttacher::Netlink(a) => a.attach(netns, iface).await,
            NetworkAttacher::Simulation(a) => a.attach(netns, iface).await,
        }
    }

    /// Release `iface` from the namespace at `netns`
    pub async fn detach(&self, netns: &Path, iface: &InterfaceRef) -> NetworkResult<()> {
        match self {
            NetworkAttacher::Netlink(a) => a.detach(netns, iface).await,
            NetworkAttacher::Simulation(a) => a.detach(netns, iface).await,
        }
    }
}
