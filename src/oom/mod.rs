/*!
 * OOM Event Module
 * Raw out-of-memory notifications per memory group, and the per-sandbox
 * broadcast that hands them to subscribers
 */

mod broadcast;
mod cgroupfs;
mod manager;
mod monitor;
mod simulation;
mod traits;
mod types;

pub use broadcast::{OomBroadcaster, OomSubscription, SubscriptionId};
pub use cgroupfs::CgroupFsOomSource;
pub use manager::OomSource;
pub use monitor::OomMonitor;
pub use simulation::SimulationOomSource;
pub use traits::*;
pub use types::*;
