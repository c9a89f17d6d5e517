/*!
 * OOM Event Source Traits
 */

use super::monitor::OomMonitor;
use super::types::*;
use crate::resources::GroupHandle;

/// Producer of raw OOM notifications for a memory group
pub trait OomEventSource: Send + Sync {
    /// Open a monitor on `target`'s memory controller.
    ///
    /// Must be called from within a Tokio runtime when the source spawns
    /// a producer task.
    fn open(&self, target: &GroupHandle) -> OomResult<OomMonitor>;

    /// Get the platform type
    fn platform(&self) -> OomPlatform;
}
