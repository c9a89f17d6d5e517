/*!
 * Controller Limits and Constants
 *
 * Host paths, well-known subsystem names, and polling intervals shared
 * by the resource, OOM, and network collaborators.
 */

use std::time::Duration;

// =============================================================================
// RESOURCE CONTROL
// =============================================================================

/// Root of the per-controller cgroup hierarchies
pub const DEFAULT_CGROUP_ROOT: &str = "/sys/fs/cgroup";

/// Directory created under each subsystem to hold sandbox groups
pub const DEFAULT_GROUP_PREFIX: &str = "sandboxd";

/// Freezer subsystem (suspend/resume all tasks of a group)
pub const FREEZER_SUBSYSTEM: &str = "freezer";

/// Memory subsystem, also the source of OOM notifications
pub const MEMORY_SUBSYSTEM: &str = "memory";

/// CPU bandwidth subsystem
pub const CPU_SUBSYSTEM: &str = "cpu";

/// Membership file inside a group directory
pub const CGROUP_PROCS_FILE: &str = "cgroup.procs";

/// Freezer state file inside a freezer group
pub const FREEZER_STATE_FILE: &str = "freezer.state";

// =============================================================================
// OOM MONITORING
// =============================================================================

/// cgroup v2 style event counters
pub const MEMORY_EVENTS_FILE: &str = "memory.events";

/// cgroup v1 OOM control file
pub const MEMORY_OOM_CONTROL_FILE: &str = "memory.oom_control";

/// Default interval between OOM counter samples
pub const DEFAULT_OOM_POLL_INTERVAL: Duration = Duration::from_millis(250);

// =============================================================================
// NETWORK
// =============================================================================

/// Directory holding named network namespace files
pub const DEFAULT_NETNS_DIR: &str = "/var/run/netns";
