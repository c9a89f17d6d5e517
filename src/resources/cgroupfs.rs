/*!
 * Cgroup Filesystem Provider
 * Per-controller (v1 style) hierarchies mounted under a common root
 */

use super::traits::*;
use super::types::*;
use crate::core::limits::{CGROUP_PROCS_FILE, FREEZER_STATE_FILE};
use crate::core::types::Pid;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Marker of a unified (v2) hierarchy root, which has no per-controller mounts
const UNIFIED_MARKER: &str = "cgroup.controllers";

/// Resource groups backed by the host cgroup filesystem
#[derive(Debug, Clone)]
pub struct CgroupFsProvider {
    root: PathBuf,
    prefix: String,
}

impl CgroupFsProvider {
    pub fn new(root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        let root = root.into();
        info!(root = %root.display(), "Cgroup filesystem provider initialized");
        Self {
            root,
            prefix: prefix.into(),
        }
    }

    /// Whether the root looks like a mounted cgroup tree at all
    pub fn is_available(&self) -> bool {
        self.root.is_dir()
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn subsystem_dir(&self, name: &SubsystemName) -> PathBuf {
        self.root.join(name.as_str())
    }

    fn group_dir(&self, name: &SubsystemName, group: &str) -> PathBuf {
        self.subsystem_dir(name).join(&self.prefix).join(group)
    }

    fn validate_group_name(group: &str) -> ResourceResult<()> {
        if group.is_empty() || group.contains('/') || group.contains("..") {
            return Err(ResourceError::MalformedHierarchy(format!(
                "invalid group name {:?}",
                group
            )));
        }
        Ok(())
    }

    fn write_pid(dir: &Path, pid: Pid) -> ResourceResult<()> {
        fs::write(dir.join(CGROUP_PROCS_FILE), pid.to_string())?;
        Ok(())
    }

    fn handle_path<'a>(handle: &'a GroupHandle) -> ResourceResult<&'a Path> {
        handle.path.as_deref().ok_or_else(|| {
            ResourceError::MalformedHierarchy(format!("handle {} has no path", handle.key()))
        })
    }

    /// Move leftover tasks to the parent group so the directory can be removed
    fn evacuate(dir: &Path) {
        let Some(parent) = dir.parent() else {
            return;
        };
        let Ok(content) = fs::read_to_string(dir.join(CGROUP_PROCS_FILE)) else {
            return;
        };
        for pid in content.lines().filter_map(|l| l.trim().parse::<Pid>().ok()) {
            if let Err(e) = Self::write_pid(parent, pid) {
                debug!(pid, error = %e, "Could not move task to parent group");
            }
        }
    }
}

impl ResourceGroupProvider for CgroupFsProvider {
    fn discover(&self) -> CapabilitySet {
        if self.root.join(UNIFIED_MARKER).exists() {
            warn!(
                root = %self.root.display(),
                "Unified cgroup hierarchy detected; per-controller subsystems unavailable"
            );
            return CapabilitySet::default();
        }

        let Ok(entries) = fs::read_dir(&self.root) else {
            return CapabilitySet::default();
        };

        let names: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir() && e.path().join(CGROUP_PROCS_FILE).exists())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();

        debug!(subsystems = ?names, "Discovered cgroup subsystems");
        CapabilitySet::new(names)
    }

    fn join_subsystem(
        &self,
        name: &SubsystemName,
        target: &JoinTarget,
    ) -> ResourceResult<GroupHandle> {
        let subsystem_dir = self.subsystem_dir(name);
        match fs::metadata(&subsystem_dir) {
            Ok(meta) if meta.is_dir() => {}
            Ok(_) => {
                return Err(ResourceError::MalformedHierarchy(format!(
                    "{} is not a directory",
                    subsystem_dir.display()
                )))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ResourceError::NotFound(name.to_string()))
            }
            Err(e) => return Err(e.into()),
        }

        let group = target.group_name();
        Self::validate_group_name(&group)?;

        let dir = self.group_dir(name, &group);
        fs::create_dir_all(&dir)?;

        if let JoinTarget::Process(pid) = target {
            Self::write_pid(&dir, *pid)?;
        }

        debug!(subsystem = %name, group = %group, "Joined cgroup subsystem");
        Ok(GroupHandle {
            subsystem: name.clone(),
            group,
            path: Some(dir),
        })
    }

    fn attach_process(&self, handle: &GroupHandle, pid: Pid) -> ResourceResult<()> {
        let dir = Self::handle_path(handle)?;
        Self::write_pid(dir, pid)
    }

    fn set_freeze_state(&self, handle: &GroupHandle, state: FreezeState) -> ResourceResult<()> {
        let dir = Self::handle_path(handle)?;
        fs::write(dir.join(FREEZER_STATE_FILE), state.as_kernel_str())?;
        debug!(group = %handle.group, state = state.as_kernel_str(), "Freezer state written");
        Ok(())
    }

    fn release(&self, handle: &GroupHandle) -> ResourceResult<()> {
        let dir = Self::handle_path(handle)?;
        if !dir.exists() {
            return Ok(());
        }

        Self::evacuate(dir);

        match fs::remove_dir(dir) {
            Ok(()) => {
                debug!(group = %handle.key(), "Released cgroup");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn platform(&self) -> ResourcePlatform {
        ResourcePlatform::CgroupFs
    }
}
