/*!
 * Resource Group Types
 * Platform-agnostic types for resource-control subsystems
 */

use crate::core::limits::{CPU_SUBSYSTEM, FREEZER_SUBSYSTEM, MEMORY_SUBSYSTEM};
use crate::core::types::Pid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for resource group operations
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Resource group errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum ResourceError {
    /// The subsystem does not exist on this host
    #[error("Subsystem not found: {0}")]
    NotFound(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Malformed hierarchy: {0}")]
    MalformedHierarchy(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl ResourceError {
    /// Distinguished "capability absent" condition, the only error an
    /// optional subsystem is allowed to swallow
    pub fn is_not_found(&self) -> bool {
        matches!(self, ResourceError::NotFound(_))
    }
}

impl From<std::io::Error> for ResourceError {
    fn from(err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::PermissionDenied => {
                ResourceError::PermissionDenied(err.to_string())
            }
            _ => ResourceError::IoError(err.to_string()),
        }
    }
}

/// Name of a resource-control subsystem ("freezer", "memory", ...)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubsystemName(String);

impl SubsystemName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn freezer() -> Self {
        Self::new(FREEZER_SUBSYSTEM)
    }

    pub fn memory() -> Self {
        Self::new(MEMORY_SUBSYSTEM)
    }

    pub fn cpu() -> Self {
        Self::new(CPU_SUBSYSTEM)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SubsystemName {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SubsystemName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// What gets joined to a subsystem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum JoinTarget {
    /// A named group (created if missing)
    Group(String),
    /// A single process, placed in a group named after its pid
    Process(Pid),
}

impl JoinTarget {
    /// Group directory name for this target
    pub fn group_name(&self) -> String {
        match self {
            JoinTarget::Group(name) => name.clone(),
            JoinTarget::Process(pid) => format!("pid-{}", pid),
        }
    }
}

/// Membership in one subsystem, owned by whoever joined it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupHandle {
    pub subsystem: SubsystemName,
    pub group: String,
    /// Host path of the group, if backed by a filesystem
    pub path: Option<PathBuf>,
}

impl GroupHandle {
    /// Unique key across subsystems
    pub fn key(&self) -> String {
        format!("{}:{}", self.subsystem, self.group)
    }
}

/// Freezer state written to a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FreezeState {
    Frozen,
    Thawed,
}

impl FreezeState {
    /// Value understood by the kernel's freezer.state file
    pub fn as_kernel_str(&self) -> &'static str {
        match self {
            FreezeState::Frozen => "FROZEN",
            FreezeState::Thawed => "THAWED",
        }
    }
}

/// Subsystem the controller should join for every sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubsystemSpec {
    pub name: SubsystemName,
    /// Mandatory subsystems abort creation when absent
    #[serde(default)]
    pub required: bool,
}

impl SubsystemSpec {
    pub fn optional(name: impl Into<String>) -> Self {
        Self {
            name: SubsystemName::new(name),
            required: false,
        }
    }

    pub fn required(name: impl Into<String>) -> Self {
        Self {
            name: SubsystemName::new(name),
            required: true,
        }
    }

    /// Parse `name`, `name:required` or `name:optional`
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let (name, flag) = match raw.split_once(':') {
            Some((name, flag)) => (name.trim(), Some(flag.trim())),
            None => (raw, None),
        };
        if name.is_empty() || name.contains('/') {
            return None;
        }
        match flag {
            None | Some("optional") => Some(Self::optional(name)),
            Some("required") => Some(Self::required(name)),
            Some(_) => None,
        }
    }
}

/// Subsystems discovered on the host at startup
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilitySet {
    available: BTreeSet<SubsystemName>,
}

impl CapabilitySet {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            available: names.into_iter().map(SubsystemName::new).collect(),
        }
    }

    pub fn supports(&self, name: &SubsystemName) -> bool {
        self.available.contains(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &SubsystemName> {
        self.available.iter()
    }

    pub fn len(&self) -> usize {
        self.available.len()
    }

    pub fn is_empty(&self) -> bool {
        self.available.is_empty()
    }
}

/// Backend implementation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourcePlatform {
    /// Host cgroup filesystem
    CgroupFs,
    /// In-memory groups
    Simulation,
    /// Caller-supplied provider
    Custom,
}
