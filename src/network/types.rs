/*!
 * Network Attachment Types
 */

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for interface attachment
pub type NetworkResult<T> = Result<T, NetworkError>;

/// Interface attachment errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum NetworkError {
    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),

    #[error("Interface not found: {0}")]
    InterfaceNotFound(String),

    #[error("Network namespace missing: {0}")]
    NamespaceMissing(String),

    #[error("Netlink operation failed: {0}")]
    Netlink(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for NetworkError {
    fn from(err: std::io::Error) -> Self {
        NetworkError::IoError(err.to_string())
    }
}

/// Host network interface handed to a sandbox.
///
/// Identity is the host name alone; `index` only saves a lookup, so
/// `eth1` and `eth1#5` are the same membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceRef {
    /// Interface name in the host namespace
    pub name: String,
    /// Kernel link index, when the caller already resolved it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<u32>,
}

impl InterfaceRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            index: None,
        }
    }

    pub fn with_index(name: impl Into<String>, index: u32) -> Self {
        Self {
            name: name.into(),
            index: Some(index),
        }
    }
}

impl PartialEq for InterfaceRef {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for InterfaceRef {}

impl std::hash::Hash for InterfaceRef {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for InterfaceRef {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for InterfaceRef {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.name.cmp(&other.name)
    }
}

impl std::fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self.index {
            Some(index) => write!(f, "{}#{}", self.name, index),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Backend implementation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkPlatform {
    /// rtnetlink link moves
    Netlink,
    /// Recorded membership only
    Simulation,
}
