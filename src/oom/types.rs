/*!
 * OOM Event Types
 */

use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use thiserror::Error;

/// Result type for OOM monitoring
pub type OomResult<T> = Result<T, OomError>;

/// OOM monitoring errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum OomError {
    /// The memory controller of the target exposes no OOM notifications
    #[error("OOM notifications not supported: {0}")]
    NotSupported(String),

    /// The stream was already closed by sandbox teardown
    #[error("OOM stream closed: {0}")]
    Closed(String),

    #[error("No async runtime available: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    IoError(String),
}

impl From<std::io::Error> for OomError {
    fn from(err: std::io::Error) -> Self {
        OomError::IoError(err.to_string())
    }
}

/// One out-of-memory occurrence. Counting and dedup belong to the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OomEvent {
    pub observed_at: SystemTime,
}

impl OomEvent {
    pub fn now() -> Self {
        Self {
            observed_at: SystemTime::now(),
        }
    }
}

/// Backend implementation type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OomPlatform {
    /// Polled memory controller counters
    CgroupFs,
    /// Test-triggered events
    Simulation,
}
