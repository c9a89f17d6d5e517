/*!
 * Exec Types
 */

use crate::core::types::{Pid, SandboxId};
use crate::resources::GroupHandle;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Result type for command launches
pub type ExecResult<T> = Result<T, ExecError>;

/// Command launch errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum ExecError {
    #[error("Failed to spawn {command}: {reason}")]
    SpawnFailed { command: String, reason: String },

    #[error("Failed to confine process {pid}: {reason}")]
    Confinement { pid: Pid, reason: String },

    #[error("Failed to wait for process {pid}: {reason}")]
    WaitFailed { pid: Pid, reason: String },

    #[error("Failed to signal process {pid}: {reason}")]
    SignalFailed { pid: Pid, reason: String },

    #[error("Platform not supported: {0}")]
    PlatformNotSupported(String),
}

/// How long `exec` keeps the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecMode {
    /// Return once the process is launched and confined
    #[default]
    Detached,
    /// Return once the process exits
    Wait,
}

/// Command to run inside a sandbox
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecRequest {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    /// Complete environment of the new process
    #[serde(default)]
    pub env: Vec<(String, String)>,
    #[serde(default)]
    pub mode: ExecMode,
}

impl ExecRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: Vec::new(),
            mode: ExecMode::Detached,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn wait(mut self) -> Self {
        self.mode = ExecMode::Wait;
        self
    }
}

/// Isolation boundary a launch is placed into
#[derive(Debug, Clone, Copy)]
pub struct ExecContext<'a> {
    pub sandbox: &'a SandboxId,
    pub netns: &'a Path,
    pub groups: &'a [GroupHandle],
}

/// Result of a successful `exec`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub pid: Pid,
    /// Exit code, present only for `ExecMode::Wait`
    pub exit_code: Option<i32>,
}
