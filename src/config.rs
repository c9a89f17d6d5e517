/*!
 * Controller Configuration
 * Backend selection, host paths, and the subsystem policy
 *
 * Sources, in order of precedence:
 * - SANDBOXD_* environment overrides
 * - JSON file named by SANDBOXD_CONFIG
 * - Built-in defaults
 */

use crate::core::limits::{
    DEFAULT_CGROUP_ROOT, DEFAULT_GROUP_PREFIX, DEFAULT_NETNS_DIR, DEFAULT_OOM_POLL_INTERVAL,
};
use crate::resources::SubsystemSpec;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "error", content = "details")]
pub enum ConfigError {
    #[error("Config file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read config: {0}")]
    Io(String),

    #[error("Failed to parse config: {0}")]
    Parse(String),

    #[error("Invalid value for {var}: {value}")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err.to_string())
    }
}

/// Which collaborators the controller is built on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Host backends when the cgroup hierarchy is present, simulation otherwise
    #[default]
    Auto,
    Host,
    Simulation,
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(BackendKind::Auto),
            "host" => Ok(BackendKind::Host),
            "simulation" | "sim" => Ok(BackendKind::Simulation),
            other => Err(other.to_string()),
        }
    }
}

/// Controller configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    pub backend: BackendKind,
    /// Root of the per-controller hierarchies
    pub cgroup_root: PathBuf,
    /// Directory under each subsystem that holds sandbox groups
    pub group_prefix: String,
    /// Directory of named network namespace files
    pub netns_dir: PathBuf,
    /// Subsystems joined at creation, in order
    pub subsystems: Vec<SubsystemSpec>,
    pub oom_poll_interval_ms: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Auto,
            cgroup_root: PathBuf::from(DEFAULT_CGROUP_ROOT),
            group_prefix: DEFAULT_GROUP_PREFIX.to_string(),
            netns_dir: PathBuf::from(DEFAULT_NETNS_DIR),
            subsystems: default_subsystems(),
            oom_poll_interval_ms: DEFAULT_OOM_POLL_INTERVAL.as_millis() as u64,
        }
    }
}

/// Freezer, memory and cpu, all optional
fn default_subsystems() -> Vec<SubsystemSpec> {
    vec![
        SubsystemSpec::optional(crate::core::limits::FREEZER_SUBSYSTEM),
        SubsystemSpec::optional(crate::core::limits::MEMORY_SUBSYSTEM),
        SubsystemSpec::optional(crate::core::limits::CPU_SUBSYSTEM),
    ]
}

impl ControllerConfig {
    /// Host backends with default paths
    pub fn host() -> Self {
        Self {
            backend: BackendKind::Host,
            ..Self::default()
        }
    }

    /// In-memory backends
    pub fn simulation() -> Self {
        Self {
            backend: BackendKind::Simulation,
            ..Self::default()
        }
    }

    pub fn with_subsystems(mut self, subsystems: Vec<SubsystemSpec>) -> Self {
        self.subsystems = subsystems;
        self
    }

    pub fn oom_poll_interval(&self) -> Duration {
        Duration::from_millis(self.oom_poll_interval_ms)
    }

    /// Parse configuration from a JSON string
    pub fn parse(content: &str) -> ConfigResult<Self> {
        serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Load configuration from a JSON file
    pub fn from_json_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Load from `SANDBOXD_CONFIG` (if set), apply `SANDBOXD_*` overrides, validate
    pub fn from_env() -> ConfigResult<Self> {
        let mut config = match env_var("SANDBOXD_CONFIG") {
            Some(path) => {
                debug!(path = %path, "Loading controller config file");
                Self::from_json_file(path)?
            }
            None => Self::default(),
        };

        if let Some(raw) = env_var("SANDBOXD_BACKEND") {
            config.backend = raw.parse().map_err(|value| ConfigError::InvalidEnv {
                var: "SANDBOXD_BACKEND".to_string(),
                value,
            })?;
        }
        if let Some(raw) = env_var("SANDBOXD_CGROUP_ROOT") {
            config.cgroup_root = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("SANDBOXD_NETNS_DIR") {
            config.netns_dir = PathBuf::from(raw);
        }
        if let Some(raw) = env_var("SANDBOXD_GROUP_PREFIX") {
            config.group_prefix = raw;
        }
        if let Some(raw) = env_var("SANDBOXD_OOM_POLL_MS") {
            config.oom_poll_interval_ms =
                raw.trim().parse().map_err(|_| ConfigError::InvalidEnv {
                    var: "SANDBOXD_OOM_POLL_MS".to_string(),
                    value: raw.clone(),
                })?;
        }
        if let Some(raw) = env_var("SANDBOXD_SUBSYSTEMS") {
            config.subsystems = parse_subsystem_list(&raw).ok_or(ConfigError::InvalidEnv {
                var: "SANDBOXD_SUBSYSTEMS".to_string(),
                value: raw.clone(),
            })?;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration, collecting all errors before returning
    pub fn validate(&self) -> ConfigResult<()> {
        let mut errors = Vec::new();

        if self.group_prefix.is_empty() {
            errors.push("group_prefix cannot be empty".to_string());
        } else if self.group_prefix.contains("..") {
            errors.push(format!(
                "group_prefix '{}' must not contain '..'",
                self.group_prefix
            ));
        }

        if self.oom_poll_interval_ms == 0 {
            errors.push("oom_poll_interval_ms must be greater than 0".to_string());
        }

        let mut seen = HashSet::new();
        for spec in &self.subsystems {
            if !seen.insert(spec.name.as_str()) {
                errors.push(format!("subsystem '{}' listed more than once", spec.name));
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }
}

/// Parse `freezer:required,memory,cpu:optional`
pub fn parse_subsystem_list(raw: &str) -> Option<Vec<SubsystemSpec>> {
    raw.split(',')
        .filter(|part| !part.trim().is_empty())
        .map(SubsystemSpec::parse)
        .collect()
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
