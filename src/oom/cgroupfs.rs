/*!
 * Cgroup OOM Source
 * Samples memory controller counters and emits one event per increment
 */

use super::monitor::OomMonitor;
use super::traits::*;
use super::types::*;
use crate::core::limits::{MEMORY_EVENTS_FILE, MEMORY_OOM_CONTROL_FILE};
use crate::resources::GroupHandle;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::{debug, info, warn};

/// Which counter file a group exposes, and the key to read from it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CounterFile {
    /// `memory.events`: `oom <n>`
    Events,
    /// `memory.oom_control`: `oom_kill <n>`
    OomControl,
}

impl CounterFile {
    fn file_name(&self) -> &'static str {
        match self {
            CounterFile::Events => MEMORY_EVENTS_FILE,
            CounterFile::OomControl => MEMORY_OOM_CONTROL_FILE,
        }
    }

    fn key(&self) -> &'static str {
        match self {
            CounterFile::Events => "oom",
            CounterFile::OomControl => "oom_kill",
        }
    }

    fn detect(dir: &Path) -> Option<Self> {
        [CounterFile::Events, CounterFile::OomControl]
            .into_iter()
            .find(|c| dir.join(c.file_name()).is_file())
    }
}

/// Extract the counter named `key` from a flat-keyed cgroup file
fn parse_counter(content: &str, key: &str) -> Option<u64> {
    content.lines().find_map(|line| {
        let mut parts = line.split_whitespace();
        match (parts.next(), parts.next()) {
            (Some(k), Some(v)) if k == key => v.parse::<u64>().ok(),
            _ => None,
        }
    })
}

/// OOM source polling the host memory controller
#[derive(Debug, Clone)]
pub struct CgroupFsOomSource {
    poll_interval: Duration,
}

impl CgroupFsOomSource {
    pub fn new(poll_interval: Duration) -> Self {
        info!(poll_ms = poll_interval.as_millis() as u64, "Cgroup OOM source initialized");
        Self { poll_interval }
    }

    async fn poll(
        path: PathBuf,
        counter: CounterFile,
        mut last: u64,
        interval: Duration,
        tx: UnboundedSender<OomEvent>,
    ) {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut unreadable = false;

        loop {
            ticker.tick().await;
            if tx.is_closed() {
                break;
            }

            // Only the monitor's owner ends the stream; read failures retry
            let current = match tokio::fs::read_to_string(&path).await {
                Ok(content) => parse_counter(&content, counter.key()).ok_or_else(|| {
                    format!("no {} counter", counter.key())
                }),
                Err(e) => Err(e.to_string()),
            };
            let current = match current {
                Ok(current) => current,
                Err(reason) => {
                    if !unreadable {
                        warn!(path = %path.display(), error = %reason, "OOM counter unreadable, retrying");
                        unreadable = true;
                    }
                    continue;
                }
            };
            if unreadable {
                debug!(path = %path.display(), "OOM counter readable again");
                unreadable = false;
            }

            // Counter reset (group recreated) re-baselines without emitting
            if current < last {
                last = current;
                continue;
            }

            for _ in last..current {
                if tx.send(OomEvent::now()).is_err() {
                    return;
                }
            }
            last = current;
        }
    }
}

impl OomEventSource for CgroupFsOomSource {
    fn open(&self, target: &GroupHandle) -> OomResult<OomMonitor> {
        let dir = target.path.as_deref().ok_or_else(|| {
            OomError::NotSupported(format!("group {} has no host path", target.key()))
        })?;

        let counter = CounterFile::detect(dir).ok_or_else(|| {
            OomError::NotSupported(format!(
                "{} exposes neither {} nor {}",
                dir.display(),
                MEMORY_EVENTS_FILE,
                MEMORY_OOM_CONTROL_FILE
            ))
        })?;

        let path = dir.join(counter.file_name());
        let baseline = parse_counter(&std::fs::read_to_string(&path)?, counter.key()).unwrap_or(0);

        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| OomError::Runtime(e.to_string()))?;

        let (tx, rx) = mpsc::unbounded_channel();
        let producer = runtime.spawn(Self::poll(
            path.clone(),
            counter,
            baseline,
            self.poll_interval,
            tx,
        ));

        debug!(path = %path.display(), baseline, "OOM monitor opened");
        Ok(OomMonitor::new(rx, Some(producer)))
    }

    fn platform(&self) -> OomPlatform {
        OomPlatform::CgroupFs
    }
}
