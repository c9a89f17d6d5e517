/*!
 * Simulation OOM Source
 * Events are injected by the caller instead of a memory controller
 */

use super::monitor::OomMonitor;
use super::traits::*;
use super::types::*;
use crate::resources::GroupHandle;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, UnboundedSender};
use tracing::debug;

/// Simulation-based OOM source, keyed by group name
pub struct SimulationOomSource {
    supported: Arc<AtomicBool>,
    monitors: Arc<DashMap<String, Vec<UnboundedSender<OomEvent>>>>,
}

impl SimulationOomSource {
    pub fn new() -> Self {
        Self {
            supported: Arc::new(AtomicBool::new(true)),
            monitors: Arc::new(DashMap::new()),
        }
    }

    /// Source whose memory controllers expose no OOM notifications
    pub fn unsupported() -> Self {
        let source = Self::new();
        source.supported.store(false, Ordering::SeqCst);
        source
    }

    /// Deliver one OOM occurrence to every open monitor of `group`.
    /// Returns the number of monitors reached.
    pub fn trigger(&self, group: &str) -> usize {
        let Some(mut senders) = self.monitors.get_mut(group) else {
            return 0;
        };
        let event = OomEvent::now();
        senders.retain(|tx| tx.send(event).is_ok());
        debug!(group, delivered = senders.len(), "Simulated OOM triggered");
        senders.len()
    }

    /// End every monitor of `group` as if its controller went away.
    /// Returns the number of monitors ended.
    pub fn end_monitors(&self, group: &str) -> usize {
        self.monitors
            .remove(group)
            .map(|(_, senders)| senders.len())
            .unwrap_or(0)
    }

    /// Monitors of `group` that are still open
    pub fn open_monitors(&self, group: &str) -> usize {
        self.monitors
            .get(group)
            .map(|s| s.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }
}

impl Default for SimulationOomSource {
    fn default() -> Self {
        Self::new()
    }
}

impl OomEventSource for SimulationOomSource {
    fn open(&self, target: &GroupHandle) -> OomResult<OomMonitor> {
        if !self.supported.load(Ordering::SeqCst) {
            return Err(OomError::NotSupported(format!(
                "simulated group {} has no OOM notifications",
                target.key()
            )));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let mut senders = self.monitors.entry(target.group.clone()).or_default();
        senders.retain(|open| !open.is_closed());
        senders.push(tx);
        Ok(OomMonitor::new(rx, None))
    }

    fn platform(&self) -> OomPlatform {
        OomPlatform::Simulation
    }
}

impl Clone for SimulationOomSource {
    fn clone(&self) -> Self {
        Self {
            supported: Arc::clone(&self.supported),
            monitors: Arc::clone(&self.monitors),
        }
    }
}
