/*!
 * Simulation Interface Attachment
 * Records which interfaces each namespace holds
 */

use super::types::*;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Simulation-based attacher
#[derive(Clone, Default)]
pub struct SimulationNetwork {
    attached: Arc<DashMap<PathBuf, BTreeSet<InterfaceRef>>>,
    failures: Arc<DashMap<String, NetworkError>>,
    attach_calls: Arc<AtomicUsize>,
}

impl SimulationNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make attaching `iface_name` fail with `err`
    pub fn fail_attach(&self, iface_name: impl Into<String>, err: NetworkError) {
        self.failures.insert(iface_name.into(), err);
    }

    /// Interfaces currently inside `netns`
    pub fn attached(&self, netns: &Path) -> Vec<InterfaceRef> {
        self.attached
            .get(netns)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Attach requests that reached the backend
    pub fn attach_calls(&self) -> usize {
        self.attach_calls.load(Ordering::SeqCst)
    }

    pub async fn attach(&self, netns: &Path, iface: &InterfaceRef) -> NetworkResult<()> {
        self.attach_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = self.failures.get(&iface.name) {
            return Err(err.value().clone());
        }
        self.attached
            .entry(netns.to_path_buf())
            .or_default()
            .insert(iface.clone());
        debug!(iface = %iface, netns = %netns.display(), "Simulated interface attach");
        Ok(())
    }

    pub async fn detach(&self, netns: &Path, iface: &InterfaceRef) -> NetworkResult<()> {
        if let Some(mut set) = self.attached.get_mut(netns) {
            set.remove(iface);
        }
        Ok(())
    }
}
