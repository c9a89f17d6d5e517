/*!
 * Sandbox Controller
 * Registry of live sandboxes: creation, lookup, listing, and teardown
 */

use super::backend::Backend;
use super::sandbox::Sandbox;
use super::traits::SandboxLifecycle;
use super::types::*;
use crate::config::{ConfigError, ControllerConfig};
use crate::core::types::SandboxId;
use crate::monitoring::span_operation;
use crate::resources::{CapabilitySet, JoinTarget, SubsystemSpec};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{info, warn, Instrument};

/// Concurrent sandbox registry
#[derive(Clone)]
pub struct SandboxController {
    sandboxes: Arc<DashMap<SandboxId, Arc<Sandbox>>>,
    backend: Arc<Backend>,
    subsystems: Arc<[SubsystemSpec]>,
    netns_dir: PathBuf,
    created: Arc<AtomicU64>,
    removed: Arc<AtomicU64>,
}

impl SandboxController {
    /// Validate `config` and build the backend it selects
    pub fn new(config: ControllerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let backend = Backend::from_config(&config);
        Ok(Self::with_backend(backend, &config))
    }

    /// Use explicit collaborators; paths and subsystem policy come from `config`
    pub fn with_backend(backend: Backend, config: &ControllerConfig) -> Self {
        info!(
            platform = ?backend.resources.platform(),
            subsystems = config.subsystems.len(),
            "Sandbox controller initialized"
        );
        Self {
            sandboxes: Arc::new(DashMap::new()),
            backend: Arc::new(backend),
            subsystems: config.subsystems.clone().into(),
            netns_dir: config.netns_dir.clone(),
            created: Arc::new(AtomicU64::new(0)),
            removed: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Subsystems the host offers
    pub fn capabilities(&self) -> &CapabilitySet {
        self.backend.resources.capabilities()
    }

    /// Create a sandbox and join it to the configured subsystems.
    ///
    /// Absent optional subsystems are skipped. Any other join failure
    /// releases the groups already joined and fails with `Creation`.
    pub fn create(&self) -> SandboxResult<SandboxId> {
        let id = SandboxId::generate();
        let span = span_operation("create", id.as_str());
        let _entered = span.span().enter();

        let target = JoinTarget::Group(id.to_string());
        let groups = self
            .backend
            .resources
            .join_all(&self.subsystems, &target)
            .map_err(|e| SandboxError::Creation(e.to_string()));
        span.record_outcome(&groups);
        let groups = groups?;

        let netns = self.netns_dir.join(id.as_str());
        let sandbox = Arc::new(Sandbox::new(
            id.clone(),
            netns,
            groups,
            Arc::clone(&self.backend),
        ));

        match self.sandboxes.entry(id.clone()) {
            Entry::Occupied(_) => {
                for handle in sandbox.resource_groups().values() {
                    if let Err(e) = self.backend.resources.release(handle) {
                        warn!(group = %handle.key(), error = %e, "Failed to release group of rejected sandbox");
                    }
                }
                Err(SandboxError::Creation(format!("sandbox id {} already in use", id)))
            }
            Entry::Vacant(entry) => {
                let subsystems: Vec<_> = sandbox
                    .resource_groups()
                    .keys()
                    .map(|s| s.to_string())
                    .collect();
                entry.insert(sandbox);
                self.created.fetch_add(1, Ordering::Relaxed);
                info!(sandbox_id = %id, subsystems = ?subsystems, "Sandbox created");
                Ok(id)
            }
        }
    }

    /// Look up a live sandbox
    pub fn get(&self, id: &SandboxId) -> SandboxResult<Arc<Sandbox>> {
        self.sandboxes
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .filter(|sandbox| !sandbox.state().is_removed())
            .ok_or_else(|| SandboxError::NotFound(id.clone()))
    }

    /// Ids of every live sandbox
    pub fn list(&self) -> Vec<SandboxId> {
        self.sandboxes
            .iter()
            .filter(|entry| !entry.value().state().is_removed())
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Tear down and unregister a sandbox. Only the first caller succeeds;
    /// later or concurrent calls get `NotFound`.
    pub async fn remove(&self, id: &SandboxId) -> SandboxResult<()> {
        let span = span_operation("remove", id.as_str());
        let result = self.remove_inner(id).instrument(span.span().clone()).await;
        span.record_outcome(&result);
        result
    }

    async fn remove_inner(&self, id: &SandboxId) -> SandboxResult<()> {
        let sandbox = self
            .sandboxes
            .get(id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| SandboxError::NotFound(id.clone()))?;

        if !sandbox.teardown().await {
            return Err(SandboxError::NotFound(id.clone()));
        }

        self.sandboxes.remove(id);
        self.removed.fetch_add(1, Ordering::Relaxed);
        info!(sandbox_id = %id, "Sandbox removed");
        Ok(())
    }

    /// Snapshot of one sandbox
    pub fn info(&self, id: &SandboxId) -> SandboxResult<SandboxInfo> {
        self.get(id).map(|sandbox| sandbox.info())
    }

    pub fn stats(&self) -> ControllerStats {
        ControllerStats {
            created: self.created.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            active: self.list().len(),
        }
    }

    /// Remove every sandbox. Returns how many this call tore down.
    pub async fn shutdown(&self) -> usize {
        let ids = self.list();
        info!(count = ids.len(), "Shutting down sandbox controller");

        let mut removed = 0;
        for id in ids {
            match self.remove(&id).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(sandbox_id = %id, error = %e, "Sandbox already gone during shutdown"),
            }
        }
        removed
    }
}

impl SandboxLifecycle for SandboxController {
    fn list(&self) -> Vec<SandboxId> {
        SandboxController::list(self)
    }

    fn get(&self, id: &SandboxId) -> SandboxResult<Arc<Sandbox>> {
        SandboxController::get(self, id)
    }

    fn create(&self) -> SandboxResult<SandboxId> {
        SandboxController::create(self)
    }

    fn remove(&self, id: &SandboxId) -> impl Future<Output = SandboxResult<()>> + Send {
        SandboxController::remove(self, id)
    }
}
