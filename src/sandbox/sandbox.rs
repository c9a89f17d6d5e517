/*!
 * Sandbox
 * One isolated execution context: its resource groups, interfaces,
 * launched processes, and OOM subscribers
 *
 * Locking:
 * - `gate` (async RwLock): exec and attach hold it shared; freeze, thaw
 *   and teardown hold it exclusively
 * - `inner` (sync mutex): short critical sections over state and
 *   membership, never held across an await
 * - `attach_lock`: serializes interface attaches without blocking exec
 * - `processes`: taken after `inner` when both are held; detached reapers
 *   lock it alone
 */

use super::backend::Backend;
use super::traits::SandboxOps;
use super::types::*;
use crate::core::types::{Pid, SandboxId};
use crate::exec::{ExecContext, ExecError, ExecMode, ExecOutcome, ExecRequest};
use crate::monitoring::span_operation;
use crate::network::InterfaceRef;
use crate::oom::{OomBroadcaster, OomError, OomEventSource, OomSubscription, SubscriptionId};
use crate::resources::{FreezeState, GroupHandle, SubsystemName};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::{debug, info, warn, Instrument};

struct SandboxInner {
    state: SandboxState,
    interfaces: HashSet<InterfaceRef>,
    groups: HashMap<SubsystemName, GroupHandle>,
}

/// A live sandbox, shared between the registry and callers
pub struct Sandbox {
    id: SandboxId,
    netns: PathBuf,
    created_at: SystemTime,
    backend: Arc<Backend>,
    gate: tokio::sync::RwLock<()>,
    attach_lock: tokio::sync::Mutex<()>,
    inner: Mutex<SandboxInner>,
    /// Launched pids not yet reaped; shared with detached reapers
    processes: Arc<Mutex<Vec<Pid>>>,
    oom: OomBroadcaster,
}

impl Sandbox {
    pub(crate) fn new(
        id: SandboxId,
        netns: PathBuf,
        groups: HashMap<SubsystemName, GroupHandle>,
        backend: Arc<Backend>,
    ) -> Self {
        let oom = OomBroadcaster::new(id.to_string());
        Self {
            id,
            netns,
            created_at: SystemTime::now(),
            backend,
            gate: tokio::sync::RwLock::new(()),
            attach_lock: tokio::sync::Mutex::new(()),
            inner: Mutex::new(SandboxInner {
                state: SandboxState::Created,
                interfaces: HashSet::new(),
                groups,
            }),
            processes: Arc::new(Mutex::new(Vec::new())),
            oom,
        }
    }

    pub fn id(&self) -> &SandboxId {
        &self.id
    }

    /// Network namespace file interfaces and processes are moved into
    pub fn netns(&self) -> &Path {
        &self.netns
    }

    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    pub fn state(&self) -> SandboxState {
        self.inner.lock().state
    }

    /// Attached interfaces, sorted by name
    pub fn interfaces(&self) -> Vec<InterfaceRef> {
        let mut ifaces: Vec<_> = self.inner.lock().interfaces.iter().cloned().collect();
        ifaces.sort();
        ifaces
    }

    /// Joined subsystems and their groups
    pub fn resource_groups(&self) -> HashMap<SubsystemName, GroupHandle> {
        self.inner.lock().groups.clone()
    }

    /// Pids launched and not yet known to have finished
    pub fn processes(&self) -> Vec<Pid> {
        self.processes.lock().clone()
    }

    pub fn info(&self) -> SandboxInfo {
        let (state, mut interfaces, mut subsystems, processes) = {
            let inner = self.inner.lock();
            (
                inner.state,
                inner.interfaces.iter().map(|i| i.name.clone()).collect::<Vec<_>>(),
                inner
                    .groups
                    .keys()
                    .map(|s| s.as_str().to_string())
                    .collect::<Vec<_>>(),
                self.processes.lock().len(),
            )
        };
        interfaces.sort();
        subsystems.sort();

        SandboxInfo {
            id: self.id.clone(),
            state,
            interfaces,
            subsystems,
            subscribers: self.oom.subscriber_count(),
            processes,
            created_at: self.created_at,
        }
    }

    fn invalid_state(&self, state: SandboxState) -> SandboxError {
        SandboxError::InvalidState {
            id: self.id.clone(),
            state,
        }
    }

    /// Run a command inside the sandbox.
    ///
    /// Detached requests return once the process is launched and placed in
    /// every resource group. `Wait` requests also wait for it to exit; the
    /// lifecycle gate is released before that wait.
    pub async fn exec(&self, req: ExecRequest) -> SandboxResult<ExecOutcome> {
        let span = span_operation("exec", self.id.as_str());
        let result = self.exec_inner(req).instrument(span.span().clone()).await;
        span.record_outcome(&result);
        result
    }

    async fn exec_inner(&self, req: ExecRequest) -> SandboxResult<ExecOutcome> {
        let gate = self.gate.read().await;

        let groups: Vec<GroupHandle> = {
            let inner = self.inner.lock();
            match inner.state {
                SandboxState::Removed => return Err(self.invalid_state(inner.state)),
                SandboxState::Frozen => return Err(SandboxError::FrozenState(self.id.clone())),
                SandboxState::Created | SandboxState::Running => {}
            }
            inner.groups.values().cloned().collect()
        };

        let ctx = ExecContext {
            sandbox: &self.id,
            netns: &self.netns,
            groups: &groups,
        };
        let process = self.backend.launcher.launch(&ctx, &req)?;
        let pid = process.pid();

        for handle in &groups {
            if let Err(e) = self.backend.resources.attach_process(handle, pid) {
                warn!(sandbox_id = %self.id, pid, group = %handle.key(), error = %e, "Confinement failed, killing process");
                process.kill().await;
                return Err(ExecError::Confinement {
                    pid,
                    reason: e.to_string(),
                }
                .into());
            }
        }

        {
            let mut inner = self.inner.lock();
            if inner.state == SandboxState::Created {
                inner.state = SandboxState::Running;
            }
            self.processes.lock().push(pid);
        }
        info!(sandbox_id = %self.id, pid, command = %req.command, mode = ?req.mode, "Command started");

        match req.mode {
            ExecMode::Detached => {
                let live = Arc::downgrade(&self.processes);
                let sandbox_id = self.id.clone();
                process.detach(move |pid| {
                    if let Some(live) = live.upgrade() {
                        live.lock().retain(|p| *p != pid);
                        debug!(sandbox_id = %sandbox_id, pid, "Detached command reaped");
                    }
                });
                Ok(ExecOutcome {
                    pid,
                    exit_code: None,
                })
            }
            ExecMode::Wait => {
                drop(gate);
                let waited = process.wait().await;
                self.processes.lock().retain(|p| *p != pid);
                let code = waited?;
                debug!(sandbox_id = %self.id, pid, code, "Command exited");
                Ok(ExecOutcome {
                    pid,
                    exit_code: Some(code),
                })
            }
        }
    }

    /// Move a host interface into the sandbox. Re-adding a member is a no-op.
    pub async fn add_net_iface(&self, iface: InterfaceRef) -> SandboxResult<()> {
        let span = span_operation("add_net_iface", self.id.as_str());
        let result = self.add_net_iface_inner(iface).instrument(span.span().clone()).await;
        span.record_outcome(&result);
        result
    }

    async fn add_net_iface_inner(&self, iface: InterfaceRef) -> SandboxResult<()> {
        let _gate = self.gate.read().await;
        let _serial = self.attach_lock.lock().await;

        {
            let inner = self.inner.lock();
            if inner.state.is_removed() {
                return Err(SandboxError::Attach(format!(
                    "sandbox {} is removed",
                    self.id
                )));
            }
            if inner.interfaces.contains(&iface) {
                debug!(sandbox_id = %self.id, iface = %iface, "Interface already attached");
                return Ok(());
            }
        }

        self.backend.network.attach(&self.netns, &iface).await?;

        info!(sandbox_id = %self.id, iface = %iface, "Interface attached");
        self.inner.lock().interfaces.insert(iface);
        Ok(())
    }

    /// Suspend every process in the sandbox.
    ///
    /// Without a freezer group only the logical state changes.
    pub async fn freeze(&self) -> SandboxResult<()> {
        let _gate = self.gate.write().await;

        let freezer = {
            let inner = self.inner.lock();
            match inner.state {
                SandboxState::Removed => return Err(self.invalid_state(inner.state)),
                SandboxState::Frozen => return Ok(()),
                SandboxState::Created | SandboxState::Running => {}
            }
            inner.groups.get(&SubsystemName::freezer()).cloned()
        };

        match freezer {
            Some(handle) => self
                .backend
                .resources
                .set_freeze_state(&handle, FreezeState::Frozen)?,
            None => warn!(sandbox_id = %self.id, "No freezer group, freezing logical state only"),
        }

        self.inner.lock().state = SandboxState::Frozen;
        info!(sandbox_id = %self.id, "Sandbox frozen");
        Ok(())
    }

    /// Resume a frozen sandbox; other states are left alone
    pub async fn thaw(&self) -> SandboxResult<()> {
        let _gate = self.gate.write().await;

        let freezer = {
            let inner = self.inner.lock();
            match inner.state {
                SandboxState::Removed => return Err(self.invalid_state(inner.state)),
                SandboxState::Frozen => {}
                SandboxState::Created | SandboxState::Running => return Ok(()),
            }
            inner.groups.get(&SubsystemName::freezer()).cloned()
        };

        if let Some(handle) = freezer {
            self.backend
                .resources
                .set_freeze_state(&handle, FreezeState::Thawed)?;
        }

        self.inner.lock().state = SandboxState::Running;
        info!(sandbox_id = %self.id, "Sandbox thawed");
        Ok(())
    }

    /// Subscribe to OOM events of the sandbox's memory group.
    ///
    /// The first subscription opens the monitor. The stream ends when the
    /// sandbox is removed or the subscription is dropped via `unsubscribe`.
    pub fn subscribe(&self) -> SandboxResult<OomSubscription> {
        let memory = {
            let inner = self.inner.lock();
            if inner.state.is_removed() {
                return Err(self.invalid_state(inner.state));
            }
            inner.groups.get(&SubsystemName::memory()).cloned()
        };

        let handle = memory.ok_or_else(|| {
            SandboxError::Open(format!("sandbox {} has no memory group", self.id))
        })?;

        let source = self.backend.oom.clone();
        let subscription = self
            .oom
            .subscribe(move || source.open(&handle))
            .map_err(|e| match e {
                OomError::Closed(_) => self.invalid_state(SandboxState::Removed),
                other => SandboxError::from(other),
            })?;

        debug!(sandbox_id = %self.id, subscription = subscription.id(), "OOM subscriber added");
        Ok(subscription)
    }

    /// End one subscription. Returns false if it was already gone.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.oom.unsubscribe(id)
    }

    /// OOM events forwarded to subscribers so far
    pub fn oom_events_delivered(&self) -> u64 {
        self.oom.delivered()
    }

    /// Tear the sandbox down. Returns false if another caller already did.
    ///
    /// Order: mark removed, close OOM subscriptions, wait for in-flight
    /// launches, thaw, kill processes, detach interfaces, release groups.
    /// Step failures are logged and do not stop later steps.
    pub(crate) async fn teardown(&self) -> bool {
        let was_frozen = {
            let mut inner = self.inner.lock();
            if inner.state.is_removed() {
                return false;
            }
            let was_frozen = inner.state == SandboxState::Frozen;
            inner.state = SandboxState::Removed;
            was_frozen
        };

        let closed = self.oom.close();
        debug!(sandbox_id = %self.id, subscribers = closed, "OOM subscriptions closed");

        let _gate = self.gate.write().await;

        let (groups, interfaces) = {
            let mut inner = self.inner.lock();
            (
                std::mem::take(&mut inner.groups),
                std::mem::take(&mut inner.interfaces),
            )
        };
        // Reapers that finish from here on find nothing to remove
        let processes = std::mem::take(&mut *self.processes.lock());

        if was_frozen {
            if let Some(handle) = groups.get(&SubsystemName::freezer()) {
                if let Err(e) = self
                    .backend
                    .resources
                    .set_freeze_state(handle, FreezeState::Thawed)
                {
                    warn!(sandbox_id = %self.id, error = %e, "Failed to thaw during teardown");
                }
            }
        }

        for pid in processes {
            if let Err(e) = self.backend.launcher.terminate(pid) {
                warn!(sandbox_id = %self.id, pid, error = %e, "Failed to kill process");
            }
        }

        for iface in &interfaces {
            if let Err(e) = self.backend.network.detach(&self.netns, iface).await {
                warn!(sandbox_id = %self.id, iface = %iface, error = %e, "Failed to detach interface");
            }
        }

        for (subsystem, handle) in &groups {
            if let Err(e) = self.backend.resources.release(handle) {
                warn!(sandbox_id = %self.id, subsystem = %subsystem, error = %e, "Failed to release group");
            }
        }

        info!(sandbox_id = %self.id, "Sandbox torn down");
        true
    }
}

impl SandboxOps for Sandbox {
    fn exec(&self, req: ExecRequest) -> impl Future<Output = SandboxResult<ExecOutcome>> + Send {
        Sandbox::exec(self, req)
    }

    fn add_net_iface(&self, iface: InterfaceRef) -> impl Future<Output = SandboxResult<()>> + Send {
        Sandbox::add_net_iface(self, iface)
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("id", &self.id)
            .field("state", &self.state())
            .field("netns", &self.netns)
            .finish()
    }
}
