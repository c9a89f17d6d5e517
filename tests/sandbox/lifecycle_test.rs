/*!
 * Sandbox Lifecycle Tests
 * Exec, freeze and thaw against the state machine
 */

use crate::common::{simulated, simulated_with};
use pretty_assertions::assert_eq;
use sandbox_controller::exec::{CommandLauncher, ExecError, HostLauncher};
use sandbox_controller::resources::FreezeState;
use sandbox_controller::{
    ControllerConfig, ExecRequest, SandboxController, SandboxError, SandboxOps, SandboxState,
    SimulationBackend, SubsystemName, SubsystemSpec,
};
use std::time::Duration;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_exec_on_removed_sandbox_is_invalid_state() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();
    ctl.remove(&id).await.unwrap();

    let err = sandbox.exec(ExecRequest::new("true")).await.unwrap_err();
    assert_eq!(
        err,
        SandboxError::InvalidState {
            id,
            state: SandboxState::Removed
        }
    );
}

#[tokio::test]
async fn test_freeze_blocks_exec_until_thaw() {
    let (ctl, sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();

    assert_ok!(sandbox.freeze().await);
    assert_eq!(sandbox.state(), SandboxState::Frozen);
    assert_eq!(
        sandbox.exec(ExecRequest::new("true")).await.unwrap_err(),
        SandboxError::FrozenState(id.clone())
    );
    assert!(sim.launcher.launches().is_empty());

    assert_ok!(sandbox.thaw().await);
    assert_eq!(sandbox.state(), SandboxState::Running);
    let outcome = sandbox.exec(ExecRequest::new("true")).await.unwrap();
    assert_eq!(sim.launcher.launches()[0].0, outcome.pid);
}

#[tokio::test]
async fn test_freeze_without_freezer_is_logical_only() {
    let sim = SimulationBackend::with_subsystems(["memory"]);
    let ctl = simulated_with(&sim, vec![SubsystemSpec::optional("freezer")]);
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();
    assert!(sandbox.resource_groups().is_empty());

    assert_ok!(sandbox.freeze().await);
    assert_eq!(sandbox.state(), SandboxState::Frozen);
    assert!(matches!(
        sandbox.exec(ExecRequest::new("true")).await,
        Err(SandboxError::FrozenState(_))
    ));
}

#[tokio::test]
async fn test_freeze_and_thaw_are_idempotent() {
    let (ctl, sim) = simulated();
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();
    let freezer = sandbox.resource_groups()[&SubsystemName::freezer()].clone();

    // thaw of a non-frozen sandbox changes nothing
    assert_ok!(sandbox.thaw().await);
    assert_eq!(sandbox.state(), SandboxState::Created);

    assert_ok!(sandbox.freeze().await);
    assert_ok!(sandbox.freeze().await);
    assert_eq!(sim.resources.freeze_state(&freezer), Some(FreezeState::Frozen));

    assert_ok!(sandbox.thaw().await);
    assert_ok!(sandbox.thaw().await);
    assert_eq!(sim.resources.freeze_state(&freezer), Some(FreezeState::Thawed));
}

#[tokio::test]
async fn test_freeze_thaw_on_removed_is_invalid_state() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();
    ctl.remove(&id).await.unwrap();

    assert!(matches!(
        sandbox.freeze().await,
        Err(SandboxError::InvalidState { .. })
    ));
    assert!(matches!(
        sandbox.thaw().await,
        Err(SandboxError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_exec_places_process_in_every_group() {
    let (ctl, sim) = simulated();
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    let req = ExecRequest::new("/usr/bin/worker")
        .args(["--threads", "2"])
        .env("MODE", "batch");
    let outcome = sandbox.exec(req.clone()).await.unwrap();
    assert_eq!(outcome.exit_code, None);

    for handle in sandbox.resource_groups().values() {
        assert_eq!(sim.resources.members(handle), vec![outcome.pid]);
    }

    let launches = sim.launcher.launches();
    assert_eq!(launches, vec![(outcome.pid, req)]);
}

#[tokio::test]
async fn test_concurrent_execs_all_launch() {
    let (ctl, sim) = simulated();
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    let mut tasks = Vec::new();
    for i in 0..16 {
        let sandbox = sandbox.clone();
        tasks.push(tokio::spawn(async move {
            sandbox.exec(ExecRequest::new(format!("job-{}", i))).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(sim.launcher.launches().len(), 16);
    assert_eq!(sandbox.processes().len(), 16);
    assert_eq!(sandbox.state(), SandboxState::Running);
}

#[tokio::test]
async fn test_wait_mode_returns_exit_code() {
    let (ctl, sim) = simulated();
    sim.launcher.set_exit_code("make", 2);
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    let outcome = sandbox.exec(ExecRequest::new("make").wait()).await.unwrap();
    assert_eq!(outcome.exit_code, Some(2));
    assert!(sandbox.processes().is_empty());
}

#[tokio::test]
async fn test_launch_failure_surfaces_as_exec_error() {
    let (ctl, sim) = simulated();
    sim.launcher.fail_command(
        "nonexistent",
        ExecError::SpawnFailed {
            command: "nonexistent".into(),
            reason: "No such file or directory".into(),
        },
    );
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    assert!(matches!(
        sandbox.exec(ExecRequest::new("nonexistent")).await,
        Err(SandboxError::Exec(_))
    ));
    // a failed launch does not start the sandbox
    assert_eq!(sandbox.state(), SandboxState::Created);
}

#[tokio::test]
async fn test_remove_kills_detached_processes() {
    let (ctl, sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();

    let a = sandbox.exec(ExecRequest::new("a")).await.unwrap().pid;
    let b = sandbox.exec(ExecRequest::new("b")).await.unwrap().pid;
    sandbox.freeze().await.unwrap();

    ctl.remove(&id).await.unwrap();
    let mut killed = sim.launcher.terminated();
    killed.sort();
    assert_eq!(killed, vec![a, b]);
}

#[tokio::test]
async fn test_ops_trait_dispatch() {
    async fn run<S: SandboxOps>(ops: &S) -> u32 {
        ops.exec(ExecRequest::new("true")).await.unwrap().pid
    }

    let (ctl, sim) = simulated();
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();
    let pid = run(sandbox.as_ref()).await;
    assert_eq!(sim.launcher.launches()[0].0, pid);
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_exited_detached_processes_are_pruned() {
    let sim = SimulationBackend::new();
    let mut backend = sim.backend();
    backend.launcher = CommandLauncher::Host(HostLauncher::new());
    let ctl = SandboxController::with_backend(backend, &ControllerConfig::simulation());
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();

    for _ in 0..5 {
        sandbox.exec(ExecRequest::new("/bin/true")).await.unwrap();
    }

    let pruned = tokio::time::timeout(Duration::from_secs(5), async {
        while !sandbox.processes().is_empty() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
    assert!(pruned.is_ok(), "still tracked: {:?}", sandbox.processes());
    assert_eq!(sandbox.info().processes, 0);
}
