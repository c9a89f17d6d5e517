/*!
 * Cgroup Filesystem Integration Tests
 * Controller over a fake per-controller hierarchy in a temp directory
 */

use pretty_assertions::assert_eq;
use sandbox_controller::oom::OomSource;
use sandbox_controller::resources::{ResourceGroupManager, ResourcePlatform};
use sandbox_controller::{
    ControllerConfig, ExecRequest, SandboxController, SandboxState, SimulationBackend,
    SubsystemName, SubsystemSpec,
};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::time::timeout;

const PREFIX: &str = "sandboxd-test";

fn fake_hierarchy(subsystems: &[&str]) -> TempDir {
    let dir = TempDir::new().unwrap();
    for name in subsystems {
        let sub = dir.path().join(name);
        fs::create_dir_all(&sub).unwrap();
        fs::write(sub.join("cgroup.procs"), "").unwrap();
    }
    dir
}

fn controller(root: &Path, subsystems: Vec<SubsystemSpec>) -> (SandboxController, SimulationBackend) {
    let sim = SimulationBackend::new();
    let mut backend = sim
        .backend()
        .with_resources(ResourceGroupManager::with_cgroupfs(root, PREFIX));
    backend.oom = OomSource::cgroupfs(Duration::from_millis(10));

    let config = ControllerConfig {
        cgroup_root: root.to_path_buf(),
        group_prefix: PREFIX.to_string(),
        oom_poll_interval_ms: 10,
        ..ControllerConfig::simulation().with_subsystems(subsystems)
    };
    (SandboxController::with_backend(backend, &config), sim)
}

#[test]
fn test_discovery_lists_mounted_controllers() {
    let root = fake_hierarchy(&["freezer", "memory"]);
    fs::create_dir_all(root.path().join("not-a-controller")).unwrap();

    let manager = ResourceGroupManager::with_cgroupfs(root.path(), PREFIX);
    assert_eq!(manager.platform(), ResourcePlatform::CgroupFs);
    let names: Vec<_> = manager.capabilities().names().map(|n| n.to_string()).collect();
    assert_eq!(names, vec!["freezer", "memory"]);
}

#[tokio::test]
async fn test_create_makes_group_directories() {
    let root = fake_hierarchy(&["freezer", "memory"]);
    let (ctl, _sim) = controller(
        root.path(),
        vec![
            SubsystemSpec::optional("freezer"),
            SubsystemSpec::optional("memory"),
            SubsystemSpec::optional("cpu"),
        ],
    );

    let id = ctl.create().unwrap();
    for sub in ["freezer", "memory"] {
        assert!(root.path().join(sub).join(PREFIX).join(id.as_str()).is_dir());
    }
    assert!(!root.path().join("cpu").exists());
}

#[tokio::test]
async fn test_exec_and_freeze_write_control_files() {
    let root = fake_hierarchy(&["freezer"]);
    let (ctl, _sim) = controller(root.path(), vec![SubsystemSpec::required("freezer")]);
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();
    let group = root.path().join("freezer").join(PREFIX).join(id.as_str());

    let pid = sandbox.exec(ExecRequest::new("idle")).await.unwrap().pid;
    assert_eq!(fs::read_to_string(group.join("cgroup.procs")).unwrap(), pid.to_string());

    sandbox.freeze().await.unwrap();
    assert_eq!(fs::read_to_string(group.join("freezer.state")).unwrap(), "FROZEN");

    sandbox.thaw().await.unwrap();
    assert_eq!(fs::read_to_string(group.join("freezer.state")).unwrap(), "THAWED");
    assert_eq!(sandbox.state(), SandboxState::Running);
}

#[tokio::test]
async fn test_oom_counter_increments_reach_subscribers() {
    let root = fake_hierarchy(&["memory"]);
    let (ctl, _sim) = controller(root.path(), vec![SubsystemSpec::required("memory")]);
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();

    let group = sandbox.resource_groups()[&SubsystemName::memory()]
        .path
        .clone()
        .unwrap();
    let events = group.join("memory.events");
    fs::write(&events, "low 0\nhigh 0\nmax 0\noom 0\noom_kill 0\n").unwrap();

    let mut sub = sandbox.subscribe().unwrap();
    fs::write(&events, "low 0\nhigh 0\nmax 4\noom 2\noom_kill 2\n").unwrap();

    for _ in 0..2 {
        assert!(timeout(Duration::from_secs(2), sub.recv())
            .await
            .unwrap()
            .is_some());
    }

    ctl.remove(&id).await.unwrap();
    assert_eq!(timeout(Duration::from_secs(2), sub.recv()).await.unwrap(), None);
}

#[tokio::test]
async fn test_oom_stream_survives_unreadable_counters() {
    let root = fake_hierarchy(&["memory"]);
    let (ctl, _sim) = controller(root.path(), vec![SubsystemSpec::required("memory")]);
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();

    let group = sandbox.resource_groups()[&SubsystemName::memory()]
        .path
        .clone()
        .unwrap();
    let events = group.join("memory.events");
    fs::write(&events, "oom 0\noom_kill 0\n").unwrap();
    let mut sub = sandbox.subscribe().unwrap();

    fs::remove_file(&events).unwrap();
    assert!(timeout(Duration::from_millis(200), sub.recv()).await.is_err());
    assert_eq!(sandbox.state(), SandboxState::Created);

    fs::write(&events, "oom 1\noom_kill 1\n").unwrap();
    assert!(timeout(Duration::from_secs(2), sub.recv())
        .await
        .unwrap()
        .is_some());

    ctl.remove(&id).await.unwrap();
    assert_eq!(timeout(Duration::from_secs(2), sub.recv()).await.unwrap(), None);
}

#[tokio::test]
async fn test_memory_group_without_counters_fails_open() {
    let root = fake_hierarchy(&["memory"]);
    let (ctl, _sim) = controller(root.path(), vec![SubsystemSpec::required("memory")]);
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    assert!(matches!(
        sandbox.subscribe(),
        Err(sandbox_controller::SandboxError::Open(_))
    ));
}
