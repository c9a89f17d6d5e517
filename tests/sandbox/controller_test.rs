/*!
 * Controller Registry Tests
 * Creation policy, lookup, listing, and removal semantics
 */

use crate::common::{simulated, simulated_with};
use pretty_assertions::assert_eq;
use sandbox_controller::resources::ResourceError;
use sandbox_controller::{
    SandboxError, SandboxLifecycle, SandboxState, SimulationBackend, SubsystemName, SubsystemSpec,
};
use std::collections::HashSet;
use std::sync::Arc;

#[tokio::test]
async fn test_get_after_create_then_remove() {
    let (ctl, _sim) = simulated();

    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();
    assert_eq!(sandbox.state(), SandboxState::Created);
    assert_eq!(sandbox.id(), &id);

    ctl.remove(&id).await.unwrap();
    assert_eq!(ctl.get(&id).unwrap_err(), SandboxError::NotFound(id.clone()));
}

#[tokio::test]
async fn test_second_remove_is_not_found() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();

    ctl.remove(&id).await.unwrap();
    assert!(matches!(
        ctl.remove(&id).await,
        Err(SandboxError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_concurrent_remove_single_winner() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let ctl = ctl.clone();
        let id = id.clone();
        tasks.push(tokio::spawn(async move { ctl.remove(&id).await }));
    }

    let mut wins = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(()) => wins += 1,
            Err(e) => assert!(matches!(e, SandboxError::NotFound(_))),
        }
    }
    assert_eq!(wins, 1);
}

#[tokio::test]
async fn test_list_returns_exactly_live_ids() {
    let (ctl, _sim) = simulated();
    let s1 = ctl.create().unwrap();
    let s2 = ctl.create().unwrap();
    let s3 = ctl.create().unwrap();
    ctl.remove(&s3).await.unwrap();

    let listed: HashSet<_> = ctl.list().into_iter().collect();
    assert_eq!(listed, HashSet::from([s1, s2]));
}

#[test]
fn test_empty_registry_lists_nothing() {
    let (ctl, _sim) = simulated();
    assert!(ctl.list().is_empty());
    assert!(matches!(
        ctl.get(&"missing".into()),
        Err(SandboxError::NotFound(_))
    ));
}

#[test]
fn test_absent_optional_subsystem_still_creates() {
    // freezer present, cpu absent
    let sim = SimulationBackend::with_subsystems(["freezer"]);
    let ctl = simulated_with(
        &sim,
        vec![
            SubsystemSpec::optional("freezer"),
            SubsystemSpec::optional("cpu"),
        ],
    );

    let id = ctl.create().unwrap();
    let groups = ctl.get(&id).unwrap().resource_groups();
    assert!(groups.contains_key(&SubsystemName::freezer()));
    assert!(!groups.contains_key(&SubsystemName::cpu()));
}

#[test]
fn test_absent_required_subsystem_fails_creation() {
    let sim = SimulationBackend::with_subsystems(["freezer"]);
    let ctl = simulated_with(
        &sim,
        vec![
            SubsystemSpec::optional("freezer"),
            SubsystemSpec::required("cpu"),
        ],
    );

    assert!(matches!(ctl.create(), Err(SandboxError::Creation(_))));
    // freezer group joined before the failure was rolled back
    assert_eq!(sim.resources.group_count(), 0);
    assert!(ctl.list().is_empty());
}

#[test]
fn test_non_not_found_join_error_fails_creation() {
    let sim = SimulationBackend::new();
    sim.resources.fail_joins(
        "memory",
        ResourceError::PermissionDenied("memory.limit_in_bytes".into()),
    );
    let ctl = simulated_with(
        &sim,
        vec![
            SubsystemSpec::optional("freezer"),
            SubsystemSpec::optional("memory"),
        ],
    );

    let err = ctl.create().unwrap_err();
    assert!(matches!(err, SandboxError::Creation(_)));
    assert_eq!(sim.resources.group_count(), 0);
}

#[tokio::test]
async fn test_remove_releases_groups() {
    let (ctl, sim) = simulated();
    let id = ctl.create().unwrap();
    assert_eq!(sim.resources.group_count(), 3);

    ctl.remove(&id).await.unwrap();
    assert_eq!(sim.resources.group_count(), 0);
}

#[tokio::test]
async fn test_held_handle_sees_removed_state() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();

    ctl.remove(&id).await.unwrap();
    assert_eq!(sandbox.state(), SandboxState::Removed);
    assert_eq!(Arc::strong_count(&sandbox), 1);
}

#[tokio::test]
async fn test_info_and_stats() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();

    let info = ctl.info(&id).unwrap();
    assert_eq!(info.id, id);
    assert_eq!(info.state, SandboxState::Created);
    assert_eq!(info.subsystems, vec!["cpu", "freezer", "memory"]);
    assert_eq!(info.subscribers, 0);

    ctl.remove(&id).await.unwrap();
    assert!(ctl.info(&id).is_err());

    let stats = ctl.stats();
    assert_eq!((stats.created, stats.removed, stats.active), (1, 1, 0));
}

#[test]
fn test_capabilities_reflect_backend() {
    let sim = SimulationBackend::with_subsystems(["memory"]);
    let ctl = simulated_with(&sim, vec![SubsystemSpec::optional("memory")]);

    assert!(ctl.capabilities().supports(&SubsystemName::memory()));
    assert!(!ctl.capabilities().supports(&SubsystemName::freezer()));
}

#[tokio::test]
async fn test_generic_lifecycle_usage() {
    async fn churn<L: SandboxLifecycle>(lifecycle: &L) -> usize {
        let id = lifecycle.create().unwrap();
        let before = lifecycle.list().len();
        lifecycle.remove(&id).await.unwrap();
        before
    }

    let (ctl, _sim) = simulated();
    assert_eq!(churn(&ctl).await, 1);
    assert!(ctl.list().is_empty());
}
