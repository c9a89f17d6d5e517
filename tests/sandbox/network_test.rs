/*!
 * Interface Attachment Tests
 */

use crate::common::simulated;
use pretty_assertions::assert_eq;
use sandbox_controller::network::NetworkError;
use sandbox_controller::{InterfaceRef, SandboxError};

#[tokio::test]
async fn test_same_interface_twice_single_membership() {
    let (ctl, sim) = simulated();
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    sandbox.add_net_iface(InterfaceRef::new("veth0")).await.unwrap();
    sandbox.add_net_iface(InterfaceRef::new("veth0")).await.unwrap();

    assert_eq!(sandbox.interfaces(), vec![InterfaceRef::new("veth0")]);
    assert_eq!(sim.network.attach_calls(), 1);
    assert_eq!(
        sim.network.attached(sandbox.netns()),
        vec![InterfaceRef::new("veth0")]
    );
}

#[tokio::test]
async fn test_concurrent_attaches_are_serialized() {
    let (ctl, sim) = simulated();
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let sandbox = sandbox.clone();
        tasks.push(tokio::spawn(async move {
            sandbox.add_net_iface(InterfaceRef::new("eth1")).await
        }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(sim.network.attach_calls(), 1);
    assert_eq!(sandbox.interfaces().len(), 1);
}

#[tokio::test]
async fn test_attach_on_removed_sandbox_fails() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();
    ctl.remove(&id).await.unwrap();

    assert!(matches!(
        sandbox.add_net_iface(InterfaceRef::new("veth0")).await,
        Err(SandboxError::Attach(_))
    ));
    assert!(sandbox.interfaces().is_empty());
}

#[tokio::test]
async fn test_attach_failure_leaves_membership_unchanged() {
    let (ctl, sim) = simulated();
    sim.network.fail_attach(
        "ghost0",
        NetworkError::InterfaceNotFound("ghost0".into()),
    );
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    assert!(matches!(
        sandbox.add_net_iface(InterfaceRef::new("ghost0")).await,
        Err(SandboxError::Attach(_))
    ));
    assert!(sandbox.interfaces().is_empty());
}

#[tokio::test]
async fn test_remove_detaches_interfaces() {
    let (ctl, sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();
    sandbox.add_net_iface(InterfaceRef::new("veth0")).await.unwrap();
    sandbox.add_net_iface(InterfaceRef::with_index("veth1", 7)).await.unwrap();
    let netns = sandbox.netns().to_path_buf();

    ctl.remove(&id).await.unwrap();
    assert!(sim.network.attached(&netns).is_empty());
    assert!(sandbox.interfaces().is_empty());
}

#[tokio::test]
async fn test_netns_path_is_per_sandbox() {
    let (ctl, _sim) = simulated();
    let a = ctl.get(&ctl.create().unwrap()).unwrap();
    let b = ctl.get(&ctl.create().unwrap()).unwrap();

    assert_ne!(a.netns(), b.netns());
    assert!(a.netns().ends_with(a.id().as_str()));
}

#[tokio::test]
async fn test_index_does_not_create_second_membership() {
    let (ctl, sim) = simulated();
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    sandbox.add_net_iface(InterfaceRef::new("eth1")).await.unwrap();
    sandbox
        .add_net_iface(InterfaceRef::with_index("eth1", 5))
        .await
        .unwrap();

    assert_eq!(sandbox.interfaces().len(), 1);
    assert_eq!(sim.network.attach_calls(), 1);
}
