/*!
 * OOM Subscription Tests
 * Broadcast delivery and closure on teardown
 */

use crate::common::{controller_on, simulated, simulated_with};
use futures::StreamExt;
use pretty_assertions::assert_eq;
use sandbox_controller::oom::SimulationOomSource;
use sandbox_controller::{
    ControllerConfig, SandboxError, SimulationBackend, SubsystemSpec,
};
use std::time::Duration;
use tokio::time::timeout;

const BOUND: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_every_subscriber_sees_every_event() {
    let (ctl, sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();

    let mut first = sandbox.subscribe().unwrap();
    let mut second = sandbox.subscribe().unwrap();
    assert_ne!(first.id(), second.id());
    assert_eq!(sim.oom.open_monitors(id.as_str()), 1);

    assert_eq!(sim.oom.trigger(id.as_str()), 1);
    assert_eq!(sim.oom.trigger(id.as_str()), 1);

    for sub in [&mut first, &mut second] {
        let a = timeout(BOUND, sub.recv()).await.unwrap().unwrap();
        let b = timeout(BOUND, sub.recv()).await.unwrap().unwrap();
        assert!(a.observed_at <= b.observed_at);
    }
    assert_eq!(sandbox.oom_events_delivered(), 2);
}

#[tokio::test]
async fn test_blocked_reader_observes_closure_after_remove() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();
    let mut sub = sandbox.subscribe().unwrap();

    let reader = tokio::spawn(async move { sub.recv().await });
    tokio::task::yield_now().await;

    ctl.remove(&id).await.unwrap();
    let last = timeout(BOUND, reader).await.unwrap().unwrap();
    assert_eq!(last, None);
    assert!(matches!(ctl.get(&id), Err(SandboxError::NotFound(_))));
}

#[tokio::test]
async fn test_stream_ends_for_stream_consumers() {
    let (ctl, sim) = simulated();
    let id = ctl.create().unwrap();
    let sub = ctl.get(&id).unwrap().subscribe().unwrap();

    sim.oom.trigger(id.as_str());
    tokio::task::yield_now().await;
    let ctl2 = ctl.clone();
    let id2 = id.clone();
    tokio::spawn(async move { ctl2.remove(&id2).await });

    let events: Vec<_> = timeout(BOUND, sub.collect::<Vec<_>>()).await.unwrap();
    assert!(events.len() <= 1);
}

#[tokio::test]
async fn test_subscribe_after_remove_is_invalid_state() {
    let (ctl, _sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();
    ctl.remove(&id).await.unwrap();

    assert!(matches!(
        sandbox.subscribe(),
        Err(SandboxError::InvalidState { .. })
    ));
}

#[tokio::test]
async fn test_subscribe_without_memory_group_fails_open() {
    let sim = SimulationBackend::with_subsystems(["freezer"]);
    let ctl = simulated_with(&sim, vec![SubsystemSpec::optional("memory")]);
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    assert!(matches!(sandbox.subscribe(), Err(SandboxError::Open(_))));
}

#[tokio::test]
async fn test_subscribe_unsupported_source_fails_open() {
    let sim = SimulationBackend {
        oom: SimulationOomSource::unsupported(),
        ..SimulationBackend::new()
    };
    let ctl = controller_on(&sim, ControllerConfig::simulation());
    let sandbox = ctl.get(&ctl.create().unwrap()).unwrap();

    assert!(matches!(sandbox.subscribe(), Err(SandboxError::Open(_))));
}

#[tokio::test]
async fn test_unsubscribe_closes_only_that_stream() {
    let (ctl, sim) = simulated();
    let id = ctl.create().unwrap();
    let sandbox = ctl.get(&id).unwrap();

    let mut kept = sandbox.subscribe().unwrap();
    let mut dropped = sandbox.subscribe().unwrap();

    assert!(sandbox.unsubscribe(dropped.id()));
    assert!(!sandbox.unsubscribe(dropped.id()));
    assert_eq!(timeout(BOUND, dropped.recv()).await.unwrap(), None);

    sim.oom.trigger(id.as_str());
    assert!(timeout(BOUND, kept.recv()).await.unwrap().is_some());
    assert_eq!(sandbox.info().subscribers, 1);
}

#[tokio::test]
async fn test_remove_closes_monitor() {
    let (ctl, sim) = simulated();
    let id = ctl.create().unwrap();
    let _sub = ctl.get(&id).unwrap().subscribe().unwrap();
    assert_eq!(sim.oom.open_monitors(id.as_str()), 1);

    ctl.remove(&id).await.unwrap();
    // the aborted pump drops its monitor once the runtime reaps the task
    timeout(BOUND, async {
        while sim.oom.trigger(id.as_str()) != 0 {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();
    assert_eq!(sim.oom.open_monitors(id.as_str()), 0);
}
