//! Static-mode lifecycle tests: no registry, caller-supplied topology.

use std::sync::{Arc, Mutex};

use slotcluster::{Cluster, ClusterState, Error};

type Captured = Arc<Mutex<Vec<ClusterState>>>;

fn capture_rebalances(cluster: &Cluster) -> Captured {
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    cluster
        .set_rebalance_callback(move |_, state| {
            sink.lock().unwrap().push(state);
        })
        .unwrap();
    states
}

#[tokio::test]
async fn join_fires_one_callback_with_the_static_topology() {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.set_static_index(3).unwrap();
    cluster.set_static_total(10).unwrap();
    cluster.set_workers(2).unwrap();
    let states = capture_rebalances(&cluster);

    cluster.join().await.unwrap();

    assert_eq!(
        states.lock().unwrap().as_slice(),
        &[ClusterState {
            index: 3,
            workers: 2,
            total: 10,
            passive: false
        }]
    );
    assert_eq!(cluster.state().index, 3);
    assert_eq!(cluster.state().total, 10);

    cluster.leave().await.unwrap();
    assert!(!cluster.joined());
}

#[tokio::test]
async fn repeated_join_is_a_no_op() {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.set_static_total(4).unwrap();
    let states = capture_rebalances(&cluster);

    cluster.join().await.unwrap();
    cluster.join().await.unwrap();

    assert_eq!(states.lock().unwrap().len(), 1);
    cluster.leave().await.unwrap();
}

#[tokio::test]
async fn join_rejects_an_overflowing_index() {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.set_static_index(9).unwrap();
    cluster.set_static_total(10).unwrap();
    cluster.set_workers(2).unwrap();

    assert!(matches!(cluster.join().await, Err(Error::Invalid(_))));
    assert!(!cluster.joined());
}

#[tokio::test]
async fn join_accepts_an_exactly_full_topology() {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.set_static_index(8).unwrap();
    cluster.set_static_total(10).unwrap();
    cluster.set_workers(2).unwrap();

    cluster.join().await.unwrap();
    assert_eq!(cluster.state().index, 8);
    cluster.leave().await.unwrap();
}

#[tokio::test]
async fn passive_static_member_observes_without_an_index() {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.set_static_total(7).unwrap();
    let states = capture_rebalances(&cluster);

    cluster.join_passive().await.unwrap();

    assert_eq!(
        states.lock().unwrap().as_slice(),
        &[ClusterState {
            index: -1,
            workers: 0,
            total: 7,
            passive: true
        }]
    );
    cluster.leave().await.unwrap();
}

#[tokio::test]
async fn configuration_is_frozen_while_joined() {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.set_static_total(4).unwrap();
    cluster.join().await.unwrap();

    assert!(matches!(
        cluster.set_environment("staging"),
        Err(Error::NotPermitted)
    ));
    assert!(matches!(
        cluster.set_instance_id("node1"),
        Err(Error::NotPermitted)
    ));
    assert!(matches!(cluster.set_workers(3), Err(Error::NotPermitted)));
    assert!(matches!(
        cluster.set_registry(Some("http://127.0.0.1:2379")),
        Err(Error::NotPermitted)
    ));
    assert!(matches!(
        cluster.set_static_index(1),
        Err(Error::NotPermitted)
    ));

    // Verbose and logger changes stay permitted.
    cluster.set_verbose(true);
    cluster.set_logger(|_, _| {});

    cluster.leave().await.unwrap();
    cluster.set_environment("staging").unwrap();
    assert_eq!(cluster.environment(), "staging");
}

#[tokio::test]
async fn leave_before_join_is_a_no_op() {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.leave().await.unwrap();
    assert!(!cluster.joined());
}

#[test]
fn create_validates_the_cluster_key() {
    assert!(Cluster::create("my-service").is_ok());
    assert!(matches!(Cluster::create(""), Err(Error::Invalid(_))));
    assert!(matches!(
        Cluster::create("not a key"),
        Err(Error::Invalid(_))
    ));
    assert!(matches!(
        Cluster::create(&"x".repeat(33)),
        Err(Error::Invalid(_))
    ));
}

#[test]
fn defaults_match_the_documented_configuration() {
    let cluster = Cluster::create("my-service").unwrap();
    assert_eq!(cluster.key(), "my-service");
    assert_eq!(cluster.environment(), slotcluster::DEFAULT_ENVIRONMENT);
    assert_eq!(cluster.partition(), None);
    assert_eq!(cluster.instance_id().len(), 32);
    let state = cluster.state();
    assert_eq!(state.index, -1);
    assert_eq!(state.total, 0);
}

#[test]
fn unrecognized_registry_schemes_are_rejected() {
    let cluster = Cluster::create("my-service").unwrap();
    assert!(matches!(
        cluster.set_registry(Some("redis://localhost:6379")),
        Err(Error::Invalid(_))
    ));
    cluster.set_registry(Some("http://127.0.0.1:2379")).unwrap();
    cluster.set_registry(None).unwrap();
}
