//! Fork protocol tests.
//!
//! The protocol's three calls are exercised in-process: `prepare_fork`
//! quiesces the loops and zeroes the assignment, and the after-fork calls
//! resume or relinquish membership per the configured policy.

use std::sync::{Arc, Mutex};

use serial_test::serial;
use slotcluster::{Cluster, ClusterState, ForkPolicy};

type Captured = Arc<Mutex<Vec<ClusterState>>>;

fn temp_registry_uri() -> String {
    let path = std::env::temp_dir().join(format!(
        "slotcluster-fork-{}.db",
        uuid::Uuid::new_v4().simple()
    ));
    format!("sqlite://{}?mode=rwc", path.display())
}

fn member(uri: &str, instance_id: &str, policy: ForkPolicy) -> (Cluster, Captured) {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.set_registry(Some(uri)).unwrap();
    cluster.set_instance_id(instance_id).unwrap();
    cluster.set_workers(2).unwrap();
    cluster.set_fork_policy(policy).unwrap();
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    cluster
        .set_rebalance_callback(move |_, state| {
            sink.lock().unwrap().push(state);
        })
        .unwrap();
    (cluster, states)
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn prepare_zeroes_the_assignment_and_keeps_joined() {
    let uri = temp_registry_uri();
    let (cluster, states) = member(&uri, "node1", ForkPolicy::ParentOnly);
    cluster.join().await.unwrap();
    assert_eq!(cluster.state().index, 0);

    cluster.prepare_fork().await;

    assert!(cluster.joined(), "prepare must preserve the joined flag");
    let last = states.lock().unwrap().last().copied().unwrap();
    assert_eq!((last.index, last.total), (-1, 0));

    cluster.leave().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn parent_resumes_membership_under_parent_policy() {
    let uri = temp_registry_uri();
    let (cluster, _states) = member(&uri, "node1", ForkPolicy::ParentOnly);
    cluster.join().await.unwrap();

    cluster.prepare_fork().await;
    cluster.after_fork_parent().await.unwrap();

    assert!(cluster.joined());
    assert_eq!(cluster.state().index, 0);
    assert_eq!(cluster.state().total, 2);

    cluster.leave().await.unwrap();
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn child_is_left_out_when_policy_excludes_it() {
    let uri = temp_registry_uri();
    let (cluster, _states) = member(&uri, "node1", ForkPolicy::ParentOnly);
    cluster.join().await.unwrap();

    cluster.prepare_fork().await;
    cluster.after_fork_child().await.unwrap();

    assert!(!cluster.joined());
    assert_eq!(cluster.state().index, -1);
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn parent_is_left_out_under_the_default_child_policy() {
    let uri = temp_registry_uri();
    let (cluster, _states) = member(&uri, "node1", ForkPolicy::ChildOnly);
    cluster.join().await.unwrap();

    cluster.prepare_fork().await;
    cluster.after_fork_parent().await.unwrap();

    assert!(!cluster.joined());
}

#[tokio::test(flavor = "multi_thread")]
#[serial]
async fn both_policy_gives_the_child_a_fresh_identity() {
    let uri = temp_registry_uri();
    let (cluster, _states) = member(&uri, "node1", ForkPolicy::Both);
    cluster.join().await.unwrap();
    let parent_id = cluster.instance_id();

    cluster.prepare_fork().await;
    cluster.after_fork_child().await.unwrap();

    assert_ne!(cluster.instance_id(), parent_id);
    assert!(cluster.joined());
    assert_eq!(cluster.state().total, 2);

    cluster.leave().await.unwrap();
}

#[tokio::test]
async fn static_members_rejoin_through_the_fork_dance() {
    let cluster = Cluster::create("my-service").unwrap();
    cluster.set_static_index(3).unwrap();
    cluster.set_static_total(10).unwrap();
    cluster.set_workers(2).unwrap();
    let states = Arc::new(Mutex::new(Vec::new()));
    let sink = states.clone();
    cluster
        .set_rebalance_callback(move |_, state| {
            sink.lock().unwrap().push(state);
        })
        .unwrap();

    cluster.join().await.unwrap();
    cluster.prepare_fork().await;
    cluster.after_fork_child().await.unwrap();

    assert!(cluster.joined());
    let last = states.lock().unwrap().last().copied().unwrap();
    assert_eq!((last.index, last.total), (3, 10));

    cluster.leave().await.unwrap();
}
