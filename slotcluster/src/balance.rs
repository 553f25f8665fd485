use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::cluster::Cluster;
use crate::logging::LogLevel;
use crate::registry::{ChangeWait, Registry};

/// Backoff after a change-wait error before trying again.
const WAIT_ERROR_BACKOFF: Duration = Duration::from_secs(30);

/// Fold a registry snapshot into this member's `(base, total)`.
///
/// The snapshot must already be sorted ascending by instance ID; `base` is
/// the prefix sum of worker counts before our own entry, or `-1` when we
/// are absent or passive. Duplicate IDs should not occur, but if one does
/// the first occurrence keeps its base and later matches only contribute
/// to the total.
pub(crate) fn compute(snapshot: &[(String, i32)], instance_id: &str, passive: bool) -> (i32, i32) {
    let mut total = 0;
    let mut base = -1;
    for (id, workers) in snapshot {
        if base == -1 && !passive && id == instance_id {
            base = total;
        }
        total += workers;
    }
    (base, total)
}

/// Publish a new assignment if it differs from the current one, then fire
/// the rebalance callback with no lock held. The caller must not hold the
/// membership lock.
pub(crate) fn apply(cluster: &Cluster, base: i32, total: i32) {
    let (callback, view) = {
        let mut st = cluster.shared().write();
        if base == st.base && total == st.total {
            return;
        }
        if base == -1 {
            st.log(
                LogLevel::Notice,
                &format!(
                    "this instance is no longer a member of {}",
                    st.scope_label()
                ),
            );
        } else {
            st.log(
                LogLevel::Notice,
                &format!(
                    "cluster {} has re-balanced: new base is {} (was {}), new total is {} (was {})",
                    st.scope_label(),
                    base,
                    st.base,
                    total,
                    st.total
                ),
            );
        }
        st.base = base;
        st.total = total;
        (st.balancer.clone(), st.snapshot_state())
    };
    tracing::info!(
        index = view.index,
        workers = view.workers,
        total = view.total,
        "assignment updated"
    );
    if let Some(cb) = callback {
        cb(cluster, view);
    }
}

/// Run one balance pass over a snapshot: compute and publish.
pub(crate) fn commit(cluster: &Cluster, snapshot: &[(String, i32)]) {
    let (instance_id, passive) = {
        let st = cluster.shared().read();
        if st.verbose {
            st.log(
                LogLevel::Debug,
                &format!("re-balancing cluster {}", st.scope_label()),
            );
            let mut prefix = 0;
            for (id, workers) in snapshot {
                let marker = if *id == st.instance_id && !st.passive {
                    '*'
                } else {
                    ' '
                };
                st.log(LogLevel::Debug, &format!("{marker} {id} [{prefix}]"));
                prefix += workers;
            }
        }
        (st.instance_id.clone(), st.passive)
    };
    let (base, total) = compute(snapshot, &instance_id, passive);
    apply(cluster, base, total);
}

/// Watch/balance loop: wait for the registry scope to change, then
/// recompute the assignment. Exits when the leaving flag is set; the
/// registry handle is owned exclusively by this task.
pub(crate) async fn run(cluster: Cluster, mut registry: Box<dyn Registry>) {
    {
        let st = cluster.shared().read();
        st.log(
            LogLevel::Debug,
            &format!("balancing loop started for {}", st.scope_label()),
        );
    }
    loop {
        let shared = cluster.shared();
        if shared.leaving.load(Ordering::Acquire) {
            break;
        }
        let waited = tokio::select! {
            _ = shared.wake.notified() => None,
            outcome = registry.wait_for_change() => Some(outcome),
        };
        match waited {
            None | Some(Ok(ChangeWait::Unchanged)) => continue,
            Some(Ok(ChangeWait::Changed)) => {}
            Some(Err(e)) => {
                cluster
                    .shared()
                    .read()
                    .log(
                        LogLevel::Warning,
                        &format!("failed to receive changes from registry: {e}"),
                    );
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(WAIT_ERROR_BACKOFF) => {}
                }
                continue;
            }
        }
        match registry.snapshot().await {
            Ok(snapshot) => commit(&cluster, &snapshot),
            Err(e) => {
                cluster.shared().read().log(
                    LogLevel::Error,
                    &format!("failed to balance cluster in response to changes: {e}"),
                );
            }
        }
    }
    cluster
        .shared()
        .read()
        .log(LogLevel::Debug, "balancing loop terminating");
}
