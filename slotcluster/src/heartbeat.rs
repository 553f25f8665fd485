use std::sync::atomic::Ordering;
use std::time::Duration;

use crate::cluster::Cluster;
use crate::logging::LogLevel;
use crate::registry::Registry;

/// Retry delay after a failed registry refresh.
const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Heartbeat loop: refresh this member's registry entry every
/// `refresh_seconds`, and remove it on the way out.
///
/// Sleeps one second at a time so the leaving flag is observed within a
/// bounded delay; a refresh that is already in flight is never cancelled.
/// After a failed refresh (including an entry that expired out from under
/// us) the next attempt re-creates the entry instead of requiring it to
/// exist.
pub(crate) async fn run(cluster: Cluster, mut registry: Box<dyn Registry>) {
    let refresh = {
        let st = cluster.shared().read();
        st.log(
            LogLevel::Debug,
            &format!(
                "heartbeat loop starting with ttl={}, refresh={}",
                st.ttl_seconds, st.refresh_seconds
            ),
        );
        st.refresh_seconds
    };

    let mut elapsed = 0u64;
    let mut recreate = false;
    loop {
        let shared = cluster.shared();
        if shared.leaving.load(Ordering::Acquire) {
            shared
                .read()
                .log(LogLevel::Debug, "leaving flag set, stopping heartbeat loop");
            break;
        }
        if elapsed < refresh {
            tokio::select! {
                _ = shared.wake.notified() => {}
                _ = tokio::time::sleep(Duration::from_secs(1)) => {
                    elapsed += 1;
                }
            }
            continue;
        }
        let (workers, instance_id, verbose) = {
            let st = shared.read();
            (st.workers, st.instance_id.clone(), st.verbose)
        };
        match registry.announce(workers, recreate).await {
            Ok(()) => {
                elapsed = 0;
                recreate = false;
                if verbose {
                    shared.read().log(
                        LogLevel::Debug,
                        &format!("updated registry with {instance_id}={workers}"),
                    );
                }
            }
            Err(e) => {
                shared.read().log(
                    LogLevel::Error,
                    &format!("failed to update registry: {e}"),
                );
                recreate = true;
                tokio::select! {
                    _ = shared.wake.notified() => {}
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
            }
        }
    }
    if let Err(e) = registry.retract().await {
        cluster.shared().read().log(
            LogLevel::Warning,
            &format!("failed to remove registry entry on leave: {e}"),
        );
    }
    cluster
        .shared()
        .read()
        .log(LogLevel::Debug, "heartbeat loop terminating");
}
