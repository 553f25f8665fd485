use std::sync::atomic::AtomicBool;
use std::sync::{Arc, RwLock};

use tokio::sync::Notify;
use tokio::task::JoinHandle;

use crate::cluster::Cluster;
use crate::config::{ForkPolicy, RegistryEndpoint};
use crate::logging::{self, LogCallback, LogLevel};
use crate::registry::sql::JobStore;

/// Immutable view of this member's position, handed to the rebalance
/// callback and returned by [`Cluster::state`].
///
/// `index` is `-1` when this member is not part of the current snapshot
/// (not yet balanced, expired, or passive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClusterState {
    pub index: i32,
    pub workers: i32,
    pub total: i32,
    pub passive: bool,
}

/// Callback invoked whenever this member's `(index, total)` assignment
/// changes. The cluster reference is valid for the duration of the call;
/// the callback runs with no internal lock held, so it may call back into
/// the cluster freely.
pub type RebalanceCallback = Arc<dyn Fn(&Cluster, ClusterState) + Send + Sync>;

/// Everything shared between the public handle and the background loops.
pub(crate) struct Shared {
    /// Membership state. Critical sections are short and never overlap
    /// registry I/O, sleeps, or callback invocation.
    pub(crate) state: RwLock<MemberState>,
    /// Cooperative shutdown signal, polled by both loops every pass.
    pub(crate) leaving: AtomicBool,
    /// Wakes sleeping loops early when `leaving` flips.
    pub(crate) wake: Notify,
    /// Serializes join/leave/fork so lifecycle transitions cannot
    /// interleave.
    pub(crate) lifecycle: tokio::sync::Mutex<()>,
}

impl Shared {
    pub(crate) fn new(state: MemberState) -> Self {
        Self {
            state: RwLock::new(state),
            leaving: AtomicBool::new(false),
            wake: Notify::new(),
            lifecycle: tokio::sync::Mutex::new(()),
        }
    }

    pub(crate) fn read(&self) -> std::sync::RwLockReadGuard<'_, MemberState> {
        self.state.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub(crate) fn write(&self) -> std::sync::RwLockWriteGuard<'_, MemberState> {
        self.state.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let st = self.read();
        if st.joined {
            tracing::debug!(
                instance_id = %st.instance_id,
                "cluster handle dropped while joined (leave should be called explicitly)"
            );
        }
    }
}

/// The lock-protected member record: configuration (frozen once joined)
/// plus the current assignment and loop handles.
pub(crate) struct MemberState {
    pub(crate) key: String,
    pub(crate) env: String,
    pub(crate) partition: Option<String>,
    pub(crate) instance_id: String,
    pub(crate) workers: i32,
    pub(crate) ttl_seconds: u64,
    pub(crate) refresh_seconds: u64,
    pub(crate) endpoint: RegistryEndpoint,
    pub(crate) fork_policy: ForkPolicy,
    pub(crate) passive: bool,
    pub(crate) verbose: bool,
    pub(crate) joined: bool,

    /// Static-mode topology, used only when no registry is configured.
    pub(crate) static_index: i32,
    pub(crate) static_total: i32,

    /// Current assignment. `base == -1` means "absent from the snapshot".
    pub(crate) base: i32,
    pub(crate) total: i32,

    pub(crate) balancer: Option<RebalanceCallback>,
    pub(crate) logger: Option<LogCallback>,

    pub(crate) heartbeat_task: Option<JoinHandle<()>>,
    pub(crate) watch_task: Option<JoinHandle<()>>,

    /// Job persistence handle, present while joined to a SQL registry.
    pub(crate) job_store: Option<JobStore>,
}

impl MemberState {
    pub(crate) fn new(key: String) -> Self {
        Self {
            key,
            env: crate::DEFAULT_ENVIRONMENT.to_string(),
            partition: None,
            instance_id: crate::config::generate_id(),
            workers: 1,
            ttl_seconds: crate::DEFAULT_TTL_SECONDS,
            refresh_seconds: crate::DEFAULT_REFRESH_SECONDS,
            endpoint: RegistryEndpoint::Static,
            fork_policy: ForkPolicy::default(),
            passive: false,
            verbose: false,
            joined: false,
            static_index: 0,
            static_total: 0,
            base: -1,
            total: 0,
            balancer: None,
            logger: None,
            heartbeat_task: None,
            watch_task: None,
            job_store: None,
        }
    }

    /// The externally-visible view of the current assignment.
    pub(crate) fn snapshot_state(&self) -> ClusterState {
        ClusterState {
            index: self.base,
            workers: if self.passive { 0 } else { self.workers },
            total: self.total,
            passive: self.passive,
        }
    }

    /// `my-service/production` or `my-service[shard-a]/production`,
    /// as it appears in log messages.
    pub(crate) fn scope_label(&self) -> String {
        match &self.partition {
            Some(p) => format!("{}[{}]/{}", self.key, p, self.env),
            None => format!("{}/{}", self.key, self.env),
        }
    }

    /// Log through the member's callback while the lock is already held.
    pub(crate) fn log(&self, level: LogLevel, msg: &str) {
        logging::emit(self.logger.as_ref(), self.verbose, level, msg);
    }
}
