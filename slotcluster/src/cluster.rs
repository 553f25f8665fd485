use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::balance;
use crate::config::{self, ForkPolicy, RegistryEndpoint};
use crate::error::{Error, Result};
use crate::heartbeat;
use crate::logging::{LogCallback, LogLevel};
use crate::registry::{self, sql::JobStore, Scope};
use crate::state::{ClusterState, MemberState, RebalanceCallback, Shared};

/// One member of a named cluster.
///
/// A `Cluster` is configured while unjoined, joins a shared registry (or a
/// static topology), and from then on keeps its `(index, workers, total)`
/// assignment fresh in the background, invoking the rebalance callback
/// whenever the assignment changes. Handles are cheap to clone; all clones
/// refer to the same member.
///
/// # Example
///
/// ```rust,ignore
/// use slotcluster::Cluster;
///
/// let cluster = Cluster::create("my-service")?;
/// cluster.set_registry(Some("http://127.0.0.1:2379"))?;
/// cluster.set_workers(4)?;
/// cluster.set_rebalance_callback(|_, state| {
///     println!("now handling [{}, {})", state.index, state.index + state.workers);
/// })?;
/// cluster.join().await?;
/// // ...
/// cluster.leave().await?;
/// ```
#[derive(Clone)]
pub struct Cluster {
    shared: Arc<Shared>,
}

impl Cluster {
    /// Create an unjoined member of the cluster named `key` (1-32
    /// alphanumeric or hyphen characters), with a freshly generated
    /// instance ID and default configuration: environment `production`,
    /// one worker, static mode until a registry is set.
    pub fn create(key: &str) -> Result<Self> {
        if !config::valid_name(key) {
            return Err(Error::Invalid(format!("cluster key '{key}'")));
        }
        Ok(Self {
            shared: Arc::new(Shared::new(MemberState::new(key.to_string()))),
        })
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// True when `other` is a handle on this same member.
    pub(crate) fn same_member(&self, other: &Cluster) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }

    pub(crate) fn log(&self, level: LogLevel, msg: &str) {
        self.shared.read().log(level, msg);
    }

    /// Run a configuration mutation, rejected while joined.
    fn configure<R>(&self, f: impl FnOnce(&mut MemberState) -> Result<R>) -> Result<R> {
        let mut st = self.shared.write();
        if st.joined {
            st.log(
                LogLevel::Notice,
                "cannot alter cluster parameters while joined",
            );
            return Err(Error::NotPermitted);
        }
        f(&mut st)
    }

    /// Set the environment name, a namespace within the cluster key.
    pub fn set_environment(&self, env: &str) -> Result<()> {
        if !config::valid_name(env) {
            return Err(Error::Invalid(format!("environment name '{env}'")));
        }
        self.configure(|st| {
            st.env = env.to_string();
            if st.verbose {
                st.log(LogLevel::Debug, &format!("environment name now set to '{env}'"));
            }
            Ok(())
        })
    }

    /// Set or clear the partition, a sub-namespace within the environment.
    pub fn set_partition(&self, partition: Option<&str>) -> Result<()> {
        if let Some(p) = partition {
            if !config::valid_name(p) {
                return Err(Error::Invalid(format!("partition name '{p}'")));
            }
        }
        self.configure(|st| {
            st.partition = partition.map(str::to_string);
            Ok(())
        })
    }

    /// Set the stable instance identifier: 2-32 alphanumeric characters,
    /// unique to this process instance within the cluster.
    pub fn set_instance_id(&self, instance_id: &str) -> Result<()> {
        if !config::valid_id(instance_id) {
            return Err(Error::Invalid(format!("instance ID '{instance_id}'")));
        }
        self.configure(|st| {
            st.instance_id = instance_id.to_string();
            if st.verbose {
                st.log(
                    LogLevel::Debug,
                    &format!("instance ID now set to '{instance_id}'"),
                );
            }
            Ok(())
        })
    }

    /// Replace the instance identifier with a freshly generated one.
    pub fn reset_instance_id(&self) -> Result<()> {
        self.configure(|st| {
            st.instance_id = config::generate_id();
            Ok(())
        })
    }

    /// Set the number of worker slots this member contributes.
    pub fn set_workers(&self, workers: i32) -> Result<()> {
        if workers < 1 {
            return Err(Error::Invalid("worker count must be positive".to_string()));
        }
        self.configure(|st| {
            st.workers = workers;
            if st.verbose {
                st.log(
                    LogLevel::Debug,
                    &format!("number of workers in this instance set to {workers}"),
                );
            }
            Ok(())
        })
    }

    /// Select the registry backend by URI scheme: `http`/`https` for the
    /// KV backend, a database scheme for the SQL backend, `None` for
    /// static mode.
    pub fn set_registry(&self, uri: Option<&str>) -> Result<()> {
        let endpoint = RegistryEndpoint::parse(uri)?;
        self.configure(|st| {
            if st.verbose {
                let label = match &endpoint {
                    RegistryEndpoint::Static => "static (no registry)".to_string(),
                    RegistryEndpoint::Kv(uri) => format!("KV registry <{uri}>"),
                    RegistryEndpoint::Sql(uri) => format!("SQL registry <{uri}>"),
                };
                st.log(LogLevel::Debug, &format!("cluster backend set to {label}"));
            }
            st.endpoint = endpoint;
            Ok(())
        })
    }

    /// Registry entry time-to-live in seconds.
    pub fn set_ttl_seconds(&self, ttl: u64) -> Result<()> {
        if ttl == 0 {
            return Err(Error::Invalid("TTL must be positive".to_string()));
        }
        self.configure(|st| {
            st.ttl_seconds = ttl;
            Ok(())
        })
    }

    /// Heartbeat refresh period in seconds. Should be less than half the
    /// TTL so an entry survives one missed refresh.
    pub fn set_refresh_seconds(&self, refresh: u64) -> Result<()> {
        if refresh == 0 {
            return Err(Error::Invalid("refresh period must be positive".to_string()));
        }
        self.configure(|st| {
            st.refresh_seconds = refresh;
            Ok(())
        })
    }

    /// Select which side(s) of a process fork resume membership.
    pub fn set_fork_policy(&self, policy: ForkPolicy) -> Result<()> {
        self.configure(|st| {
            st.fork_policy = policy;
            Ok(())
        })
    }

    /// Static mode: the index of this member's first worker.
    pub fn set_static_index(&self, index: i32) -> Result<()> {
        if index < 0 {
            return Err(Error::Invalid(
                "instance index cannot be negative".to_string(),
            ));
        }
        self.configure(|st| {
            st.static_index = index;
            Ok(())
        })
    }

    /// Static mode: the total worker count across the whole cluster.
    pub fn set_static_total(&self, total: i32) -> Result<()> {
        if total < 1 {
            return Err(Error::Invalid(
                "total worker count must be positive".to_string(),
            ));
        }
        self.configure(|st| {
            st.static_total = total;
            Ok(())
        })
    }

    /// Set the callback invoked whenever this member's assignment changes.
    pub fn set_rebalance_callback<F>(&self, callback: F) -> Result<()>
    where
        F: Fn(&Cluster, ClusterState) + Send + Sync + 'static,
    {
        self.configure(|st| {
            st.balancer = Some(Arc::new(callback) as RebalanceCallback);
            Ok(())
        })
    }

    /// Set the logging callback. Permitted at any time.
    pub fn set_logger<F>(&self, logger: F)
    where
        F: Fn(LogLevel, &str) + Send + Sync + 'static,
    {
        self.shared.write().logger = Some(Arc::new(logger) as LogCallback);
    }

    /// Enable or disable debug-level logging. Permitted at any time.
    pub fn set_verbose(&self, verbose: bool) {
        self.shared.write().verbose = verbose;
    }

    /// The cluster key.
    pub fn key(&self) -> String {
        self.shared.read().key.clone()
    }

    /// The environment name.
    pub fn environment(&self) -> String {
        self.shared.read().env.clone()
    }

    /// This member's instance identifier.
    pub fn instance_id(&self) -> String {
        self.shared.read().instance_id.clone()
    }

    /// The partition, if one is set.
    pub fn partition(&self) -> Option<String> {
        self.shared.read().partition.clone()
    }

    /// Whether this member has joined its cluster.
    pub fn joined(&self) -> bool {
        self.shared.read().joined
    }

    /// The current assignment.
    pub fn state(&self) -> ClusterState {
        self.shared.read().snapshot_state()
    }

    /// Join the cluster as an active member, contributing workers and
    /// heartbeating. Returns once an initial assignment has been computed
    /// and both background loops are running; the rebalance callback will
    /// already have fired. Joining an already-joined cluster is a no-op.
    pub async fn join(&self) -> Result<()> {
        self.join_inner(false).await
    }

    /// Join as a passive observer: sees the total and peers but
    /// contributes no workers, never appears in other members' snapshots,
    /// and always observes `index == -1`.
    pub async fn join_passive(&self) -> Result<()> {
        self.join_inner(true).await
    }

    async fn join_inner(&self, passive: bool) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        let endpoint = {
            let st = self.shared.read();
            if st.joined {
                st.log(
                    LogLevel::Debug,
                    "ignoring attempt to join a cluster which has already been joined",
                );
                return Ok(());
            }
            st.endpoint.clone()
        };
        match endpoint {
            RegistryEndpoint::Static => self.join_static(passive),
            _ => self.join_registry(&endpoint, passive).await,
        }
    }

    /// Static join: trust the caller-supplied topology, mark joined, and
    /// fire the callback once.
    pub(crate) fn join_static(&self, passive: bool) -> Result<()> {
        let (callback, view) = {
            let mut st = self.shared.write();
            st.passive = passive;
            let total = st.static_total.max(1);
            let index = if passive { -1 } else { st.static_index };
            if !passive && index + st.workers > total {
                st.log(
                    LogLevel::Error,
                    &format!(
                        "cannot join static cluster: index {index} plus {} workers exceeds the cluster total {total}",
                        st.workers
                    ),
                );
                return Err(Error::Invalid(
                    "static index plus workers exceeds cluster total".to_string(),
                ));
            }
            st.base = index;
            st.total = total;
            st.joined = true;
            st.log(LogLevel::Debug, "joined static cluster");
            (st.balancer.clone(), st.snapshot_state())
        };
        if let Some(cb) = callback {
            cb(self, view);
        }
        Ok(())
    }

    async fn join_registry(&self, endpoint: &RegistryEndpoint, passive: bool) -> Result<()> {
        let (scope, workers) = {
            let mut st = self.shared.write();
            st.passive = passive;
            st.base = -1;
            if st.refresh_seconds * 2 >= st.ttl_seconds {
                st.log(
                    LogLevel::Warning,
                    "refresh period is not less than half the TTL; one missed refresh will expire the entry",
                );
            }
            (
                Scope {
                    key: st.key.clone(),
                    env: st.env.clone(),
                    partition: st.partition.clone(),
                    instance_id: st.instance_id.clone(),
                    ttl_seconds: st.ttl_seconds,
                },
                st.workers,
            )
        };
        self.shared.leaving.store(false, Ordering::Release);
        match self.start_membership(endpoint, scope, workers, passive).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut st = self.shared.write();
                st.joined = false;
                st.base = -1;
                st.total = 0;
                st.job_store = None;
                Err(e)
            }
        }
    }

    /// Open both registry handles, perform the synchronous announce and
    /// balance, then spawn the loops. Used by join and by the post-fork
    /// rejoin paths.
    pub(crate) async fn start_membership(
        &self,
        endpoint: &RegistryEndpoint,
        scope: Scope,
        workers: i32,
        passive: bool,
    ) -> Result<()> {
        let unavailable = |e: Error| Error::Unavailable(e.to_string());
        let mut heartbeat_registry = registry::connect(endpoint, scope.clone())
            .await
            .map_err(unavailable)?;
        heartbeat_registry.migrate_schema().await?;
        let mut watch_registry = registry::connect(endpoint, scope.clone())
            .await
            .map_err(unavailable)?;

        if !passive {
            if let Err(e) = heartbeat_registry.announce(workers, true).await {
                self.shared
                    .read()
                    .log(LogLevel::Critical, "failed to perform initial announce");
                return Err(e);
            }
        }
        let snapshot = match watch_registry.snapshot().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                self.shared
                    .read()
                    .log(LogLevel::Critical, "failed to perform initial balancing");
                if !passive {
                    let _ = heartbeat_registry.retract().await;
                }
                return Err(e);
            }
        };
        let job_store = match (endpoint, endpoint.sql_dialect()) {
            (RegistryEndpoint::Sql(uri), Some(dialect)) => {
                match JobStore::connect(uri, dialect, &scope).await {
                    Ok(store) => Some(store),
                    Err(e) => {
                        if !passive {
                            let _ = heartbeat_registry.retract().await;
                        }
                        return Err(e);
                    }
                }
            }
            _ => None,
        };

        balance::commit(self, &snapshot);

        let mut st = self.shared.write();
        st.joined = true;
        st.job_store = job_store;
        if !passive {
            st.heartbeat_task = Some(tokio::spawn(heartbeat::run(
                self.clone(),
                heartbeat_registry,
            )));
        }
        st.watch_task = Some(tokio::spawn(balance::run(self.clone(), watch_registry)));
        Ok(())
    }

    /// Leave the cluster: signal both loops, wait for them to finish (the
    /// heartbeat removes our registry entry on its way out), and release
    /// the registry handles. Leaving an unjoined cluster is a no-op.
    pub async fn leave(&self) -> Result<()> {
        let _lifecycle = self.shared.lifecycle.lock().await;
        let (heartbeat_task, watch_task, scope, endpoint) = {
            let mut st = self.shared.write();
            if !st.joined {
                return Ok(());
            }
            if st.endpoint == RegistryEndpoint::Static {
                st.joined = false;
                st.log(LogLevel::Debug, "left static cluster");
                return Ok(());
            }
            self.shared.leaving.store(true, Ordering::Release);
            (
                st.heartbeat_task.take(),
                st.watch_task.take(),
                Scope {
                    key: st.key.clone(),
                    env: st.env.clone(),
                    partition: st.partition.clone(),
                    instance_id: st.instance_id.clone(),
                    ttl_seconds: st.ttl_seconds,
                },
                st.endpoint.clone(),
            )
        };
        self.shared.wake.notify_waiters();
        let had_heartbeat = heartbeat_task.is_some();
        if let Some(handle) = heartbeat_task {
            let _ = handle.await;
        }
        if let Some(handle) = watch_task {
            let _ = handle.await;
        }
        // Without a heartbeat (passive mode, or leave after prepare_fork)
        // no loop retracts on exit; remove the entry here instead.
        if !had_heartbeat {
            match registry::connect(&endpoint, scope).await {
                Ok(mut registry) => {
                    if let Err(e) = registry.retract().await {
                        self.shared.read().log(
                            LogLevel::Warning,
                            &format!("failed to remove registry entry on leave: {e}"),
                        );
                    }
                }
                Err(e) => {
                    self.shared.read().log(
                        LogLevel::Warning,
                        &format!("cannot reach registry to remove entry on leave: {e}"),
                    );
                }
            }
        }
        {
            let mut st = self.shared.write();
            st.joined = false;
            st.job_store = None;
        }
        self.shared.leaving.store(false, Ordering::Release);
        Ok(())
    }

    /// Leave (if joined) and consume the handle.
    pub async fn destroy(self) -> Result<()> {
        self.leave().await
    }
}
