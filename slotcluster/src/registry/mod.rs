//! Registry adapters.
//!
//! The engine talks to its coordination store through the [`Registry`]
//! capability trait and never branches on backend identity. Each joined
//! cluster opens two independent handles (one for the heartbeat loop, one
//! for the watch/balance loop) so the two never queue behind each other's
//! I/O.

use async_trait::async_trait;

use crate::config::RegistryEndpoint;
use crate::error::{Error, Result};

pub(crate) mod etcd;
pub(crate) mod sql;

/// Outcome of a single bounded change wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeWait {
    /// The registry scope plausibly changed; take a fresh snapshot.
    Changed,
    /// Nothing changed within this wait round.
    Unchanged,
}

/// The identity this member registers under: everything needed to address
/// its entry within the shared registry.
#[derive(Debug, Clone)]
pub(crate) struct Scope {
    pub(crate) key: String,
    pub(crate) env: String,
    pub(crate) partition: Option<String>,
    pub(crate) instance_id: String,
    pub(crate) ttl_seconds: u64,
}

/// Uniform contract over the coordination store.
///
/// Handles are single-owner: each background loop holds its own boxed
/// registry and the methods take `&mut self`. `wait_for_change` performs
/// at most one bounded wait so callers can re-check shutdown flags between
/// rounds.
#[async_trait]
pub(crate) trait Registry: Send {
    /// Bring the backing schema up to date. No-op for backends without
    /// schemas.
    async fn migrate_schema(&mut self) -> Result<()> {
        Ok(())
    }

    /// Assert this member's presence with the given worker count. With
    /// `initial` the write succeeds whether or not the entry exists;
    /// without it, a missing (expired) entry is reported as an error so
    /// the caller can fall back to re-creation.
    async fn announce(&mut self, workers: i32, initial: bool) -> Result<()>;

    /// Best-effort removal of this member's entry.
    async fn retract(&mut self) -> Result<()>;

    /// All live entries in this scope as `(instance_id, workers)`, sorted
    /// ascending by instance ID. Expired entries are filtered here, not by
    /// the balancer.
    async fn snapshot(&mut self) -> Result<Vec<(String, i32)>>;

    /// Block until the scope plausibly changed, for at most one bounded
    /// round.
    async fn wait_for_change(&mut self) -> Result<ChangeWait>;
}

/// Open a registry handle for the configured endpoint.
pub(crate) async fn connect(
    endpoint: &RegistryEndpoint,
    scope: Scope,
) -> Result<Box<dyn Registry>> {
    match endpoint {
        RegistryEndpoint::Static => Err(Error::Invalid(
            "static clusters have no registry".to_string(),
        )),
        RegistryEndpoint::Kv(uri) => Ok(Box::new(etcd::EtcdRegistry::connect(uri, scope).await?)),
        RegistryEndpoint::Sql(uri) => {
            let dialect = endpoint
                .sql_dialect()
                .ok_or_else(|| Error::Invalid(format!("registry URI <{uri}>")))?;
            Ok(Box::new(sql::SqlRegistry::connect(uri, dialect, scope).await?))
        }
    }
}
