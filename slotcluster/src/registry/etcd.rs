//! KV registry adapter over the etcd v2 keys API.
//!
//! Each member writes `instance_id -> workers` beneath
//! `/<key>/[<partition>/]<env>/` with the configured TTL; the server
//! evicts expired entries itself, and a recursive long-poll on the
//! environment directory (which observes expiries as well as writes)
//! serves as change notification.

use std::time::Duration;

use etcd_kv::{Client, Dir, WaitOutcome};

use super::{ChangeWait, Registry, Scope};
use crate::error::Result;

/// Upper bound on one long-poll round, so the watch loop re-checks its
/// shutdown flag at least this often even on a silent registry.
const WATCH_ROUND: Duration = Duration::from_secs(30);

pub(crate) struct EtcdRegistry {
    env_dir: Dir,
    instance_id: String,
    ttl_seconds: u64,
}

impl EtcdRegistry {
    /// Connect and make sure the `key/[partition/]env` directory chain
    /// exists.
    pub(crate) async fn connect(uri: &str, scope: Scope) -> Result<Self> {
        let client = Client::connect(uri)?;
        let cluster_dir = client.dir(&scope.key);
        cluster_dir.ensure().await?;
        let env_parent = match &scope.partition {
            Some(partition) => {
                let partition_dir = cluster_dir.subdir(partition);
                partition_dir.ensure().await?;
                partition_dir
            }
            None => cluster_dir,
        };
        let env_dir = env_parent.subdir(&scope.env);
        env_dir.ensure().await?;
        tracing::debug!(dir = %env_dir.url(), "connected to KV registry");
        Ok(Self {
            env_dir,
            instance_id: scope.instance_id,
            ttl_seconds: scope.ttl_seconds,
        })
    }
}

#[async_trait::async_trait]
impl Registry for EtcdRegistry {
    async fn announce(&mut self, workers: i32, initial: bool) -> Result<()> {
        self.env_dir
            .put_key(
                &self.instance_id,
                &workers.to_string(),
                Some(self.ttl_seconds),
                !initial,
            )
            .await?;
        Ok(())
    }

    async fn retract(&mut self) -> Result<()> {
        match self.env_dir.delete_key(&self.instance_id).await {
            Ok(()) => Ok(()),
            // Already expired server-side; nothing left to remove.
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn snapshot(&mut self) -> Result<Vec<(String, i32)>> {
        let mut entries: Vec<(String, i32)> = self
            .env_dir
            .entries()
            .await?
            .into_iter()
            .filter(|node| !node.dir)
            .map(|node| {
                let workers = node
                    .value
                    .as_deref()
                    .and_then(|v| v.trim().parse().ok())
                    .unwrap_or(0);
                (node.name().to_string(), workers)
            })
            .collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    async fn wait_for_change(&mut self) -> Result<ChangeWait> {
        match self.env_dir.wait(WATCH_ROUND).await? {
            WaitOutcome::Changed => Ok(ChangeWait::Changed),
            WaitOutcome::TimedOut => Ok(ChangeWait::Unchanged),
        }
    }
}
