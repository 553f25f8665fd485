//! Fork protocol.
//!
//! Processes that fork after joining call [`Cluster::prepare_fork`] before
//! the fork and one of [`Cluster::after_fork_parent`] /
//! [`Cluster::after_fork_child`] on each side afterwards. Task and lock
//! state do not survive a fork: prepare stops both background loops and
//! leaves the membership lock released, so each side restarts from plain
//! data. Which side resumes membership is controlled by the configured
//! [`ForkPolicy`](crate::ForkPolicy); the default resumes only the child,
//! so a forked worker silently takes over the parent's role without
//! changing cluster totals.
//!
//! Both after-fork calls must run on a runtime created on their own side
//! of the fork.

use std::sync::atomic::Ordering;

use crate::balance;
use crate::config::{self, ForkPolicy, RegistryEndpoint};
use crate::error::Result;
use crate::logging::LogLevel;
use crate::registry::Scope;

impl crate::Cluster {
    /// Quiesce the member ahead of a fork: stop both loops (the heartbeat
    /// removes our registry entry on its way out), zero the assignment,
    /// and restore the flags so the joined/unjoined status survives into
    /// both sides. The rebalance callback observes the zeroed assignment.
    pub async fn prepare_fork(&self) {
        let _lifecycle = self.shared().lifecycle.lock().await;
        let (heartbeat_task, watch_task) = {
            let mut st = self.shared().write();
            if st.verbose {
                st.log(LogLevel::Info, "preparing for fork");
            }
            self.shared().leaving.store(true, Ordering::Release);
            (st.heartbeat_task.take(), st.watch_task.take())
        };
        self.shared().wake.notify_waiters();
        if let Some(handle) = heartbeat_task {
            let _ = handle.await;
        }
        if let Some(handle) = watch_task {
            let _ = handle.await;
        }
        balance::apply(self, -1, 0);
        {
            let mut st = self.shared().write();
            st.job_store = None;
            if st.verbose {
                st.log(LogLevel::Info, "background loops terminated");
            }
        }
        self.shared().leaving.store(false, Ordering::Release);
    }

    /// Resume (or relinquish) membership in the parent after a fork,
    /// according to the fork policy.
    pub async fn after_fork_parent(&self) -> Result<()> {
        let _lifecycle = self.shared().lifecycle.lock().await;
        let (policy, joined) = {
            let st = self.shared().read();
            (st.fork_policy, st.joined)
        };
        if policy.includes_parent() && joined {
            self.shared().read().log(
                LogLevel::Notice,
                "resuming cluster membership in parent process",
            );
            self.resume_membership().await
        } else {
            let mut st = self.shared().write();
            st.joined = false;
            st.job_store = None;
            Ok(())
        }
    }

    /// Resume (or relinquish) membership in the child after a fork,
    /// according to the fork policy. When both sides rejoin, the child
    /// generates a fresh instance ID first so the two do not collide.
    pub async fn after_fork_child(&self) -> Result<()> {
        let _lifecycle = self.shared().lifecycle.lock().await;
        self.shared().leaving.store(false, Ordering::Release);
        let (policy, joined) = {
            let st = self.shared().read();
            (st.fork_policy, st.joined)
        };
        if !policy.includes_child() {
            let mut st = self.shared().write();
            st.joined = false;
            st.job_store = None;
            return Ok(());
        }
        if joined {
            if policy == ForkPolicy::Both {
                let mut st = self.shared().write();
                st.instance_id = config::generate_id();
                if st.verbose {
                    let id = st.instance_id.clone();
                    st.log(
                        LogLevel::Debug,
                        &format!("child assigned new instance ID '{id}'"),
                    );
                }
            }
            self.shared().read().log(
                LogLevel::Notice,
                "resuming cluster membership in child process",
            );
            self.resume_membership().await
        } else {
            Ok(())
        }
    }

    /// Re-announce, re-balance, and respawn the loops after a fork.
    async fn resume_membership(&self) -> Result<()> {
        let (endpoint, scope, workers, passive) = {
            let st = self.shared().read();
            (
                st.endpoint.clone(),
                Scope {
                    key: st.key.clone(),
                    env: st.env.clone(),
                    partition: st.partition.clone(),
                    instance_id: st.instance_id.clone(),
                    ttl_seconds: st.ttl_seconds,
                },
                st.workers,
                st.passive,
            )
        };
        if endpoint == RegistryEndpoint::Static {
            self.shared().write().joined = false;
            return self.join_static(passive);
        }
        match self.start_membership(&endpoint, scope, workers, passive).await {
            Ok(()) => Ok(()),
            Err(e) => {
                let mut st = self.shared().write();
                st.joined = false;
                st.base = -1;
                st.total = 0;
                st.job_store = None;
                Err(e)
            }
        }
    }
}
