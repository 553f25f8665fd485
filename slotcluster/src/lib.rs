//! Registry-coordinated worker partitioning.
//!
//! This crate lets a set of cooperating processes agree, without talking
//! to each other directly, on a contiguous integer assignment of workers:
//! each member declares how many worker slots it contributes, and every
//! member learns its base index plus the cluster-wide total. Applications
//! partition work deterministically from the `(index, workers, total)`
//! triple, e.g. hashing keys modulo `total` and handling those that land
//! in `[index, index + workers)`.
//!
//! Coordination happens through a shared registry:
//! - **KV backend** (`http`/`https`): an etcd v2 directory with native
//!   TTLs and long-poll change notification
//! - **SQL backend** (`postgres`/`mysql`/`sqlite`): a `cluster_node` table
//!   with explicit expiry timestamps and poll-based change detection
//! - **Static mode** (no registry): the caller supplies the topology
//!
//! While joined, a heartbeat task refreshes this member's registry entry
//! ahead of its TTL and a watch task recomputes the assignment whenever
//! the registry changes, invoking the rebalance callback on every change.
//! Members are ordered by instance ID, so all members converge on the
//! same assignment without any peer-to-peer traffic.
//!
//! # Example
//!
//! ```rust,ignore
//! use slotcluster::Cluster;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), slotcluster::Error> {
//!     let cluster = Cluster::create("my-service")?;
//!     cluster.set_registry(Some("postgres://coordinator@db/cluster"))?;
//!     cluster.set_workers(4)?;
//!     cluster.set_rebalance_callback(|_, state| {
//!         println!(
//!             "handling workers [{}, {}) of {}",
//!             state.index,
//!             state.index + state.workers,
//!             state.total
//!         );
//!     })?;
//!     cluster.join().await?;
//!     // ... do partitioned work ...
//!     cluster.leave().await?;
//!     Ok(())
//! }
//! ```
//!
//! # Consistency
//!
//! Assignments are eventually consistent: during an arrival or departure,
//! two members may briefly compute different totals, or briefly overlap if
//! a new instance ID sorts before an established member that has not yet
//! observed it. Treat the assignment as advisory for optimistic work
//! partitioning and use an authoritative mechanism (such as a transaction
//! on the work itself) where mutual exclusion matters.

mod balance;
mod cluster;
mod config;
mod error;
mod fork;
mod heartbeat;
mod job;
mod logging;
mod registry;
mod state;

pub use cluster::Cluster;
pub use config::ForkPolicy;
pub use error::{Error, Result};
pub use job::{ClusterJob, JobStatus};
pub use logging::{LogCallback, LogLevel};
pub use state::{ClusterState, RebalanceCallback};

/// Environment name used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "production";
/// Registry entry time-to-live, in seconds.
pub const DEFAULT_TTL_SECONDS: u64 = 120;
/// Heartbeat refresh period, in seconds.
pub const DEFAULT_REFRESH_SECONDS: u64 = 30;
