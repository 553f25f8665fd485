//! Minimal client for the etcd v2 keys API.
//!
//! This crate covers the small slice of etcd v2 needed for directory-based
//! service registration:
//! - Directory create/open and child enumeration
//! - Key writes with TTL and `prevExist` guards
//! - Recursive long-poll waits for change detection
//!
//! It deliberately does not cover the v3 gRPC API, leases, or transactions.
//!
//! # Example
//!
//! ```rust,ignore
//! use etcd_kv::Client;
//!
//! let client = Client::connect("http://127.0.0.1:2379")?;
//! let dir = client.dir("my-service").subdir("production");
//! dir.ensure().await?;
//! dir.put_key("instance-1", "4", Some(120), false).await?;
//! let entries = dir.entries().await?;
//! ```

mod client;
mod dir;
mod error;
mod keys;
mod types;

pub use client::Client;
pub use dir::{Dir, WaitOutcome};
pub use error::Error;
pub use types::{KeysResponse, Node};
