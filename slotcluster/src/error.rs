use thiserror::Error;

/// Result type alias for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// The operation is not allowed in the cluster's current lifecycle
    /// state, e.g. reconfiguring a member that has already joined.
    #[error("operation not permitted while joined")]
    NotPermitted,

    /// An argument failed validation.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// The registry could not be reached during join.
    #[error("registry unavailable: {0}")]
    Unavailable(String),

    /// KV registry error.
    #[error("etcd registry error: {0}")]
    Etcd(#[from] etcd_kv::Error),

    /// SQL registry error.
    #[error("SQL registry error: {0}")]
    Sql(#[from] sqlx::Error),
}
