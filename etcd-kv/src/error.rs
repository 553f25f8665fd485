use thiserror::Error;

/// etcd v2 wire error code for "Key not found".
pub(crate) const CODE_KEY_NOT_FOUND: u64 = 100;
/// etcd v2 wire error code for "Not a file" (directory already exists).
pub(crate) const CODE_NOT_A_FILE: u64 = 102;
/// etcd v2 wire error code for "Key already exists".
pub(crate) const CODE_NODE_EXIST: u64 = 105;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid etcd endpoint <{0}>")]
    Endpoint(String),

    #[error("etcd error {code}: {message}")]
    Api { code: u64, message: String },

    #[error("unexpected etcd response (HTTP {status}): {body}")]
    Protocol { status: u16, body: String },
}

impl Error {
    /// True when the server reported that the key does not exist, which a
    /// `prevExist` guard turns into an expiry signal.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::Api { code, .. } if *code == CODE_KEY_NOT_FOUND)
    }

    pub(crate) fn is_dir_exists(&self) -> bool {
        matches!(
            self,
            Error::Api { code, .. } if *code == CODE_NOT_A_FILE || *code == CODE_NODE_EXIST
        )
    }
}
