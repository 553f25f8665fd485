use std::time::Duration;

use url::Url;

use crate::dir::Dir;
use crate::error::Error;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Connection to one etcd endpoint, rooted at the v2 keys API.
///
/// The client itself performs no I/O; it hands out [`Dir`] handles that do.
#[derive(Clone)]
pub struct Client {
    http: reqwest::Client,
    keys_root: Url,
}

impl Client {
    /// Parse an endpoint URL such as `http://127.0.0.1:2379` and root the
    /// client at its `/v2/keys/` namespace. Only `http` and `https`
    /// schemes are accepted.
    pub fn connect(endpoint: &str) -> Result<Self, Error> {
        let parsed = Url::parse(endpoint).map_err(|_| Error::Endpoint(endpoint.to_string()))?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            return Err(Error::Endpoint(endpoint.to_string()));
        }
        let keys_root = parsed
            .join("/v2/keys/")
            .map_err(|_| Error::Endpoint(endpoint.to_string()))?;
        let http = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;
        tracing::debug!(endpoint = %keys_root, "etcd client created");
        Ok(Self { http, keys_root })
    }

    /// A handle on a top-level directory beneath the keys root.
    pub fn dir(&self, name: &str) -> Dir {
        Dir::new(self.http.clone(), &self.keys_root, name)
    }
}
