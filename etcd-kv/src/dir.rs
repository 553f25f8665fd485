use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::types::{ApiError, KeysResponse, Node};

/// Result of a long-poll wait on a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Something under the directory changed (set, delete, expire).
    Changed,
    /// The poll timed out with no change observed.
    TimedOut,
}

/// Handle on one directory in the etcd keyspace.
///
/// The URL always carries a trailing slash so that key names join cleanly
/// beneath it.
#[derive(Clone)]
pub struct Dir {
    http: reqwest::Client,
    url: Url,
}

impl Dir {
    pub(crate) fn new(http: reqwest::Client, parent: &Url, name: &str) -> Self {
        let url = parent
            .join(&format!("{}/", name.trim_matches('/')))
            .unwrap_or_else(|_| parent.clone());
        Self { http, url }
    }

    /// A handle on a child directory. No I/O is performed.
    pub fn subdir(&self, name: &str) -> Dir {
        Dir::new(self.http.clone(), &self.url, name)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Create this directory, tolerating one that already exists.
    pub async fn ensure(&self) -> Result<(), Error> {
        let resp = self
            .http
            .put(self.url.clone())
            .form(&[("dir", "true")])
            .send()
            .await?;
        match decode(resp).await {
            Ok(_) => Ok(()),
            Err(e) if e.is_dir_exists() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Enumerate the direct children of this directory. Expired keys are
    /// absent from the listing; the server handles TTL eviction.
    pub async fn entries(&self) -> Result<Vec<Node>, Error> {
        let resp = self.http.get(self.url.clone()).send().await?;
        let decoded = decode(resp).await?;
        Ok(decoded.node.map(|n| n.nodes).unwrap_or_default())
    }

    /// Block until anything beneath this directory changes, or until
    /// `timeout` elapses. Uses the v2 `wait=true&recursive=true` long poll,
    /// so TTL expiries fire a change just like explicit writes.
    pub async fn wait(&self, timeout: Duration) -> Result<WaitOutcome, Error> {
        let result = self
            .http
            .get(self.url.clone())
            .query(&[("wait", "true"), ("recursive", "true")])
            .timeout(timeout)
            .send()
            .await;
        match result {
            Ok(resp) => {
                decode(resp).await?;
                Ok(WaitOutcome::Changed)
            }
            Err(e) if e.is_timeout() => Ok(WaitOutcome::TimedOut),
            Err(e) => Err(e.into()),
        }
    }
}

/// Turn an HTTP response into a decoded v2 envelope, mapping the etcd error
/// body onto [`Error::Api`] when the status is unsuccessful.
pub(crate) async fn decode(resp: reqwest::Response) -> Result<KeysResponse, Error> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        serde_json::from_str(&body).map_err(|_| Error::Protocol {
            status: status.as_u16(),
            body,
        })
    } else if let Ok(api) = serde_json::from_str::<ApiError>(&body) {
        Err(Error::Api {
            code: api.error_code,
            message: api.message,
        })
    } else {
        Err(Error::Protocol {
            status: status.as_u16(),
            body,
        })
    }
}
