use crate::dir::{decode, Dir};
use crate::error::Error;

impl Dir {
    /// Write `name = value` beneath this directory.
    ///
    /// `ttl` attaches a server-side expiry in seconds. With `must_exist`
    /// the write carries a `prevExist=true` guard and fails with a
    /// not-found error if the key has already expired, which callers use
    /// to distinguish a refresh from a (re-)creation.
    pub async fn put_key(
        &self,
        name: &str,
        value: &str,
        ttl: Option<u64>,
        must_exist: bool,
    ) -> Result<(), Error> {
        let url = self
            .url()
            .join(name)
            .map_err(|_| Error::Endpoint(name.to_string()))?;
        let mut form: Vec<(&str, String)> = vec![("value", value.to_string())];
        if let Some(ttl) = ttl {
            form.push(("ttl", ttl.to_string()));
        }
        let mut req = self.http().put(url).form(&form);
        if must_exist {
            req = req.query(&[("prevExist", "true")]);
        }
        let resp = req.send().await?;
        decode(resp).await?;
        Ok(())
    }

    /// Delete `name` beneath this directory. Deleting a key that has
    /// already expired reports not-found.
    pub async fn delete_key(&self, name: &str) -> Result<(), Error> {
        let url = self
            .url()
            .join(name)
            .map_err(|_| Error::Endpoint(name.to_string()))?;
        let resp = self.http().delete(url).send().await?;
        decode(resp).await?;
        Ok(())
    }
}
