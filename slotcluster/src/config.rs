use url::Url;

use crate::error::Error;

/// Which registry backend an endpoint URI selects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RegistryEndpoint {
    /// No registry; the caller supplies the topology.
    Static,
    /// Hierarchical KV store with native TTL (etcd v2), `http`/`https`.
    Kv(String),
    /// Relational store with explicit expiry timestamps.
    Sql(String),
}

/// SQL dialects the relational adapter can speak, derived from the
/// endpoint scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SqlDialect {
    Postgres,
    MySql,
    Sqlite,
}

impl RegistryEndpoint {
    /// Dispatch an endpoint URI on its scheme. `None` selects static mode;
    /// unrecognized schemes are rejected.
    pub(crate) fn parse(uri: Option<&str>) -> Result<Self, Error> {
        let Some(uri) = uri else {
            return Ok(RegistryEndpoint::Static);
        };
        let parsed =
            Url::parse(uri).map_err(|_| Error::Invalid(format!("registry URI <{uri}>")))?;
        match parsed.scheme() {
            "http" | "https" => Ok(RegistryEndpoint::Kv(uri.to_string())),
            "postgres" | "postgresql" | "mysql" | "sqlite" => Ok(RegistryEndpoint::Sql(uri.to_string())),
            scheme => Err(Error::Invalid(format!(
                "unsupported scheme '{scheme}' in registry URI <{uri}>"
            ))),
        }
    }

    pub(crate) fn sql_dialect(&self) -> Option<SqlDialect> {
        match self {
            RegistryEndpoint::Sql(uri) if uri.starts_with("mysql") => Some(SqlDialect::MySql),
            RegistryEndpoint::Sql(uri) if uri.starts_with("sqlite") => Some(SqlDialect::Sqlite),
            RegistryEndpoint::Sql(_) => Some(SqlDialect::Postgres),
            _ => None,
        }
    }
}

/// How membership is resumed on either side of a process fork.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ForkPolicy {
    /// Only the child resumes membership; the parent is treated as having
    /// left. The default: a forked worker silently takes over the
    /// parent's role.
    #[default]
    ChildOnly,
    /// Only the parent resumes membership.
    ParentOnly,
    /// Both sides rejoin; the child generates a fresh instance ID so the
    /// two do not collide.
    Both,
}

impl ForkPolicy {
    pub(crate) fn includes_parent(self) -> bool {
        matches!(self, ForkPolicy::ParentOnly | ForkPolicy::Both)
    }

    pub(crate) fn includes_child(self) -> bool {
        matches!(self, ForkPolicy::ChildOnly | ForkPolicy::Both)
    }
}

/// Cluster keys, environment names, and partitions: 1-32 characters,
/// alphanumeric or hyphen.
pub(crate) fn valid_name(s: &str) -> bool {
    !s.is_empty() && s.len() <= 32 && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Instance and job identifiers: 2-32 alphanumeric characters.
pub(crate) fn valid_id(s: &str) -> bool {
    (2..=32).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphanumeric())
}

/// A fresh 32-character lowercase hex identifier.
pub(crate) fn generate_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_schemes_select_kv() {
        assert_eq!(
            RegistryEndpoint::parse(Some("http://127.0.0.1:2379")).unwrap(),
            RegistryEndpoint::Kv("http://127.0.0.1:2379".into())
        );
        assert!(matches!(
            RegistryEndpoint::parse(Some("https://etcd.internal:2379")).unwrap(),
            RegistryEndpoint::Kv(_)
        ));
    }

    #[test]
    fn database_schemes_select_sql() {
        for uri in [
            "postgres://coordinator@db/cluster",
            "postgresql://coordinator@db/cluster",
            "mysql://coordinator@db/cluster",
            "sqlite:///tmp/cluster.db",
        ] {
            assert!(matches!(
                RegistryEndpoint::parse(Some(uri)).unwrap(),
                RegistryEndpoint::Sql(_)
            ));
        }
    }

    #[test]
    fn missing_endpoint_selects_static() {
        assert_eq!(
            RegistryEndpoint::parse(None).unwrap(),
            RegistryEndpoint::Static
        );
    }

    #[test]
    fn unknown_schemes_are_invalid() {
        assert!(matches!(
            RegistryEndpoint::parse(Some("redis://localhost")),
            Err(Error::Invalid(_))
        ));
        assert!(matches!(
            RegistryEndpoint::parse(Some("not a uri")),
            Err(Error::Invalid(_))
        ));
    }

    #[test]
    fn dialect_follows_scheme() {
        let pg = RegistryEndpoint::parse(Some("postgres://db/c")).unwrap();
        assert_eq!(pg.sql_dialect(), Some(SqlDialect::Postgres));
        let my = RegistryEndpoint::parse(Some("mysql://db/c")).unwrap();
        assert_eq!(my.sql_dialect(), Some(SqlDialect::MySql));
        let lite = RegistryEndpoint::parse(Some("sqlite://cluster.db")).unwrap();
        assert_eq!(lite.sql_dialect(), Some(SqlDialect::Sqlite));
        let kv = RegistryEndpoint::parse(Some("http://etcd:2379")).unwrap();
        assert_eq!(kv.sql_dialect(), None);
    }

    #[test]
    fn name_validation() {
        assert!(valid_name("my-service"));
        assert!(valid_name("a"));
        assert!(!valid_name(""));
        assert!(!valid_name("has space"));
        assert!(!valid_name(&"x".repeat(33)));
    }

    #[test]
    fn id_validation() {
        assert!(valid_id("node1"));
        assert!(valid_id("ab"));
        assert!(!valid_id("a"));
        assert!(!valid_id("node-1"));
        assert!(!valid_id(&"x".repeat(33)));
        assert!(valid_id(&generate_id()));
    }

    #[test]
    fn generated_ids_are_32_hex_chars() {
        let id = generate_id();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(generate_id(), generate_id());
    }
}
