//! SQL registry adapter.
//!
//! Emulates the KV contract over a `cluster_node` table with explicit
//! `updated`/`expires` timestamps. One adapter covers PostgreSQL, MySQL,
//! and SQLite through the `sqlx` Any driver; dialect differences are
//! confined to placeholder style, identifier quoting, and the timestamp
//! column type.
//!
//! There is no native change notification: `wait_for_change` sleeps for a
//! fixed interval and then asks whether any row in scope was updated since
//! the previous poll, forcing a balance anyway if nothing has been seen
//! for long enough to cover missed updates and expiries.

use std::sync::Once;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use sqlx::any::AnyPoolOptions;
use sqlx::{AnyPool, Row};

use super::{ChangeWait, Registry, Scope};
use crate::config::SqlDialect;
use crate::error::Result;

/// Current schema version; see [`apply_migration`] for the ladder.
const SCHEMA_VERSION: i32 = 8;
/// Identifier our schema version is recorded under, so other applications
/// can version their own tables in the same database.
const SCHEMA_IDENT: &str = "slotcluster";

/// Poll cadence for change detection.
const POLL_INTERVAL: Duration = Duration::from_secs(5);
/// Force a balance pass after this long without an observed update, to
/// stay live across missed updates and silent expiries.
const MAX_QUIET: Duration = Duration::from_secs(30);

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(30);

static INSTALL_DRIVERS: Once = Once::new();

pub(crate) async fn open_pool(uri: &str) -> Result<AnyPool> {
    INSTALL_DRIVERS.call_once(sqlx::any::install_default_drivers);
    let pool = AnyPoolOptions::new()
        .max_connections(2)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect(uri)
        .await?;
    Ok(pool)
}

/// UTC wall-clock formatted the way every query and column expects it.
fn timestamp(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// Adjust a `$n`-placeholder, double-quoted-identifier query for the
/// target dialect. PostgreSQL and SQLite take the query as written; MySQL
/// needs `?` placeholders and backtick quoting.
fn rewrite(dialect: SqlDialect, sql: &str) -> String {
    match dialect {
        SqlDialect::MySql => {
            let mut out = String::with_capacity(sql.len());
            let mut chars = sql.chars().peekable();
            while let Some(c) = chars.next() {
                match c {
                    '$' if chars.peek().is_some_and(char::is_ascii_digit) => {
                        while chars.peek().is_some_and(char::is_ascii_digit) {
                            chars.next();
                        }
                        out.push('?');
                    }
                    '"' => out.push('`'),
                    other => out.push(other),
                }
            }
            out
        }
        SqlDialect::Postgres | SqlDialect::Sqlite => sql.to_string(),
    }
}

/// Timestamp-typed parameter expression. Bound values are strings, which
/// SQLite compares directly; PostgreSQL and MySQL need an explicit cast to
/// their timestamp type.
fn ts_param(dialect: SqlDialect, n: usize) -> String {
    match dialect {
        SqlDialect::Postgres => format!("CAST(${n} AS TIMESTAMP)"),
        SqlDialect::MySql => format!("CAST(${n} AS DATETIME)"),
        SqlDialect::Sqlite => format!("${n}"),
    }
}

/// The one DDL variant switch: the timestamp column type.
fn timestamp_type(dialect: SqlDialect) -> &'static str {
    match dialect {
        SqlDialect::Postgres => "TIMESTAMP",
        SqlDialect::MySql | SqlDialect::Sqlite => "DATETIME",
    }
}

pub(crate) struct SqlRegistry {
    pool: AnyPool,
    dialect: SqlDialect,
    scope: Scope,
    /// Timestamp of the previous change poll; `None` before the first.
    last_poll: Option<String>,
    /// When we last reported a change, for the forced-balance cap.
    last_reported: Instant,
}

impl SqlRegistry {
    pub(crate) async fn connect(uri: &str, dialect: SqlDialect, scope: Scope) -> Result<Self> {
        let pool = open_pool(uri).await?;
        tracing::debug!(dialect = ?dialect, "connected to SQL registry");
        Ok(Self {
            pool,
            dialect,
            scope,
            last_poll: None,
            last_reported: Instant::now(),
        })
    }

    fn q(&self, sql: &str) -> String {
        rewrite(self.dialect, sql)
    }

    /// Has any row in scope been updated since the previous poll?
    async fn scope_updated_since(&self, now: &str, last: &str) -> Result<bool> {
        let sql = match &self.scope.partition {
            Some(_) => format!(
                r#"SELECT COUNT(*) FROM "cluster_node" WHERE "key" = $1 AND "env" = $2 AND "partition" = $3 AND "expires" >= {} AND "updated" >= {}"#,
                ts_param(self.dialect, 4),
                ts_param(self.dialect, 5)
            ),
            None => format!(
                r#"SELECT COUNT(*) FROM "cluster_node" WHERE "key" = $1 AND "env" = $2 AND "partition" IS NULL AND "expires" >= {} AND "updated" >= {}"#,
                ts_param(self.dialect, 3),
                ts_param(self.dialect, 4)
            ),
        };
        let sql = self.q(&sql);
        let mut query = sqlx::query(&sql)
            .bind(&self.scope.key)
            .bind(&self.scope.env);
        if let Some(partition) = &self.scope.partition {
            query = query.bind(partition);
        }
        let row = query.bind(now).bind(last).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get(0)?;
        Ok(count > 0)
    }
}

#[async_trait::async_trait]
impl Registry for SqlRegistry {
    async fn migrate_schema(&mut self) -> Result<()> {
        migrate(&self.pool, self.dialect).await
    }

    /// Delete-then-insert inside one transaction, keyed by
    /// `(id, key, env)`, so `updated` always advances and `expires` is
    /// recomputed from the TTL.
    async fn announce(&mut self, workers: i32, _initial: bool) -> Result<()> {
        let now = Utc::now();
        let updated = timestamp(now);
        let expires = timestamp(now + chrono::Duration::seconds(self.scope.ttl_seconds as i64));
        let mut tx = self.pool.begin().await?;
        sqlx::query(&self.q(
            r#"DELETE FROM "cluster_node" WHERE "id" = $1 AND "key" = $2 AND "env" = $3"#,
        ))
        .bind(&self.scope.instance_id)
        .bind(&self.scope.key)
        .bind(&self.scope.env)
        .execute(&mut *tx)
        .await?;
        let insert = format!(
            r#"INSERT INTO "cluster_node" ("id", "key", "partition", "env", "workers", "updated", "expires") VALUES ($1, $2, $3, $4, $5, {}, {})"#,
            ts_param(self.dialect, 6),
            ts_param(self.dialect, 7)
        );
        sqlx::query(&self.q(&insert))
            .bind(&self.scope.instance_id)
            .bind(&self.scope.key)
            .bind(&self.scope.partition)
            .bind(&self.scope.env)
            .bind(workers)
            .bind(&updated)
            .bind(&expires)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn retract(&mut self) -> Result<()> {
        sqlx::query(&self.q(
            r#"DELETE FROM "cluster_node" WHERE "id" = $1 AND "key" = $2 AND "env" = $3"#,
        ))
        .bind(&self.scope.instance_id)
        .bind(&self.scope.key)
        .bind(&self.scope.env)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn snapshot(&mut self) -> Result<Vec<(String, i32)>> {
        let now = timestamp(Utc::now());
        let sql = match &self.scope.partition {
            Some(_) => format!(
                r#"SELECT "id", "workers" FROM "cluster_node" WHERE "key" = $1 AND "env" = $2 AND "partition" = $3 AND "expires" >= {} ORDER BY "id" ASC"#,
                ts_param(self.dialect, 4)
            ),
            None => format!(
                r#"SELECT "id", "workers" FROM "cluster_node" WHERE "key" = $1 AND "env" = $2 AND "partition" IS NULL AND "expires" >= {} ORDER BY "id" ASC"#,
                ts_param(self.dialect, 3)
            ),
        };
        let sql = self.q(&sql);
        let mut query = sqlx::query(&sql)
            .bind(&self.scope.key)
            .bind(&self.scope.env);
        if let Some(partition) = &self.scope.partition {
            query = query.bind(partition);
        }
        let rows = query.bind(&now).fetch_all(&self.pool).await?;
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id")?;
            let workers: i32 = row.try_get("workers")?;
            entries.push((id, workers));
        }
        // Collations vary per backend; every member must order byte-wise.
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(entries)
    }

    async fn wait_for_change(&mut self) -> Result<ChangeWait> {
        tokio::time::sleep(POLL_INTERVAL).await;
        let now = timestamp(Utc::now());
        let changed = match &self.last_poll {
            None => true,
            Some(last) => match self.scope_updated_since(&now, last).await {
                Ok(changed) => changed,
                Err(e) => {
                    // Transient poll failures are absorbed here; the
                    // forced-balance cap keeps the loop live.
                    tracing::warn!(error = %e, "registry change poll failed");
                    false
                }
            },
        };
        self.last_poll = Some(now);
        if changed || self.last_reported.elapsed() >= MAX_QUIET {
            self.last_reported = Instant::now();
            Ok(ChangeWait::Changed)
        } else {
            Ok(ChangeWait::Unchanged)
        }
    }
}

/// Apply any pending schema steps, recording progress in
/// `cluster_schema`. Each step runs in its own transaction.
pub(crate) async fn migrate(pool: &AnyPool, dialect: SqlDialect) -> Result<()> {
    sqlx::query(&rewrite(
        dialect,
        r#"CREATE TABLE IF NOT EXISTS "cluster_schema" ("ident" VARCHAR(64) NOT NULL, "version" INT NOT NULL, PRIMARY KEY ("ident"))"#,
    ))
    .execute(pool)
    .await?;
    let row = sqlx::query(&rewrite(
        dialect,
        r#"SELECT "version" FROM "cluster_schema" WHERE "ident" = $1"#,
    ))
    .bind(SCHEMA_IDENT)
    .fetch_optional(pool)
    .await?;
    let mut version: i32 = match row {
        Some(row) => row.try_get("version")?,
        None => 0,
    };
    while version < SCHEMA_VERSION {
        let next = version + 1;
        tracing::info!(version = next, "updating registry schema");
        let mut tx = pool.begin().await?;
        apply_migration(&mut tx, dialect, next).await?;
        sqlx::query(&rewrite(
            dialect,
            r#"DELETE FROM "cluster_schema" WHERE "ident" = $1"#,
        ))
        .bind(SCHEMA_IDENT)
        .execute(&mut *tx)
        .await?;
        sqlx::query(&rewrite(
            dialect,
            r#"INSERT INTO "cluster_schema" ("ident", "version") VALUES ($1, $2)"#,
        ))
        .bind(SCHEMA_IDENT)
        .bind(next)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        version = next;
    }
    Ok(())
}

async fn apply_migration(
    tx: &mut sqlx::Transaction<'_, sqlx::Any>,
    dialect: SqlDialect,
    version: i32,
) -> Result<()> {
    let ts = timestamp_type(dialect);
    let statements: Vec<String> = match version {
        1 => {
            let suffix = match dialect {
                SqlDialect::MySql => " ENGINE=InnoDB DEFAULT CHARSET=utf8mb4",
                _ => "",
            };
            vec![
                r#"DROP TABLE IF EXISTS "cluster_node""#.to_string(),
                format!(
                    r#"CREATE TABLE "cluster_node" ("id" VARCHAR(32) NOT NULL, "key" VARCHAR(32) NOT NULL, "env" VARCHAR(32) NOT NULL, "workers" INT NOT NULL DEFAULT 0, "updated" {ts} NOT NULL, "expires" {ts} NOT NULL, PRIMARY KEY ("id", "key", "env")){suffix}"#
                ),
            ]
        }
        2 => vec![r#"CREATE INDEX "cluster_node_key_env" ON "cluster_node" ("key", "env")"#.into()],
        3 => vec![r#"CREATE INDEX "cluster_node_expires" ON "cluster_node" ("expires")"#.into()],
        4 => vec![r#"CREATE INDEX "cluster_node_updated" ON "cluster_node" ("updated")"#.into()],
        5 => vec![
            r#"ALTER TABLE "cluster_node" ADD "partition" VARCHAR(32) DEFAULT NULL"#.into(),
            r#"CREATE INDEX "cluster_node_partition" ON "cluster_node" ("partition")"#.into(),
        ],
        6 => vec![
            r#"CREATE TABLE "cluster_data" ("key" VARCHAR(32) NOT NULL, "env" VARCHAR(32) NOT NULL, "name" VARCHAR(32) NOT NULL, "value" TEXT DEFAULT NULL, PRIMARY KEY ("key", "env", "name"))"#.into(),
            r#"CREATE INDEX "cluster_data_key_env" ON "cluster_data" ("key", "env")"#.into(),
        ],
        7 => vec![
            r#"CREATE TABLE "cluster_node_data" ("id" VARCHAR(32) NOT NULL, "key" VARCHAR(32) NOT NULL, "env" VARCHAR(32) NOT NULL, "name" VARCHAR(32) NOT NULL, "value" TEXT DEFAULT NULL, PRIMARY KEY ("id", "key", "env", "name"))"#.into(),
            r#"CREATE INDEX "cluster_node_data_id_key_env" ON "cluster_node_data" ("id", "key", "env")"#.into(),
            r#"CREATE INDEX "cluster_node_data_key_env" ON "cluster_node_data" ("key", "env")"#.into(),
        ],
        8 => vec![format!(
            r#"CREATE TABLE "cluster_job" ("id" VARCHAR(32) NOT NULL, "key" VARCHAR(32) NOT NULL, "env" VARCHAR(32) NOT NULL, "parent" VARCHAR(32) DEFAULT NULL, "status" VARCHAR(16) NOT NULL DEFAULT 'WAIT', "created" {ts} NOT NULL, "updated" {ts} NOT NULL, "node" VARCHAR(32) DEFAULT NULL, "progress" INT NOT NULL DEFAULT 0, "total" INT NOT NULL DEFAULT 1, PRIMARY KEY ("id", "key", "env"))"#
        )],
        other => {
            return Err(crate::error::Error::Invalid(format!(
                "unsupported schema version {other}"
            )))
        }
    };
    for statement in statements {
        sqlx::query(&rewrite(dialect, &statement))
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

/// Persistence handle for job records, held while joined to a SQL
/// registry. Owns its own pool so job traffic never queues behind the
/// background loops.
#[derive(Clone)]
pub(crate) struct JobStore {
    pool: AnyPool,
    dialect: SqlDialect,
    key: String,
    env: String,
}

impl JobStore {
    pub(crate) async fn connect(uri: &str, dialect: SqlDialect, scope: &Scope) -> Result<Self> {
        let pool = open_pool(uri).await?;
        Ok(Self {
            pool,
            dialect,
            key: scope.key.clone(),
            env: scope.env.clone(),
        })
    }

    pub(crate) async fn create(&self, id: &str, parent: Option<&str>, total: i32) -> Result<()> {
        let now = timestamp(Utc::now());
        let sql = format!(
            r#"INSERT INTO "cluster_job" ("id", "key", "env", "parent", "status", "created", "updated", "progress", "total") VALUES ($1, $2, $3, $4, 'WAIT', {}, {}, 0, $7)"#,
            ts_param(self.dialect, 5),
            ts_param(self.dialect, 6)
        );
        sqlx::query(&rewrite(self.dialect, &sql))
            .bind(id)
            .bind(&self.key)
            .bind(&self.env)
            .bind(parent)
            .bind(&now)
            .bind(&now)
            .bind(total)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) async fn set_status(&self, id: &str, status: &str, node: Option<&str>) -> Result<()> {
        let now = timestamp(Utc::now());
        let sql = format!(
            r#"UPDATE "cluster_job" SET "status" = $1, "node" = $2, "updated" = {} WHERE "id" = $4 AND "key" = $5 AND "env" = $6"#,
            ts_param(self.dialect, 3)
        );
        sqlx::query(&rewrite(self.dialect, &sql))
            .bind(status)
            .bind(node)
            .bind(&now)
            .bind(id)
            .bind(&self.key)
            .bind(&self.env)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) async fn set_progress(&self, id: &str, progress: i32, total: i32) -> Result<()> {
        let now = timestamp(Utc::now());
        let sql = format!(
            r#"UPDATE "cluster_job" SET "progress" = $1, "total" = $2, "updated" = {} WHERE "id" = $4 AND "key" = $5 AND "env" = $6"#,
            ts_param(self.dialect, 3)
        );
        sqlx::query(&rewrite(self.dialect, &sql))
            .bind(progress)
            .bind(total)
            .bind(&now)
            .bind(id)
            .bind(&self.key)
            .bind(&self.env)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub(crate) async fn set_parent(&self, id: &str, parent: Option<&str>) -> Result<()> {
        let now = timestamp(Utc::now());
        let sql = format!(
            r#"UPDATE "cluster_job" SET "parent" = $1, "updated" = {} WHERE "id" = $3 AND "key" = $4 AND "env" = $5"#,
            ts_param(self.dialect, 2)
        );
        sqlx::query(&rewrite(self.dialect, &sql))
            .bind(parent)
            .bind(&now)
            .bind(id)
            .bind(&self.key)
            .bind(&self.env)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_scope(instance_id: &str) -> Scope {
        Scope {
            key: "my-service".into(),
            env: "production".into(),
            partition: None,
            instance_id: instance_id.into(),
            ttl_seconds: 120,
        }
    }

    fn temp_db_uri() -> String {
        let path = std::env::temp_dir().join(format!(
            "slotcluster-registry-{}.db",
            crate::config::generate_id()
        ));
        format!("sqlite://{}?mode=rwc", path.display())
    }

    async fn test_registry(uri: &str, instance_id: &str) -> SqlRegistry {
        let mut registry =
            SqlRegistry::connect(uri, SqlDialect::Sqlite, test_scope(instance_id))
                .await
                .unwrap();
        registry.migrate_schema().await.unwrap();
        registry
    }

    #[test]
    fn mysql_rewrite_changes_placeholders_and_quotes() {
        let sql = r#"SELECT "id" FROM "cluster_node" WHERE "key" = $1 AND "workers" > $12"#;
        assert_eq!(
            rewrite(SqlDialect::MySql, sql),
            "SELECT `id` FROM `cluster_node` WHERE `key` = ? AND `workers` > ?"
        );
        assert_eq!(rewrite(SqlDialect::Postgres, sql), sql);
        assert_eq!(rewrite(SqlDialect::Sqlite, sql), sql);
    }

    #[test]
    fn timestamp_formatting_is_sortable_utc() {
        let t = DateTime::parse_from_rfc3339("2026-03-01T09:30:05Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(timestamp(t), "2026-03-01 09:30:05");
    }

    #[tokio::test]
    async fn migration_is_idempotent() {
        let uri = temp_db_uri();
        let mut registry = test_registry(&uri, "node1").await;
        // A second run must find version 8 and change nothing.
        registry.migrate_schema().await.unwrap();
        let row = sqlx::query(r#"SELECT "version" FROM "cluster_schema" WHERE "ident" = $1"#)
            .bind(SCHEMA_IDENT)
            .fetch_one(&registry.pool)
            .await
            .unwrap();
        let version: i32 = row.try_get("version").unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[tokio::test]
    async fn announce_then_snapshot_round_trips() {
        let uri = temp_db_uri();
        let mut registry = test_registry(&uri, "node1").await;
        registry.announce(2, true).await.unwrap();
        assert_eq!(
            registry.snapshot().await.unwrap(),
            vec![("node1".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn repeated_announce_is_equivalent_to_one() {
        let uri = temp_db_uri();
        let mut registry = test_registry(&uri, "node1").await;
        registry.announce(2, true).await.unwrap();
        registry.announce(2, false).await.unwrap();
        assert_eq!(
            registry.snapshot().await.unwrap(),
            vec![("node1".to_string(), 2)]
        );
    }

    #[tokio::test]
    async fn snapshot_sorts_by_instance_id() {
        let uri = temp_db_uri();
        let mut r3 = test_registry(&uri, "node3").await;
        let mut r1 = test_registry(&uri, "node1").await;
        let mut r2 = test_registry(&uri, "node2").await;
        r3.announce(4, true).await.unwrap();
        r1.announce(2, true).await.unwrap();
        r2.announce(1, true).await.unwrap();
        assert_eq!(
            r1.snapshot().await.unwrap(),
            vec![
                ("node1".to_string(), 2),
                ("node2".to_string(), 1),
                ("node3".to_string(), 4)
            ]
        );
    }

    #[tokio::test]
    async fn retract_removes_only_our_entry() {
        let uri = temp_db_uri();
        let mut r1 = test_registry(&uri, "node1").await;
        let mut r2 = test_registry(&uri, "node2").await;
        r1.announce(2, true).await.unwrap();
        r2.announce(1, true).await.unwrap();
        r1.retract().await.unwrap();
        assert_eq!(
            r2.snapshot().await.unwrap(),
            vec![("node2".to_string(), 1)]
        );
    }

    #[tokio::test]
    async fn expired_entries_are_filtered() {
        let uri = temp_db_uri();
        let mut registry = test_registry(&uri, "node1").await;
        registry.scope.ttl_seconds = 1;
        registry.announce(2, true).await.unwrap();
        assert_eq!(registry.snapshot().await.unwrap().len(), 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(registry.snapshot().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn partition_scopes_are_disjoint() {
        let uri = temp_db_uri();
        let mut plain = test_registry(&uri, "node1").await;
        let mut scoped = SqlRegistry::connect(&uri, SqlDialect::Sqlite, {
            let mut scope = test_scope("node2");
            scope.partition = Some("shard-a".into());
            scope
        })
        .await
        .unwrap();
        plain.announce(2, true).await.unwrap();
        scoped.announce(1, true).await.unwrap();
        assert_eq!(
            plain.snapshot().await.unwrap(),
            vec![("node1".to_string(), 2)]
        );
        assert_eq!(
            scoped.snapshot().await.unwrap(),
            vec![("node2".to_string(), 1)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn first_wait_always_reports_change() {
        let uri = temp_db_uri();
        let mut registry = test_registry(&uri, "node1").await;
        assert_eq!(registry.wait_for_change().await.unwrap(), ChangeWait::Changed);
    }

    #[tokio::test(start_paused = true)]
    async fn quiet_scope_reports_unchanged_until_cap() {
        let uri = temp_db_uri();
        let mut registry = test_registry(&uri, "node1").await;
        assert_eq!(registry.wait_for_change().await.unwrap(), ChangeWait::Changed);
        // Nothing written since the last poll.
        assert_eq!(
            registry.wait_for_change().await.unwrap(),
            ChangeWait::Unchanged
        );
        // Pretend the quiet period exceeded the cap.
        if let Some(past) = Instant::now().checked_sub(MAX_QUIET) {
            registry.last_reported = past;
            assert_eq!(registry.wait_for_change().await.unwrap(), ChangeWait::Changed);
        }
    }

    #[tokio::test]
    async fn job_records_round_trip() {
        let uri = temp_db_uri();
        let registry = test_registry(&uri, "node1").await;
        let store = JobStore::connect(&uri, SqlDialect::Sqlite, &test_scope("node1"))
            .await
            .unwrap();
        store.create("job123", None, 4).await.unwrap();
        store
            .set_status("job123", "ACTIVE", Some("node1"))
            .await
            .unwrap();
        store.set_progress("job123", 2, 4).await.unwrap();
        let row = sqlx::query(
            r#"SELECT "status", "node", "progress", "total" FROM "cluster_job" WHERE "id" = $1"#,
        )
        .bind("job123")
        .fetch_one(&registry.pool)
        .await
        .unwrap();
        let status: String = row.try_get("status").unwrap();
        let node: Option<String> = row.try_get("node").unwrap();
        let progress: i32 = row.try_get("progress").unwrap();
        let total: i32 = row.try_get("total").unwrap();
        assert_eq!(status, "ACTIVE");
        assert_eq!(node.as_deref(), Some("node1"));
        assert_eq!((progress, total), (2, 4));
    }
}
