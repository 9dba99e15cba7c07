//! Persistent SQL cache backend.
//!
//! Entries live in a single `cache` table keyed by the cache key. Two
//! databases are supported through connection pools:
//!
//! - **SQLite**: a local file in WAL mode, so readers never wait on the
//!   writer
//! - **MySQL**: a networked server shared by several proxy instances
//!
//! # Eviction order
//!
//! Upserts delete the conflicting row and insert a new one (`INSERT OR
//! REPLACE` on SQLite, `REPLACE INTO` on MySQL), which allocates a fresh
//! row id. Ordering by that id is therefore insertion order, and
//! `delete_oldest` removes the smallest one. Reads have no ordering side
//! effect.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use sqlx::mysql::{MySqlConnectOptions, MySqlPool, MySqlPoolOptions};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use tracing::{debug, info, warn};

use crate::error::CacheError;

use super::store::{CacheStats, CacheStore};

/// Default pool size.
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;

/// Pause between connection attempts while waiting for the database.
pub const DB_RETRY_DELAY: Duration = Duration::from_secs(5);

/// How long a SQLite connection waits on a locked database.
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const SQLITE_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cache (
    `key` TEXT PRIMARY KEY,
    value BLOB
)";

const MYSQL_SCHEMA: &str = "CREATE TABLE IF NOT EXISTS cache (
    id BIGINT NOT NULL AUTO_INCREMENT PRIMARY KEY,
    `key` VARCHAR(768) NOT NULL,
    value LONGBLOB,
    UNIQUE KEY cache_key (`key`)
)";

const SELECT_VALUE: &str = "SELECT value FROM cache WHERE `key` = ?";

// =============================================================================
// Connection Targets
// =============================================================================

/// Where the persistent cache lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlTarget {
    /// A local SQLite database file
    Sqlite { path: PathBuf },

    /// A MySQL server
    MySql {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
}

impl SqlTarget {
    /// Short name of the database engine.
    pub fn engine(&self) -> &'static str {
        match self {
            SqlTarget::Sqlite { .. } => "sqlite",
            SqlTarget::MySql { .. } => "mysql",
        }
    }
}

#[derive(Clone)]
enum Pool {
    Sqlite(SqlitePool),
    MySql(MySqlPool),
}

// =============================================================================
// Store
// =============================================================================

/// SQL-backed cache store that survives restarts.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct PersistentStore {
    pool: Pool,
}

impl PersistentStore {
    /// Open (or create) a SQLite file with the default pool size.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        Self::open_sqlite(path, DEFAULT_MAX_CONNECTIONS).await
    }

    /// Open (or create) a SQLite file in WAL mode with up to
    /// `max_connections` pooled connections.
    pub async fn open_sqlite(
        path: impl AsRef<Path>,
        max_connections: u32,
    ) -> Result<Self, CacheError> {
        let path = path.as_ref();
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(SQLITE_BUSY_TIMEOUT);

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await?;

        debug!(path = %path.display(), max_connections, "Opened SQLite cache");
        Self::from_pool(Pool::Sqlite(pool)).await
    }

    /// Create a store backed by a private in-memory SQLite database.
    ///
    /// Every SQLite connection to `:memory:` is its own database, so the
    /// pool holds exactly one connection and never recycles it.
    pub async fn open_in_memory() -> Result<Self, CacheError> {
        let options: SqliteConnectOptions = "sqlite::memory:".parse()?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        Self::from_pool(Pool::Sqlite(pool)).await
    }

    /// Connect to a MySQL server with up to `max_connections` pooled
    /// connections.
    pub async fn connect_mysql(
        host: &str,
        port: u16,
        user: &str,
        password: &str,
        database: &str,
        max_connections: u32,
    ) -> Result<Self, CacheError> {
        let options = MySqlConnectOptions::new()
            .host(host)
            .port(port)
            .username(user)
            .password(password)
            .database(database);

        let pool = MySqlPoolOptions::new()
            .max_connections(max_connections)
            .max_lifetime(Duration::from_secs(180))
            .idle_timeout(Duration::from_secs(120))
            .connect_with(options)
            .await?;

        debug!(host, port, database, max_connections, "Connected to MySQL cache");
        Self::from_pool(Pool::MySql(pool)).await
    }

    /// Open the store described by `target`.
    pub async fn connect(target: &SqlTarget, max_connections: u32) -> Result<Self, CacheError> {
        match target {
            SqlTarget::Sqlite { path } => Self::open_sqlite(path, max_connections).await,
            SqlTarget::MySql {
                host,
                port,
                user,
                password,
                database,
            } => {
                Self::connect_mysql(host, *port, user, password, database, max_connections).await
            }
        }
    }

    /// Open the store described by `target`, retrying every
    /// [`DB_RETRY_DELAY`] until the database answers when `wait` is set.
    pub async fn connect_waiting(
        target: &SqlTarget,
        max_connections: u32,
        wait: bool,
    ) -> Result<Self, CacheError> {
        let store = retry_until_ready(wait, DB_RETRY_DELAY, || {
            Self::connect(target, max_connections)
        })
        .await?;

        info!(engine = target.engine(), "Cache database ready");
        Ok(store)
    }

    async fn from_pool(pool: Pool) -> Result<Self, CacheError> {
        match &pool {
            Pool::Sqlite(p) => {
                sqlx::query(SQLITE_SCHEMA).execute(p).await?;
            }
            Pool::MySql(p) => {
                sqlx::query(MYSQL_SCHEMA).execute(p).await?;
            }
        }
        Ok(Self { pool })
    }
}

/// Run `attempt` until it succeeds, sleeping `delay` between failures.
///
/// Without `wait` the first failure is returned as-is.
pub(crate) async fn retry_until_ready<T, F, Fut>(
    wait: bool,
    delay: Duration,
    mut attempt: F,
) -> Result<T, CacheError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CacheError>>,
{
    let mut attempts: u32 = 1;
    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if wait => {
                warn!(attempt = attempts, error = %e, "Database not ready, retrying in {:?}", delay);
                tokio::time::sleep(delay).await;
                attempts += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

fn to_u64(n: i64) -> u64 {
    n.max(0) as u64
}

#[async_trait]
impl CacheStore for PersistentStore {
    async fn get(&self, key: &str) -> Result<Option<Bytes>, CacheError> {
        let value: Option<Option<Vec<u8>>> = match &self.pool {
            Pool::Sqlite(p) => {
                sqlx::query_scalar(SELECT_VALUE)
                    .bind(key)
                    .fetch_optional(p)
                    .await?
            }
            Pool::MySql(p) => {
                sqlx::query_scalar(SELECT_VALUE)
                    .bind(key)
                    .fetch_optional(p)
                    .await?
            }
        };

        Ok(value.flatten().map(Bytes::from))
    }

    async fn set(&self, key: &str, value: Bytes) -> Result<(), CacheError> {
        match &self.pool {
            Pool::Sqlite(p) => {
                sqlx::query("INSERT OR REPLACE INTO cache (`key`, value) VALUES (?, ?)")
                    .bind(key)
                    .bind(&value[..])
                    .execute(p)
                    .await?;
            }
            Pool::MySql(p) => {
                sqlx::query("REPLACE INTO cache (`key`, value) VALUES (?, ?)")
                    .bind(key)
                    .bind(&value[..])
                    .execute(p)
                    .await?;
            }
        }
        Ok(())
    }

    async fn stats(&self) -> Result<CacheStats, CacheError> {
        let (count, total): (i64, i64) = match &self.pool {
            Pool::Sqlite(p) => {
                sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(LENGTH(value)), 0) FROM cache")
                    .fetch_one(p)
                    .await?
            }
            Pool::MySql(p) => {
                sqlx::query_as(
                    "SELECT COUNT(*), CAST(COALESCE(SUM(LENGTH(value)), 0) AS SIGNED) FROM cache",
                )
                .fetch_one(p)
                .await?
            }
        };

        Ok(CacheStats {
            count: to_u64(count),
            total_bytes: to_u64(total),
        })
    }

    async fn delete_oldest(&self) -> Result<Option<u64>, CacheError> {
        let oldest: Option<(i64, Option<i64>)> = match &self.pool {
            Pool::Sqlite(p) => {
                let mut tx = p.begin().await?;
                let oldest: Option<(i64, Option<i64>)> = sqlx::query_as(
                    "SELECT rowid, LENGTH(value) FROM cache ORDER BY rowid ASC LIMIT 1",
                )
                .fetch_optional(&mut *tx)
                .await?;
                if let Some((rowid, _)) = oldest {
                    sqlx::query("DELETE FROM cache WHERE rowid = ?")
                        .bind(rowid)
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
                oldest
            }
            Pool::MySql(p) => {
                let mut tx = p.begin().await?;
                let oldest: Option<(i64, Option<i64>)> = sqlx::query_as(
                    "SELECT id, CAST(LENGTH(value) AS SIGNED) FROM cache \
                     ORDER BY id ASC LIMIT 1 FOR UPDATE",
                )
                .fetch_optional(&mut *tx)
                .await?;
                if let Some((id, _)) = oldest {
                    sqlx::query("DELETE FROM cache WHERE id = ?")
                        .bind(id)
                        .execute(&mut *tx)
                        .await?;
                }
                tx.commit().await?;
                oldest
            }
        };

        Ok(oldest.map(|(_, size)| to_u64(size.unwrap_or(0))))
    }

    fn name(&self) -> &'static str {
        match self.pool {
            Pool::Sqlite(_) => "sqlite",
            Pool::MySql(_) => "mysql",
        }
    }
}
