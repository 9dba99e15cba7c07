//! Configuration management for pixproxy.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `PIXPROXY_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use pixproxy::config::Config;
//!
//! let config = Config::parse();
//! println!("Listening on {}", config.bind_address());
//! println!("Cache backend: {}", config.cache);
//! ```
//!
//! # Environment Variables
//!
//! - `PIXPROXY_HOST` - Server bind address (default: 0.0.0.0)
//! - `PIXPROXY_PORT` - Server port (default: 8080)
//! - `PIXPROXY_CACHE` - Cache backend, `memory` or `sql` (default: memory)
//! - `PIXPROXY_CACHE_MAX_MB` - Cache byte budget in MiB (default: 8000)
//! - `PIXPROXY_DB_TYPE` - SQL engine, `sqlite` or `mysql` (default: sqlite)
//! - `PIXPROXY_DB_FILE` - SQLite database path (default: ./cache.db)
//! - `PIXPROXY_DB_HOST` - MySQL `host[:port]` (default: localhost:3306)
//! - `PIXPROXY_DB_USER` / `PIXPROXY_DB_PASS` - MySQL credentials (default: root, empty)
//! - `PIXPROXY_DB_NAME` - MySQL database name (default: pixproxy)
//! - `PIXPROXY_DB_CONNS` - SQL connection pool size (default: 10)
//! - `PIXPROXY_DB_WAIT` - Retry until the database is reachable at startup
//! - `PIXPROXY_ENFORCE_INTERVAL_MS` - Budget enforcement period (default: 1000)
//! - `PIXPROXY_STATS_INTERVAL_SECS` - Stats logging period (default: 10)
//! - `PIXPROXY_FETCH_TIMEOUT_SECS` - Source fetch timeout (default: 30)
//! - `PIXPROXY_MAX_SOURCE_MB` - Largest accepted source image in MiB (default: 100)
//! - `PIXPROXY_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, ValueEnum};

use crate::cache::{SqlTarget, DEFAULT_MAX_CONNECTIONS};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 8080;

/// Default cache budget in MiB.
pub const DEFAULT_CACHE_MAX_MB: u64 = 8000;

/// Default SQLite database path.
pub const DEFAULT_DB_FILE: &str = "./cache.db";

/// Default MySQL address.
pub const DEFAULT_DB_HOST: &str = "localhost:3306";

/// Port used when `--db-host` names none.
pub const DEFAULT_MYSQL_PORT: u16 = 3306;

/// Default MySQL user.
pub const DEFAULT_DB_USER: &str = "root";

/// Default MySQL database name.
pub const DEFAULT_DB_NAME: &str = "pixproxy";

/// Default budget enforcement interval in milliseconds.
pub const DEFAULT_ENFORCE_INTERVAL_MS: u64 = 1000;

/// Default stats logging interval in seconds.
pub const DEFAULT_STATS_INTERVAL_SECS: u64 = 10;

/// Default source fetch timeout in seconds.
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Default limit on a source image in MiB.
pub const DEFAULT_MAX_SOURCE_MB: u64 = 100;

/// Default HTTP cache max-age in seconds (1 hour).
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Cache Backend
// =============================================================================

/// Which cache store to construct at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CacheBackend {
    /// In-process LRU, lost on restart
    Memory,
    /// SQL table, survives restarts
    Sql,
}

impl fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheBackend::Memory => write!(f, "memory"),
            CacheBackend::Sql => write!(f, "sql"),
        }
    }
}

/// SQL engine behind the `sql` cache backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DbType {
    /// Local database file
    Sqlite,
    /// Networked MySQL server
    Mysql,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbType::Sqlite => write!(f, "sqlite"),
            DbType::Mysql => write!(f, "mysql"),
        }
    }
}

// =============================================================================
// CLI Arguments
// =============================================================================

/// pixproxy - An on-demand image transformation proxy.
///
/// Fetches remote images, resizes and re-encodes them, and memoizes the
/// results in memory or in a SQLite or MySQL database.
#[derive(Parser, Debug, Clone)]
#[command(name = "pixproxy")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PIXPROXY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PIXPROXY_PORT")]
    pub port: u16,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "PIXPROXY_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // Cache Configuration
    // =========================================================================
    /// Cache backend.
    #[arg(long, value_enum, default_value_t = CacheBackend::Memory, env = "PIXPROXY_CACHE")]
    pub cache: CacheBackend,

    /// Cache byte budget in MiB.
    ///
    /// The oldest entries are evicted while the cache is above this size.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_MB, env = "PIXPROXY_CACHE_MAX_MB")]
    pub cache_max_mb: u64,

    /// Budget enforcement interval in milliseconds.
    #[arg(long, default_value_t = DEFAULT_ENFORCE_INTERVAL_MS, env = "PIXPROXY_ENFORCE_INTERVAL_MS")]
    pub enforce_interval_ms: u64,

    /// Cache statistics logging interval in seconds (0 disables stats logging).
    #[arg(long, default_value_t = DEFAULT_STATS_INTERVAL_SECS, env = "PIXPROXY_STATS_INTERVAL_SECS")]
    pub stats_interval_secs: u64,

    // =========================================================================
    // SQL Backend Configuration
    // =========================================================================
    /// SQL engine, used when `--cache sql` is selected.
    #[arg(long, value_enum, default_value_t = DbType::Sqlite, env = "PIXPROXY_DB_TYPE")]
    pub db_type: DbType,

    /// SQLite database file.
    #[arg(long, default_value = DEFAULT_DB_FILE, env = "PIXPROXY_DB_FILE")]
    pub db_file: PathBuf,

    /// MySQL server as `host[:port]`.
    #[arg(long, default_value = DEFAULT_DB_HOST, env = "PIXPROXY_DB_HOST")]
    pub db_host: String,

    /// MySQL user.
    #[arg(long, default_value = DEFAULT_DB_USER, env = "PIXPROXY_DB_USER")]
    pub db_user: String,

    /// MySQL password.
    #[arg(long, default_value = "", env = "PIXPROXY_DB_PASS", hide_env_values = true)]
    pub db_pass: String,

    /// MySQL database name.
    #[arg(long, default_value = DEFAULT_DB_NAME, env = "PIXPROXY_DB_NAME")]
    pub db_name: String,

    /// Maximum pooled database connections.
    #[arg(long, default_value_t = DEFAULT_MAX_CONNECTIONS, env = "PIXPROXY_DB_CONNS")]
    pub db_conns: u32,

    /// Keep retrying until the database is reachable instead of exiting.
    #[arg(long, default_value_t = false, env = "PIXPROXY_DB_WAIT")]
    pub db_wait: bool,

    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Timeout for fetching source images, in seconds.
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT_SECS, env = "PIXPROXY_FETCH_TIMEOUT_SECS")]
    pub fetch_timeout_secs: u64,

    /// Largest accepted source image in MiB.
    #[arg(long, default_value_t = DEFAULT_MAX_SOURCE_MB, env = "PIXPROXY_MAX_SOURCE_MB")]
    pub max_source_mb: u64,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache_max_mb == 0 {
            return Err("cache_max_mb must be greater than 0".to_string());
        }

        if self.enforce_interval_ms == 0 {
            return Err("enforce_interval_ms must be greater than 0".to_string());
        }

        if self.fetch_timeout_secs == 0 {
            return Err("fetch_timeout_secs must be greater than 0".to_string());
        }

        if self.max_source_mb == 0 {
            return Err("max_source_mb must be greater than 0".to_string());
        }

        if self.cache == CacheBackend::Sql {
            if self.db_conns == 0 {
                return Err("db_conns must be greater than 0".to_string());
            }
            self.sql_target()?;
        }

        Ok(())
    }

    /// Describe the database selected by the `--db-*` options.
    pub fn sql_target(&self) -> Result<SqlTarget, String> {
        match self.db_type {
            DbType::Sqlite => {
                if self.db_file.as_os_str().is_empty() {
                    return Err("SQLite cache selected but no database file given. \
                         Set --db-file or PIXPROXY_DB_FILE"
                        .to_string());
                }
                Ok(SqlTarget::Sqlite {
                    path: self.db_file.clone(),
                })
            }
            DbType::Mysql => {
                let (host, port) = parse_db_host(&self.db_host)?;
                Ok(SqlTarget::MySql {
                    host,
                    port,
                    user: self.db_user.clone(),
                    password: self.db_pass.clone(),
                    database: self.db_name.clone(),
                })
            }
        }
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Cache budget in bytes.
    pub fn budget_bytes(&self) -> u64 {
        self.cache_max_mb.saturating_mul(1024 * 1024)
    }

    /// Budget enforcement period.
    pub fn enforce_interval(&self) -> Duration {
        Duration::from_millis(self.enforce_interval_ms)
    }

    /// Stats logging period.
    pub fn stats_interval(&self) -> Duration {
        Duration::from_secs(self.stats_interval_secs)
    }

    /// Source fetch timeout.
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Source size limit in bytes.
    pub fn max_source_bytes(&self) -> u64 {
        self.max_source_mb.saturating_mul(1024 * 1024)
    }
}

/// Split `host[:port]`, defaulting to the MySQL port.
fn parse_db_host(value: &str) -> Result<(String, u16), String> {
    let (host, port) = match value.rsplit_once(':') {
        Some((host, port)) => {
            let port = port
                .parse::<u16>()
                .map_err(|_| format!("invalid port in db_host '{}'", value))?;
            (host, port)
        }
        None => (value, DEFAULT_MYSQL_PORT),
    };

    if host.is_empty() {
        return Err("MySQL cache selected but db_host is empty".to_string());
    }

    Ok((host.to_string(), port))
}

// =============================================================================
// Tests
// =============================================================================
