//! Persistence Layer
//!
//! This module provides the SQLite store behind the ledger, the session user and the
//! recorded exchange rates, with async operations via sqlx.
//!
//! # Database Schema
//!
//! The layout is created by a provisioning script (`sql/schema.sql` by default) run
//! at startup. See [`schema`].
//!
//! ## TRANSACTIONS
//! - TRANSACTION_ID: autoincrement, gives insertion order
//! - SYMBOL: ticker (e.g., "NFLX")
//! - TYPE: "BUY" or "SELL"
//! - PRICE: price per share at execution
//! - QUANTITY: whole number of shares, > 0
//! - TRANSACTION_TMSP: insertion timestamp
//!
//! ## USER_INFO
//! - USER_ID, USER_NAME (unique), FIRST_NAME, LAST_NAME, CREATION_TMSP
//!
//! ## USER_DEPOSITS
//! - USER_ID, DEPOSIT, WITHDRAWAL, DEPOSIT_TMSP
//!
//! ## EXCHANGE_RATES
//! - normalized `CURRENCY_EXCHANGE_RATE` records

pub mod models;
pub mod repository;
pub mod schema;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::ConnectOptions;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub type DbPool = SqlitePool;

/// Database error. Only raised when a statement could not be executed; an aggregate
/// over zero rows is a valid zero, never an error.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    MigrationError(String),

    #[error("Query error: {0}")]
    QueryError(String),
}

/// Open the store and provision it with the bundled schema.
///
/// # Arguments
/// - `database_url`: SQLite URL (e.g., "sqlite://data/alpha.db" or "sqlite::memory:")
pub async fn init_database(database_url: &str) -> Result<DbPool, DatabaseError> {
    let pool = connect(&DatabaseConfig::from_url(database_url)).await?;
    schema::provision(&pool, schema::DEFAULT_SCHEMA).await?;
    Ok(pool)
}

/// Open the connection pool described by `config`.
///
/// The pool is the single long-lived store handle of a session. Connections never
/// expire on their own so an in-memory database survives for the whole session;
/// call `close()` on the pool to release it.
pub async fn connect(config: &DatabaseConfig) -> Result<DbPool, DatabaseError> {
    info!("Opening database: {}", config.url);

    // Ensure data directory exists
    if let Some(db_path) = config.url.strip_prefix("sqlite://") {
        if let Some(parent) = Path::new(db_path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    DatabaseError::ConnectionError(sqlx::Error::Configuration(Box::new(e)))
                })?;
            }
        }
    }

    let mut options = SqliteConnectOptions::from_str(&config.url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .log_statements(tracing::log::LevelFilter::Debug);
    if !config.log_queries {
        options = options.disable_statement_logging();
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(config.max_connections)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Database URL (e.g., "sqlite://data/alpha.db")
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Log every statement at debug level
    pub log_queries: bool,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://data/alpha.db".to_string(),
            max_connections: 1,
            log_queries: true,
        }
    }
}

impl DatabaseConfig {
    pub fn from_url(url: &str) -> Self {
        Self {
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// Configuration for a database file on disk.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        Self::from_url(&format!("sqlite://{}", path.as_ref().display()))
    }
}
