use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::domain::entities::transaction::normalize_symbol;
use crate::domain::services::ledger::DEFAULT_FEE;
use crate::infrastructure::alpha_vantage_client::{
    AlphaVantageConfig, ALPHA_VANTAGE_API_BASE, DEFAULT_TIMEOUT_SECONDS,
};
use crate::persistence::DatabaseConfig;

/// Used when `ALPHA_TRADING_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "config/alpha_trading.toml";
pub const CONFIG_PATH_ENV: &str = "ALPHA_TRADING_CONFIG";

/// Optional file next to the main config, holding secrets kept out of version control
const CREDENTIALS_FILE: &str = "credentials.toml";

/// Prefix of environment overrides, e.g. `ALPHA__API__API_KEY`
const ENV_PREFIX: &str = "ALPHA";
const ENV_SEPARATOR: &str = "__";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] ::config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseSection,
    pub api: ApiSection,
    pub environment: EnvironmentSection,
    pub general: GeneralSection,
    pub broker: BrokerSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSection {
    /// SQLite database file, created on first use
    pub path: PathBuf,
    /// Log every statement at debug level
    pub log_queries: bool,
}

impl Default for DatabaseSection {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data/alpha.db"),
            log_queries: true,
        }
    }
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    pub url: String,
    pub api_key: String,
    pub timeout_seconds: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            url: ALPHA_VANTAGE_API_BASE.to_string(),
            api_key: String::new(),
            timeout_seconds: DEFAULT_TIMEOUT_SECONDS,
        }
    }
}

impl std::fmt::Debug for ApiSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiSection")
            .field("url", &self.url)
            .field("api_key", &"<redacted>")
            .field("timeout_seconds", &self.timeout_seconds)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EnvironmentSection {
    /// Provisioning script run at startup
    pub sql: PathBuf,
    /// Directory receiving one log file per run
    pub log_dir: PathBuf,
}

impl Default for EnvironmentSection {
    fn default() -> Self {
        Self {
            sql: PathBuf::from("sql/schema.sql"),
            log_dir: PathBuf::from("logs"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GeneralSection {
    /// Session user, looked up in USER_INFO
    pub username: String,
    /// Symbols reported at startup
    pub symbols: Vec<String>,
}

impl Default for GeneralSection {
    fn default() -> Self {
        Self {
            username: "trader".to_string(),
            symbols: vec!["NFLX".to_string()],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerSection {
    /// Flat fee per ledger row
    pub fee: f64,
}

impl Default for BrokerSection {
    fn default() -> Self {
        Self { fee: DEFAULT_FEE }
    }
}

impl AppConfig {
    /// Load from the path in `ALPHA_TRADING_CONFIG`, or `config/alpha_trading.toml`.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(path)
    }

    /// Load `path`, then an optional sibling `credentials.toml`, then `ALPHA__*`
    /// environment overrides. Later sources win.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        Self::from_sources(path.as_ref(), environment_overrides())
    }

    fn from_sources(path: &Path, env: ::config::Environment) -> Result<Self, ConfigError> {
        tracing::debug!("Loading configuration from {}", path.display());

        let settings = ::config::Config::builder()
            .add_source(::config::File::from(path))
            .add_source(::config::File::from(path.with_file_name(CREDENTIALS_FILE)).required(false))
            .add_source(env)
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.username.trim().is_empty() {
            return Err(ConfigError::Invalid("general.username must not be empty".to_string()));
        }
        if self.api.url.trim().is_empty() {
            return Err(ConfigError::Invalid("api.url must not be empty".to_string()));
        }
        if self.api.api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "api.api_key is not set (config file, credentials.toml or ALPHA__API__API_KEY)"
                    .to_string(),
            ));
        }
        if self.api.timeout_seconds == 0 {
            return Err(ConfigError::Invalid("api.timeout_seconds must be > 0".to_string()));
        }
        if !self.broker.fee.is_finite() || self.broker.fee < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "broker.fee must be a non-negative number, got {}",
                self.broker.fee
            )));
        }
        for symbol in &self.general.symbols {
            normalize_symbol(symbol)
                .map_err(|e| ConfigError::Invalid(format!("general.symbols: {}", e)))?;
        }
        Ok(())
    }

    pub fn database_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            log_queries: self.database.log_queries,
            ..DatabaseConfig::from_path(&self.database.path)
        }
    }

    pub fn quote_config(&self) -> AlphaVantageConfig {
        AlphaVantageConfig::new(&self.api.url, &self.api.api_key)
            .with_timeout(Duration::from_secs(self.api.timeout_seconds))
    }
}

fn environment_overrides() -> ::config::Environment {
    ::config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
