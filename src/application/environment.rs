//! Session environment.
//!
//! Owns the store handle, the quote client and the account ledger for one run, plus
//! a snapshot of the session user and wallet taken at construction. The snapshot is
//! only re-read by an explicit [`Environment::refresh`].

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::domain::entities::user::{User, Wallet};
use crate::domain::errors::{AccountError, LedgerError};
use crate::domain::repositories::quote_source::{QuoteError, QuoteSource};
use crate::domain::services::ledger::AccountLedger;
use crate::infrastructure::alpha_vantage_client::AlphaVantageClient;
use crate::persistence::models::CreateExchangeRate;
use crate::persistence::repository::{AccountRepository, ExchangeRateRepository, TransactionRepository};
use crate::persistence::{self, schema, DatabaseError, DbPool};

#[derive(Debug, Error)]
pub enum EnvironmentError {
    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Account(#[from] AccountError),

    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

pub struct Environment {
    config: AppConfig,
    pool: DbPool,
    accounts: AccountRepository,
    rates: ExchangeRateRepository,
    quotes: Arc<dyn QuoteSource>,
    ledger: AccountLedger,
    user: User,
    wallet: Wallet,
}

impl Environment {
    /// Open the store, build the Alpha Vantage client, provision and load the user.
    /// The store is closed again if any later step fails.
    pub async fn new(config: AppConfig) -> Result<Self, EnvironmentError> {
        let pool = persistence::connect(&config.database_config()).await?;

        let quotes: Arc<dyn QuoteSource> = match AlphaVantageClient::new(config.quote_config()) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                pool.close().await;
                return Err(e.into());
            }
        };

        match Self::assemble(config, pool.clone(), quotes).await {
            Ok(env) => Ok(env),
            Err(e) => {
                pool.close().await;
                Err(e)
            }
        }
    }

    /// Build an environment over an open store and any quote source.
    pub async fn assemble(
        config: AppConfig,
        pool: DbPool,
        quotes: Arc<dyn QuoteSource>,
    ) -> Result<Self, EnvironmentError> {
        info!("Quote source: {}", quotes.name());

        let accounts = AccountRepository::new(pool.clone());
        let ledger = AccountLedger::new(
            TransactionRepository::new(pool.clone()),
            quotes.clone(),
            config.broker.fee,
        );

        let rates = ExchangeRateRepository::new(pool.clone());

        provision(&pool, &config).await?;
        let (user, wallet) = load_snapshot(&accounts, &config.general.username).await?;

        Ok(Self {
            config,
            pool,
            accounts,
            rates,
            quotes,
            ledger,
            user,
            wallet,
        })
    }

    /// Run the configured provisioning script. Safe to repeat.
    pub async fn initialize(&self) -> Result<usize, EnvironmentError> {
        provision(&self.pool, &self.config).await
    }

    /// Look a user up by username.
    pub async fn load_user(&self, username: &str) -> Result<User, AccountError> {
        load_user(&self.accounts, username).await
    }

    /// Deposits minus withdrawals of a user, 0 without cash movements.
    pub async fn load_wallet(&self, user_id: i64) -> Result<Wallet, AccountError> {
        Ok(self.accounts.wallet(user_id).await?)
    }

    /// Re-read the session user and wallet.
    pub async fn refresh(&mut self) -> Result<(), EnvironmentError> {
        let (user, wallet) = load_snapshot(&self.accounts, &self.config.general.username).await?;
        self.user = user;
        self.wallet = wallet;
        Ok(())
    }

    /// Fetch the current rate between two currencies and store it.
    pub async fn record_exchange_rate(
        &self,
        from_currency: &str,
        to_currency: &str,
    ) -> Result<i64, EnvironmentError> {
        let record = self.quotes.get_rate(from_currency, to_currency).await?;
        let rate = CreateExchangeRate::try_from(&record)?;
        info!(
            "{}/{} = {}",
            rate.from_currency_code, rate.to_currency_code, rate.exchange_rate
        );
        Ok(self.rates.record(&rate).await?)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    pub fn ledger(&self) -> &AccountLedger {
        &self.ledger
    }

    pub fn exchange_rates(&self) -> &ExchangeRateRepository {
        &self.rates
    }

    /// Release the store handle.
    pub async fn close(self) {
        debug!("Closing database");
        self.pool.close().await;
    }
}

async fn provision(pool: &DbPool, config: &AppConfig) -> Result<usize, EnvironmentError> {
    info!("-------------- Initialization --------------");
    info!(
        "Initializing SQL Environment from {}",
        config.environment.sql.display()
    );
    Ok(schema::provision_from_file(pool, &config.environment.sql).await?)
}

async fn load_user(accounts: &AccountRepository, username: &str) -> Result<User, AccountError> {
    accounts
        .find_user(username)
        .await?
        .ok_or_else(|| AccountError::UserNotFound {
            username: username.to_string(),
        })
}

async fn load_snapshot(
    accounts: &AccountRepository,
    username: &str,
) -> Result<(User, Wallet), AccountError> {
    let user = load_user(accounts, username).await?;
    let wallet = accounts.wallet(user.user_id).await?;
    debug!(
        "Loaded user {} ({}), balance {:.2}",
        user.username, user.user_id, wallet.balance
    );
    Ok((user, wallet))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repositories::quote_source::{QuoteRecord, QuoteResult};
    use crate::persistence::{connect, DatabaseConfig};
    use async_trait::async_trait;
    use std::path::Path;

    struct StaticQuotes;

    #[async_trait]
    impl QuoteSource for StaticQuotes {
        fn name(&self) -> &str {
            "static"
        }

        async fn get_quote(&self, _symbol: &str) -> QuoteResult<QuoteRecord> {
            Ok(QuoteRecord::from_raw("GLOBAL_QUOTE", [("05. price", "100.0000")]))
        }

        async fn get_rate(&self, from: &str, to: &str) -> QuoteResult<QuoteRecord> {
            Ok(QuoteRecord::from_raw(
                "CURRENCY_EXCHANGE_RATE",
                [
                    ("1. From_Currency Code", from),
                    ("3. To_Currency Code", to),
                    ("5. Exchange Rate", "1.25000000"),
                    ("7. Time Zone", "UTC"),
                ],
            ))
        }
    }

    fn test_config(dir: &Path) -> AppConfig {
        let sql = dir.join("schema.sql");
        std::fs::write(&sql, schema::DEFAULT_SCHEMA).unwrap();

        let mut config = AppConfig::default();
        config.environment.sql = sql;
        config.database.path = dir.join("alpha.db");
        config.api.api_key = "demo".to_string();
        config
    }

    async fn environment(config: AppConfig) -> Result<Environment, EnvironmentError> {
        let pool = connect(&DatabaseConfig::from_url("sqlite::memory:"))
            .await
            .unwrap();
        Environment::assemble(config, pool, Arc::new(StaticQuotes)).await
    }

    #[tokio::test]
    async fn test_assemble_loads_user_and_empty_wallet() {
        let dir = tempfile::tempdir().unwrap();
        let env = environment(test_config(dir.path())).await.unwrap();

        assert_eq!(env.user().username, "trader");
        assert_eq!(env.user().first_name, "Alpha");
        assert_eq!(env.wallet().user_id, env.user().user_id);
        assert_eq!(env.wallet().balance, 0.0);
        assert_eq!(env.ledger().fee(), 1.0);
        env.close().await;
    }

    #[tokio::test]
    async fn test_unknown_user_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.general.username = "ghost".to_string();

        match environment(config).await {
            Err(EnvironmentError::Account(AccountError::UserNotFound { username })) => {
                assert_eq!(username, "ghost");
            }
            Err(other) => panic!("expected UserNotFound, got {:?}", other),
            Ok(_) => panic!("expected UserNotFound"),
        }
    }

    #[tokio::test]
    async fn test_missing_sql_script() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.environment.sql = dir.path().join("missing.sql");

        assert!(matches!(
            environment(config).await,
            Err(EnvironmentError::Database(DatabaseError::MigrationError(_)))
        ));
    }

    #[tokio::test]
    async fn test_wallet_is_a_snapshot_until_refresh() {
        let dir = tempfile::tempdir().unwrap();
        let mut env = environment(test_config(dir.path())).await.unwrap();
        let accounts = AccountRepository::new(env.pool.clone());

        accounts.deposit(env.user().user_id, 500.0).await.unwrap();
        assert_eq!(env.wallet().balance, 0.0);

        env.refresh().await.unwrap();
        assert_eq!(env.wallet().balance, 500.0);
    }

    #[tokio::test]
    async fn test_load_user_and_wallet_by_id() {
        let dir = tempfile::tempdir().unwrap();
        let env = environment(test_config(dir.path())).await.unwrap();

        let user = env.load_user("trader").await.unwrap();
        assert_eq!(&user, env.user());
        assert_eq!(env.load_wallet(user.user_id).await.unwrap().balance, 0.0);

        // Unknown ids have no cash movement either
        assert_eq!(env.load_wallet(9999).await.unwrap().balance, 0.0);

        match env.load_user("ghost").await {
            Err(AccountError::UserNotFound { username }) => assert_eq!(username, "ghost"),
            other => panic!("expected UserNotFound, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_initialize_is_repeatable() {
        let dir = tempfile::tempdir().unwrap();
        let env = environment(test_config(dir.path())).await.unwrap();

        env.ledger().buy("NFLX", 2).await.unwrap();
        assert_eq!(env.initialize().await.unwrap(), 7);
        assert_eq!(env.ledger().shares_owned("NFLX").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_record_exchange_rate() {
        let dir = tempfile::tempdir().unwrap();
        let env = environment(test_config(dir.path())).await.unwrap();

        let id = env.record_exchange_rate("USD", "EUR").await.unwrap();
        assert!(id > 0);
        assert_eq!(
            env.exchange_rates().latest("USD", "EUR").await.unwrap(),
            Some(1.25)
        );
    }

    #[tokio::test]
    async fn test_new_opens_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = test_config(dir.path());
        let db_path = config.database.path.clone();

        let env = Environment::new(config).await.unwrap();
        assert_eq!(env.user().username, "trader");
        env.close().await;

        assert!(db_path.exists());
    }
}
