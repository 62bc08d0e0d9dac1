//! Database Repository
//!
//! Data access layer for the transaction ledger, the session user and exchange rates.
//!
//! The ledger queries are free functions generic over the sqlx executor so the same
//! statement runs either on the pool or inside an open store transaction (see
//! `AccountLedger::sell`). Aggregates coalesce to zero: a symbol without rows owns
//! zero shares and has zero cost, and only a statement that cannot run is an error.

use sqlx::{Executor, Sqlite};
use tracing::{debug, error};

use super::models::*;
use super::{DatabaseError, DbPool};
use crate::domain::entities::transaction::{Transaction, TransactionType};
use crate::domain::entities::user::{User, Wallet};

const TRANSACTION_COLUMNS: &str = "TRANSACTION_ID AS id, SYMBOL AS symbol, TYPE AS kind, \
     PRICE AS price, QUANTITY AS quantity, TRANSACTION_TMSP AS executed_at";

/// Store transaction handle used for check-then-insert sequences
pub type StoreTransaction = sqlx::Transaction<'static, Sqlite>;

/// Append one row to the ledger
pub async fn insert_transaction<'e, E>(
    executor: E,
    transaction: &CreateTransaction,
) -> Result<TransactionRecord, DatabaseError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let sql = format!(
        "INSERT INTO TRANSACTIONS (SYMBOL, TYPE, PRICE, QUANTITY) VALUES (?1, ?2, ?3, ?4) RETURNING {}",
        TRANSACTION_COLUMNS
    );
    let record = sqlx::query_as::<_, TransactionRecord>(&sql)
        .bind(&transaction.symbol)
        .bind(transaction.kind.as_str())
        .bind(transaction.price.value())
        .bind(transaction.quantity.value())
        .fetch_one(executor)
        .await
        .map_err(|e| {
            error!("Failed to record {} {}: {}", transaction.kind, transaction.symbol, e);
            DatabaseError::QueryError(format!("Failed to record transaction: {}", e))
        })?;

    debug!(
        "Recorded transaction {}: {} {} {} @ {}",
        record.id, record.kind, record.quantity, record.symbol, record.price
    );
    Ok(record)
}

/// Sum of QUANTITY for a symbol and type, 0 when no row matches
pub async fn total_quantity<'e, E>(
    executor: E,
    symbol: &str,
    kind: TransactionType,
) -> Result<i64, DatabaseError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let total: i64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(QUANTITY), 0) FROM TRANSACTIONS WHERE SYMBOL = ?1 AND TYPE = ?2",
    )
    .bind(symbol)
    .bind(kind.as_str())
    .fetch_one(executor)
    .await
    .map_err(|e| {
        error!("Failed to sum {} quantity for {}: {}", kind, symbol, e);
        DatabaseError::QueryError(format!("Failed to sum quantity: {}", e))
    })?;

    Ok(total)
}

/// Sum of `PRICE * QUANTITY - fee` for a symbol and type, 0 when no row matches.
/// The fee is subtracted once per row.
pub async fn fee_adjusted_total<'e, E>(
    executor: E,
    symbol: &str,
    kind: TransactionType,
    fee: f64,
) -> Result<f64, DatabaseError>
where
    E: Executor<'e, Database = Sqlite>,
{
    let total: f64 = sqlx::query_scalar(
        "SELECT COALESCE(SUM(PRICE * QUANTITY - ?3), 0.0) FROM TRANSACTIONS WHERE SYMBOL = ?1 AND TYPE = ?2",
    )
    .bind(symbol)
    .bind(kind.as_str())
    .bind(fee)
    .fetch_one(executor)
    .await
    .map_err(|e| {
        error!("Failed to total {} value for {}: {}", kind, symbol, e);
        DatabaseError::QueryError(format!("Failed to total transaction value: {}", e))
    })?;

    Ok(total)
}

/// Transaction ledger repository
#[derive(Clone)]
pub struct TransactionRepository {
    pool: DbPool,
}

impl TransactionRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Open a store transaction. Dropping it without `commit()` rolls back.
    pub async fn begin(&self) -> Result<StoreTransaction, DatabaseError> {
        self.pool.begin().await.map_err(|e| {
            error!("Failed to begin store transaction: {}", e);
            DatabaseError::QueryError(format!("Failed to begin transaction: {}", e))
        })
    }

    /// Insert one immutable ledger row. Duplicates are allowed.
    pub async fn record(&self, transaction: &CreateTransaction) -> Result<Transaction, DatabaseError> {
        insert_transaction(&self.pool, transaction).await?.try_into()
    }

    pub async fn shares_bought(&self, symbol: &str) -> Result<i64, DatabaseError> {
        total_quantity(&self.pool, symbol, TransactionType::Buy).await
    }

    pub async fn shares_sold(&self, symbol: &str) -> Result<i64, DatabaseError> {
        total_quantity(&self.pool, symbol, TransactionType::Sell).await
    }

    /// Net BUY cost or net SELL proceeds of a symbol, each row reduced by `fee`
    pub async fn cost_or_proceeds(
        &self,
        symbol: &str,
        kind: TransactionType,
        fee: f64,
    ) -> Result<f64, DatabaseError> {
        fee_adjusted_total(&self.pool, symbol, kind, fee).await
    }

    /// All transactions of a symbol in insertion order
    pub async fn history(&self, symbol: &str) -> Result<Vec<Transaction>, DatabaseError> {
        let sql = format!(
            "SELECT {} FROM TRANSACTIONS WHERE SYMBOL = ?1 ORDER BY TRANSACTION_ID ASC",
            TRANSACTION_COLUMNS
        );
        let records = sqlx::query_as::<_, TransactionRecord>(&sql)
            .bind(symbol)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to get transactions for {}: {}", symbol, e);
                DatabaseError::QueryError(format!("Failed to get transactions: {}", e))
            })?;

        records.into_iter().map(Transaction::try_from).collect()
    }
}

/// User and wallet repository
#[derive(Clone)]
pub struct AccountRepository {
    pool: DbPool,
}

impl AccountRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look a user up by unique username
    pub async fn find_user(&self, username: &str) -> Result<Option<User>, DatabaseError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            SELECT USER_ID AS user_id, USER_NAME AS username, FIRST_NAME AS first_name,
                   LAST_NAME AS last_name, CREATION_TMSP AS creation_tmsp
            FROM USER_INFO
            WHERE USER_NAME = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get user {}: {}", username, e);
            DatabaseError::QueryError(format!("Failed to get user: {}", e))
        })?;

        Ok(record.map(User::from))
    }

    pub async fn create_user(&self, user: &CreateUser) -> Result<User, DatabaseError> {
        let record = sqlx::query_as::<_, UserRecord>(
            r#"
            INSERT INTO USER_INFO (USER_NAME, FIRST_NAME, LAST_NAME)
            VALUES (?1, ?2, ?3)
            RETURNING USER_ID AS user_id, USER_NAME AS username, FIRST_NAME AS first_name,
                      LAST_NAME AS last_name, CREATION_TMSP AS creation_tmsp
            "#,
        )
        .bind(&user.username)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to create user {}: {}", user.username, e);
            DatabaseError::QueryError(format!("Failed to create user: {}", e))
        })?;

        debug!("Created user: {} ({})", record.username, record.user_id);
        Ok(record.into())
    }

    /// Deposits minus withdrawals, 0 when the user has no cash movement
    pub async fn wallet(&self, user_id: i64) -> Result<Wallet, DatabaseError> {
        let balance: f64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(DEPOSIT), 0.0) - COALESCE(SUM(WITHDRAWAL), 0.0)
            FROM USER_DEPOSITS
            WHERE USER_ID = ?1
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to compute wallet for user {}: {}", user_id, e);
            DatabaseError::QueryError(format!("Failed to compute wallet: {}", e))
        })?;

        Ok(Wallet { user_id, balance })
    }

    pub async fn deposit(&self, user_id: i64, amount: f64) -> Result<(), DatabaseError> {
        self.record_movement(user_id, amount, 0.0).await
    }

    pub async fn withdraw(&self, user_id: i64, amount: f64) -> Result<(), DatabaseError> {
        self.record_movement(user_id, 0.0, amount).await
    }

    async fn record_movement(
        &self,
        user_id: i64,
        deposit: f64,
        withdrawal: f64,
    ) -> Result<(), DatabaseError> {
        sqlx::query("INSERT INTO USER_DEPOSITS (USER_ID, DEPOSIT, WITHDRAWAL) VALUES (?1, ?2, ?3)")
            .bind(user_id)
            .bind(deposit)
            .bind(withdrawal)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                error!("Failed to record cash movement for user {}: {}", user_id, e);
                DatabaseError::QueryError(format!("Failed to record cash movement: {}", e))
            })?;

        debug!(
            "Recorded cash movement for user {}: +{} -{}",
            user_id, deposit, withdrawal
        );
        Ok(())
    }
}

/// Exchange rate repository
#[derive(Clone)]
pub struct ExchangeRateRepository {
    pool: DbPool,
}

impl ExchangeRateRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Store a rate and return its row id
    pub async fn record(&self, rate: &CreateExchangeRate) -> Result<i64, DatabaseError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO EXCHANGE_RATES (
                FROM_CURRENCY_CODE, FROM_CURRENCY_NAME, TO_CURRENCY_CODE, TO_CURRENCY_NAME,
                EXCHANGE_RATE, LAST_REFRESHED, TIME_ZONE, BID_PRICE, ASK_PRICE
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            RETURNING RATE_ID
            "#,
        )
        .bind(&rate.from_currency_code)
        .bind(&rate.from_currency_name)
        .bind(&rate.to_currency_code)
        .bind(&rate.to_currency_name)
        .bind(rate.exchange_rate)
        .bind(&rate.last_refreshed)
        .bind(&rate.time_zone)
        .bind(rate.bid_price)
        .bind(rate.ask_price)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            error!(
                "Failed to record rate {}/{}: {}",
                rate.from_currency_code, rate.to_currency_code, e
            );
            DatabaseError::QueryError(format!("Failed to record exchange rate: {}", e))
        })?;

        debug!(
            "Recorded rate {}: {}/{} = {}",
            id, rate.from_currency_code, rate.to_currency_code, rate.exchange_rate
        );
        Ok(id)
    }

    /// Most recently recorded rate for a currency pair
    pub async fn latest(&self, from_currency: &str, to_currency: &str) -> Result<Option<f64>, DatabaseError> {
        let rate: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT EXCHANGE_RATE FROM EXCHANGE_RATES
            WHERE FROM_CURRENCY_CODE = ?1 AND TO_CURRENCY_CODE = ?2
            ORDER BY RATE_ID DESC
            LIMIT 1
            "#,
        )
        .bind(from_currency)
        .bind(to_currency)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to get rate {}/{}: {}", from_currency, to_currency, e);
            DatabaseError::QueryError(format!("Failed to get exchange rate: {}", e))
        })?;

        Ok(rate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::{price::Price, quantity::Quantity};
    use crate::persistence::init_database;

    fn create(symbol: &str, kind: TransactionType, price: f64, quantity: i64) -> CreateTransaction {
        CreateTransaction {
            symbol: symbol.to_string(),
            kind,
            price: Price::new(price).unwrap(),
            quantity: Quantity::new(quantity).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_aggregates_are_zero_without_rows() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = TransactionRepository::new(pool);

        assert_eq!(repo.shares_bought("NFLX").await.unwrap(), 0);
        assert_eq!(repo.shares_sold("NFLX").await.unwrap(), 0);
        assert_eq!(
            repo.cost_or_proceeds("NFLX", TransactionType::Buy, 1.0)
                .await
                .unwrap(),
            0.0
        );
        assert!(repo.history("NFLX").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_record_and_aggregate() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = TransactionRepository::new(pool);

        let first = repo
            .record(&create("NFLX", TransactionType::Buy, 100.0, 10))
            .await
            .unwrap();
        assert_eq!(first.symbol, "NFLX");
        assert_eq!(first.kind, TransactionType::Buy);
        assert_eq!(first.quantity.value(), 10);

        repo.record(&create("NFLX", TransactionType::Buy, 110.0, 2))
            .await
            .unwrap();
        repo.record(&create("NFLX", TransactionType::Sell, 120.0, 5))
            .await
            .unwrap();
        repo.record(&create("AAPL", TransactionType::Buy, 50.0, 3))
            .await
            .unwrap();

        assert_eq!(repo.shares_bought("NFLX").await.unwrap(), 12);
        assert_eq!(repo.shares_sold("NFLX").await.unwrap(), 5);
        assert_eq!(repo.shares_bought("AAPL").await.unwrap(), 3);

        // 10*100 - 1 + 2*110 - 1
        let cost = repo
            .cost_or_proceeds("NFLX", TransactionType::Buy, 1.0)
            .await
            .unwrap();
        assert_eq!(cost, 1218.0);

        let proceeds = repo
            .cost_or_proceeds("NFLX", TransactionType::Sell, 1.0)
            .await
            .unwrap();
        assert_eq!(proceeds, 599.0);
    }

    #[tokio::test]
    async fn test_duplicate_rows_are_kept() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = TransactionRepository::new(pool);
        let buy = create("NFLX", TransactionType::Buy, 100.0, 1);

        repo.record(&buy).await.unwrap();
        repo.record(&buy).await.unwrap();

        assert_eq!(repo.shares_bought("NFLX").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_history_in_insertion_order() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = TransactionRepository::new(pool);

        repo.record(&create("NFLX", TransactionType::Buy, 100.0, 10))
            .await
            .unwrap();
        repo.record(&create("NFLX", TransactionType::Sell, 120.0, 4))
            .await
            .unwrap();
        repo.record(&create("NFLX", TransactionType::Buy, 90.0, 1))
            .await
            .unwrap();

        let history = repo.history("NFLX").await.unwrap();
        let kinds: Vec<_> = history.iter().map(|t| (t.kind, t.quantity.value())).collect();
        assert_eq!(
            kinds,
            vec![
                (TransactionType::Buy, 10),
                (TransactionType::Sell, 4),
                (TransactionType::Buy, 1)
            ]
        );
        assert!(history[0].id < history[1].id);
    }

    #[tokio::test]
    async fn test_rolled_back_insert_leaves_no_row() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = TransactionRepository::new(pool);

        {
            let mut tx = repo.begin().await.unwrap();
            insert_transaction(&mut *tx, &create("NFLX", TransactionType::Buy, 100.0, 10))
                .await
                .unwrap();
            assert_eq!(
                total_quantity(&mut *tx, "NFLX", TransactionType::Buy)
                    .await
                    .unwrap(),
                10
            );
            tx.rollback().await.unwrap();
        }

        assert_eq!(repo.shares_bought("NFLX").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_query_failure_is_an_error_not_zero() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        sqlx::query("DROP TABLE TRANSACTIONS")
            .execute(&pool)
            .await
            .unwrap();
        let repo = TransactionRepository::new(pool);

        assert!(matches!(
            repo.shares_bought("NFLX").await,
            Err(DatabaseError::QueryError(_))
        ));
    }

    #[tokio::test]
    async fn test_find_user() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = AccountRepository::new(pool);

        let seeded = repo.find_user("trader").await.unwrap().unwrap();
        assert_eq!(seeded.first_name, "Alpha");

        let created = repo
            .create_user(&CreateUser {
                username: "jdoe".to_string(),
                first_name: "Jane".to_string(),
                last_name: "Doe".to_string(),
            })
            .await
            .unwrap();
        let fetched = repo.find_user("jdoe").await.unwrap().unwrap();
        assert_eq!(fetched, created);

        assert!(repo.find_user("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_wallet_is_zero_without_movements() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = AccountRepository::new(pool);
        let user = repo.find_user("trader").await.unwrap().unwrap();

        let wallet = repo.wallet(user.user_id).await.unwrap();
        assert_eq!(wallet.balance, 0.0);
        assert_eq!(wallet.user_id, user.user_id);
    }

    #[tokio::test]
    async fn test_wallet_deposits_minus_withdrawals() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = AccountRepository::new(pool);
        let user = repo.find_user("trader").await.unwrap().unwrap();

        repo.deposit(user.user_id, 1000.0).await.unwrap();
        repo.deposit(user.user_id, 250.5).await.unwrap();
        repo.withdraw(user.user_id, 200.0).await.unwrap();

        let wallet = repo.wallet(user.user_id).await.unwrap();
        assert_eq!(wallet.balance, 1050.5);
    }

    #[tokio::test]
    async fn test_exchange_rate_record_and_latest() {
        let pool = init_database("sqlite::memory:").await.unwrap();
        let repo = ExchangeRateRepository::new(pool);
        let mut rate = CreateExchangeRate {
            from_currency_code: "USD".to_string(),
            from_currency_name: None,
            to_currency_code: "JPY".to_string(),
            to_currency_name: None,
            exchange_rate: 107.414,
            last_refreshed: None,
            time_zone: Some("UTC".to_string()),
            bid_price: None,
            ask_price: None,
        };

        assert!(repo.latest("USD", "JPY").await.unwrap().is_none());

        repo.record(&rate).await.unwrap();
        rate.exchange_rate = 108.0;
        let second = repo.record(&rate).await.unwrap();
        assert!(second > 0);

        assert_eq!(repo.latest("USD", "JPY").await.unwrap(), Some(108.0));
    }
}
