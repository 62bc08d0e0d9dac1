//! AccountLedger service - share ownership, buy/sell execution and profit
//!
//! The ledger is an append-only log of BUY and SELL rows. Ownership and profit are
//! always derived from aggregates over that log, never stored.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::domain::entities::transaction::{normalize_symbol, Transaction, TransactionType};
use crate::domain::errors::LedgerError;
use crate::domain::repositories::quote_source::QuoteSource;
use crate::domain::value_objects::{profit::Profit, quantity::Quantity};
use crate::persistence::models::CreateTransaction;
use crate::persistence::repository::{insert_transaction, total_quantity, TransactionRepository};
use crate::persistence::DatabaseError;

/// Flat broker fee charged once per ledger row
pub const DEFAULT_FEE: f64 = 1.0;

pub struct AccountLedger {
    transactions: TransactionRepository,
    quotes: Arc<dyn QuoteSource>,
    fee: f64,
}

impl AccountLedger {
    pub fn new(transactions: TransactionRepository, quotes: Arc<dyn QuoteSource>, fee: f64) -> Self {
        Self {
            transactions,
            quotes,
            fee,
        }
    }

    pub fn fee(&self) -> f64 {
        self.fee
    }

    /// Shares bought minus shares sold
    pub async fn shares_owned(&self, symbol: &str) -> Result<i64, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let bought = self.transactions.shares_bought(&symbol).await?;
        let sold = self.transactions.shares_sold(&symbol).await?;
        Ok(bought - sold)
    }

    /// Buy `quantity` shares at the current quoted price. No funds check is made.
    pub async fn buy(&self, symbol: &str, quantity: i64) -> Result<Transaction, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let quantity = Quantity::new(quantity)?;

        let price = self.quotes.get_price(&symbol).await?;
        let transaction = self
            .transactions
            .record(&CreateTransaction {
                symbol,
                kind: TransactionType::Buy,
                price,
                quantity,
            })
            .await?;

        info!(
            "Bought {} {} @ {} (gross {:.2})",
            transaction.quantity,
            transaction.symbol,
            transaction.price,
            transaction.gross_value()
        );
        Ok(transaction)
    }

    /// Sell `quantity` shares at the current quoted price.
    ///
    /// Ownership is checked before the quote lookup, so a rejected sell never calls
    /// the API. The price is fetched outside any store transaction; ownership is then
    /// checked again and the row inserted inside one transaction, so a concurrent
    /// sell cannot oversell and no lock is held during the HTTP call. On any error
    /// nothing is written.
    pub async fn sell(&self, symbol: &str, quantity: i64) -> Result<Transaction, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let quantity = Quantity::new(quantity)?;

        let owned = self.shares_owned(&symbol).await?;
        ensure_owned(&symbol, owned, quantity)?;

        let price = self.quotes.get_price(&symbol).await?;

        let mut tx = self.transactions.begin().await?;
        let bought = total_quantity(&mut *tx, &symbol, TransactionType::Buy).await?;
        let sold = total_quantity(&mut *tx, &symbol, TransactionType::Sell).await?;
        ensure_owned(&symbol, bought - sold, quantity)?;

        let record = insert_transaction(
            &mut *tx,
            &CreateTransaction {
                symbol,
                kind: TransactionType::Sell,
                price,
                quantity,
            },
        )
        .await?;
        tx.commit().await.map_err(DatabaseError::from)?;

        let transaction = Transaction::try_from(record)?;
        info!(
            "Sold {} {} @ {} (gross {:.2})",
            transaction.quantity,
            transaction.symbol,
            transaction.price,
            transaction.gross_value()
        );
        Ok(transaction)
    }

    /// Net BUY cost minus net SELL proceeds, fee applied per row.
    ///
    /// A positive value is a net spend on the symbol, a negative value a net gain.
    pub async fn profit(&self, symbol: &str) -> Result<Profit, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        let cost = self
            .transactions
            .cost_or_proceeds(&symbol, TransactionType::Buy, self.fee)
            .await?;
        let proceeds = self
            .transactions
            .cost_or_proceeds(&symbol, TransactionType::Sell, self.fee)
            .await?;

        debug!("{} cost {} proceeds {}", symbol, cost, proceeds);
        Ok(Profit::from_aggregates(cost, proceeds)?)
    }

    /// Transactions of a symbol in insertion order
    pub async fn history(&self, symbol: &str) -> Result<Vec<Transaction>, LedgerError> {
        let symbol = normalize_symbol(symbol)?;
        Ok(self.transactions.history(&symbol).await?)
    }
}

fn ensure_owned(symbol: &str, owned: i64, quantity: Quantity) -> Result<(), LedgerError> {
    if owned < quantity.value() {
        warn!("Rejected sell of {} {}: only {} owned", quantity, symbol, owned);
        return Err(LedgerError::InsufficientShares {
            symbol: symbol.to_string(),
            owned,
            requested: quantity.value(),
        });
    }
    Ok(())
}
