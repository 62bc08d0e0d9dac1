use thiserror::Error;

use crate::domain::repositories::quote_source::QuoteError;
use crate::persistence::DatabaseError;

/// Errors raised by the account ledger (buy, sell, ownership and profit).
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Business-rule violation: selling more shares than the ledger holds.
    /// The caller may retry with a smaller quantity.
    #[error(
        "Number of shares owned ({owned}) is lower than the quantity of shares to sell ({requested}) for {symbol}"
    )]
    InsufficientShares {
        symbol: String,
        owned: i64,
        requested: i64,
    },

    #[error("Invalid ledger input: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error("Quote lookup failed: {0}")]
    Quote(#[from] QuoteError),
}

/// Errors raised while reading the session user and wallet.
#[derive(Debug, Error)]
pub enum AccountError {
    #[error("User not found: {username}")]
    UserNotFound { username: String },

    #[error(transparent)]
    Database(#[from] DatabaseError),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    #[error("Invalid transaction type: {0}")]
    InvalidTransactionType(String),

    #[error("Value must be finite")]
    MustBeFinite,
}
