//! Database Models
//!
//! Row shapes for the ledger, the session user and recorded exchange rates, plus
//! their conversions into domain entities.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

use super::DatabaseError;
use crate::domain::entities::transaction::{Transaction, TransactionType};
use crate::domain::entities::user::User;
use crate::domain::errors::ValidationError;
use crate::domain::repositories::quote_source::{QuoteError, QuoteRecord};
use crate::domain::value_objects::{price::Price, quantity::Quantity};

/// Transaction record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TransactionRecord {
    pub id: i64,
    pub symbol: String,
    pub kind: String, // "BUY" or "SELL"
    pub price: f64,
    pub quantity: i64,
    pub executed_at: NaiveDateTime,
}

impl TryFrom<TransactionRecord> for Transaction {
    type Error = DatabaseError;

    fn try_from(record: TransactionRecord) -> Result<Self, Self::Error> {
        let id = record.id;
        let invalid = move |e: ValidationError| {
            DatabaseError::QueryError(format!("Corrupt transaction row {}: {}", id, e))
        };
        Ok(Transaction {
            id: record.id,
            kind: record.kind.parse::<TransactionType>().map_err(invalid)?,
            price: Price::new(record.price).map_err(invalid)?,
            quantity: Quantity::new(record.quantity).map_err(invalid)?,
            executed_at: record.executed_at,
            symbol: record.symbol,
        })
    }
}

/// Create transaction input
#[derive(Debug, Clone)]
pub struct CreateTransaction {
    pub symbol: String,
    pub kind: TransactionType,
    pub price: Price,
    pub quantity: Quantity,
}

/// User record in database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserRecord {
    pub user_id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub creation_tmsp: NaiveDateTime,
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        User {
            user_id: record.user_id,
            username: record.username,
            first_name: record.first_name,
            last_name: record.last_name,
            creation_tmsp: record.creation_tmsp,
        }
    }
}

/// Create user input
#[derive(Debug, Clone)]
pub struct CreateUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

/// Exchange rate input, built from a normalized `CURRENCY_EXCHANGE_RATE` record
#[derive(Debug, Clone, PartialEq)]
pub struct CreateExchangeRate {
    pub from_currency_code: String,
    pub from_currency_name: Option<String>,
    pub to_currency_code: String,
    pub to_currency_name: Option<String>,
    pub exchange_rate: f64,
    pub last_refreshed: Option<String>,
    pub time_zone: Option<String>,
    pub bid_price: Option<f64>,
    pub ask_price: Option<f64>,
}

impl TryFrom<&QuoteRecord> for CreateExchangeRate {
    type Error = QuoteError;

    fn try_from(record: &QuoteRecord) -> Result<Self, Self::Error> {
        let number = |key: &str, raw: &str| -> Result<f64, QuoteError> {
            raw.trim()
                .parse::<f64>()
                .map_err(|e| QuoteError::ParseError(format!("{} '{}': {}", key, raw, e)))
        };
        let optional_number = |key: &str| -> Result<Option<f64>, QuoteError> {
            record.get(key).map(|raw| number(key, raw)).transpose()
        };
        let text = |key: &str| record.get(key).map(str::to_string);

        Ok(CreateExchangeRate {
            from_currency_code: record.require("from_currency_code")?.to_string(),
            from_currency_name: text("from_currency_name"),
            to_currency_code: record.require("to_currency_code")?.to_string(),
            to_currency_name: text("to_currency_name"),
            exchange_rate: number("exchange_rate", record.require("exchange_rate")?)?,
            last_refreshed: text("last_refreshed"),
            time_zone: text("time_zone"),
            bid_price: optional_number("bid_price")?,
            ask_price: optional_number("ask_price")?,
        })
    }
}
