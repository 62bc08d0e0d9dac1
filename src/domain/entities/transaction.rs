use chrono::NaiveDateTime;

use crate::domain::errors::ValidationError;
use crate::domain::value_objects::{price::Price, quantity::Quantity};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransactionType {
    Buy,
    Sell,
}

impl TransactionType {
    /// Value stored in the `TYPE` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Buy => "BUY",
            TransactionType::Sell => "SELL",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TransactionType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(TransactionType::Buy),
            "SELL" => Ok(TransactionType::Sell),
            other => Err(ValidationError::InvalidTransactionType(other.to_string())),
        }
    }
}

/// A ledger row. Created once by a buy or a sell and never modified afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Transaction {
    pub id: i64,
    pub symbol: String,
    pub kind: TransactionType,
    pub price: Price,
    pub quantity: Quantity,
    pub executed_at: NaiveDateTime,
}

impl Transaction {
    /// Gross amount exchanged, before the per-row fee.
    pub fn gross_value(&self) -> f64 {
        self.price.value() * self.quantity.value() as f64
    }
}

/// Validate and canonicalize a ticker symbol ("nflx " becomes "NFLX").
pub fn normalize_symbol(symbol: &str) -> Result<String, ValidationError> {
    let symbol = symbol.trim();
    if symbol.is_empty() {
        return Err(ValidationError::InvalidSymbol(
            "symbol must not be empty".to_string(),
        ));
    }
    if !symbol
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | ':'))
    {
        return Err(ValidationError::InvalidSymbol(symbol.to_string()));
    }
    Ok(symbol.to_ascii_uppercase())
}
