//! Quote Source Trait
//!
//! This module defines the `QuoteSource` trait, the single seam between the ledger
//! and the market-data provider. The ledger only ever asks for a current price; the
//! full normalized quote and exchange-rate records are available for callers that
//! want them.
//!
//! Upstream payloads use verbose numbered keys (`"05. price"`,
//! `"1. From_Currency Code"`). Every record handed out by a quote source has its keys
//! normalized by [`normalize_key`] to lower-case snake case (`price`,
//! `from_currency_code`).

use std::collections::BTreeMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::value_objects::price::Price;

/// Common result type for quote operations
pub type QuoteResult<T> = Result<T, QuoteError>;

/// Errors that can occur while fetching quotes. None of them are retried by the ledger.
#[derive(Debug, Clone, Error)]
pub enum QuoteError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Quote API returned HTTP {status}: {body}")]
    HttpStatus { status: u16, body: String },

    #[error("Failed to parse quote response: {0}")]
    ParseError(String),

    /// The provider answered with an error, throttling note or information message.
    #[error("Quote API error: {0}")]
    Upstream(String),

    #[error("Quote response for {function} is missing '{field}'")]
    MissingField { function: String, field: String },

    #[error("Invalid price in quote response: {0}")]
    InvalidPrice(String),
}

/// A quote or exchange-rate record with normalized keys.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuoteRecord {
    function: String,
    fields: BTreeMap<String, String>,
}

impl QuoteRecord {
    /// Build a record from raw upstream key/value pairs, normalizing every key.
    pub fn from_raw<I, K, V>(function: &str, raw: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let fields = raw
            .into_iter()
            .map(|(key, value)| (normalize_key(key.as_ref()), value.into()))
            .collect();
        Self {
            function: function.to_string(),
            fields,
        }
    }

    /// API function that produced this record (e.g. `GLOBAL_QUOTE`).
    pub fn function(&self) -> &str {
        &self.function
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    /// Like [`QuoteRecord::get`] but reports an absent field as `MissingField`.
    pub fn require(&self, key: &str) -> QuoteResult<&str> {
        self.get(key).ok_or_else(|| QuoteError::MissingField {
            function: self.function.clone(),
            field: key.to_string(),
        })
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// The `price` field of a `GLOBAL_QUOTE` record.
    pub fn price(&self) -> QuoteResult<Price> {
        let raw = self.require("price")?;
        Price::parse(raw).map_err(|e| QuoteError::InvalidPrice(e.to_string()))
    }
}

/// Normalize an upstream field name: drop the leading ordinal, trim dots and spaces,
/// join the remaining words with underscores and lower-case the result.
///
/// `"05. price"` becomes `price`, `"1. From_Currency Code"` becomes `from_currency_code`.
pub fn normalize_key(raw: &str) -> String {
    raw.trim_start()
        .trim_start_matches(|c: char| c.is_ascii_digit())
        .trim_matches(|c: char| c == '.' || c.is_whitespace())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase()
}

/// Market-data provider consumed by the ledger
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Get the name of this provider
    fn name(&self) -> &str;

    /// Fetch the latest quote for a ticker symbol
    async fn get_quote(&self, symbol: &str) -> QuoteResult<QuoteRecord>;

    /// Fetch the realtime exchange rate between two currencies
    async fn get_rate(&self, from_currency: &str, to_currency: &str) -> QuoteResult<QuoteRecord>;

    /// Current price of a ticker symbol
    async fn get_price(&self, symbol: &str) -> QuoteResult<Price> {
        self.get_quote(symbol).await?.price()
    }
}
