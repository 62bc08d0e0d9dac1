use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Map, Value};
use tracing::{debug, warn};
use zeroize::Zeroizing;

use crate::domain::repositories::quote_source::{QuoteError, QuoteRecord, QuoteResult, QuoteSource};

/// Alpha Vantage query endpoint
pub const ALPHA_VANTAGE_API_BASE: &str = "https://www.alphavantage.co/query";

/// Applied to every request so a stalled upstream cannot block the session
pub const DEFAULT_TIMEOUT_SECONDS: u64 = 10;

pub const GLOBAL_QUOTE: &str = "GLOBAL_QUOTE";
pub const CURRENCY_EXCHANGE_RATE: &str = "CURRENCY_EXCHANGE_RATE";

const GLOBAL_QUOTE_KEY: &str = "Global Quote";
const EXCHANGE_RATE_KEY: &str = "Realtime Currency Exchange Rate";

/// Body keys Alpha Vantage uses to report errors with an HTTP 200
const UPSTREAM_MESSAGE_KEYS: [&str; 3] = ["Error Message", "Note", "Information"];

/// Alpha Vantage connection settings
#[derive(Clone)]
pub struct AlphaVantageConfig {
    pub api_base: String,
    pub api_key: Zeroizing<String>,
    pub timeout: Duration,
}

impl AlphaVantageConfig {
    pub fn new(api_base: &str, api_key: &str) -> Self {
        Self {
            api_base: api_base.to_string(),
            api_key: Zeroizing::new(api_key.to_string()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECONDS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for AlphaVantageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageConfig")
            .field("api_base", &self.api_base)
            .field("api_key", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Alpha Vantage client for quote and exchange-rate lookups
pub struct AlphaVantageClient {
    client: Client,
    config: AlphaVantageConfig,
}

impl AlphaVantageClient {
    pub fn new(config: AlphaVantageConfig) -> QuoteResult<Self> {
        let client = Client::builder()
            .user_agent("alpha-trading/0.1.0")
            .timeout(config.timeout)
            .build()
            .map_err(|e| QuoteError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    /// Run one API function and return the normalized object found under `payload_key`.
    async fn query(
        &self,
        function: &str,
        params: &[(&str, &str)],
        payload_key: &str,
    ) -> QuoteResult<QuoteRecord> {
        debug!("GET {} function={} {:?}", self.config.api_base, function, params);

        let response = self
            .client
            .get(&self.config.api_base)
            .query(&[("function", function)])
            .query(params)
            .query(&[("apikey", self.config.api_key.as_str())])
            .send()
            .await
            .map_err(|e| QuoteError::NetworkError(format!("{} request failed: {}", function, e)))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            warn!("{} returned HTTP {}", function, status);
            return Err(QuoteError::HttpStatus { status, body });
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| QuoteError::ParseError(format!("{} response: {}", function, e)))?;

        parse_payload(function, &body, payload_key)
    }
}

/// Extract and normalize the payload object of an Alpha Vantage response body.
pub fn parse_payload(function: &str, body: &Value, payload_key: &str) -> QuoteResult<QuoteRecord> {
    if let Some(message) = UPSTREAM_MESSAGE_KEYS
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
    {
        warn!("{} rejected by upstream: {}", function, message);
        return Err(QuoteError::Upstream(message.to_string()));
    }

    let payload: &Map<String, Value> = body
        .get(payload_key)
        .and_then(Value::as_object)
        .ok_or_else(|| QuoteError::MissingField {
            function: function.to_string(),
            field: payload_key.to_string(),
        })?;

    let fields = payload.iter().map(|(key, value)| {
        let value = match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        };
        (key, value)
    });

    Ok(QuoteRecord::from_raw(function, fields))
}

#[async_trait]
impl QuoteSource for AlphaVantageClient {
    fn name(&self) -> &str {
        "Alpha Vantage"
    }

    async fn get_quote(&self, symbol: &str) -> QuoteResult<QuoteRecord> {
        self.query(GLOBAL_QUOTE, &[("symbol", symbol)], GLOBAL_QUOTE_KEY)
            .await
    }

    async fn get_rate(&self, from_currency: &str, to_currency: &str) -> QuoteResult<QuoteRecord> {
        self.query(
            CURRENCY_EXCHANGE_RATE,
            &[("from_currency", from_currency), ("to_currency", to_currency)],
            EXCHANGE_RATE_KEY,
        )
        .await
    }
}
