use async_trait::async_trait;
use oddsline_core::{BookTop, MarketId};
use oddsline_ports::{QuoteError, QuoteResult, QuoteSource};
use reqwest::{Client, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

use crate::messages::book_top_from_value;

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(StatusCode),
    #[error("Parse error: {0}")]
    Parse(String),
}

impl From<RestError> for QuoteError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http(e) => QuoteError::Network(e.to_string()),
            RestError::Api(status) => QuoteError::Status(status.as_u16()),
            RestError::Parse(msg) => QuoteError::Parse(msg),
        }
    }
}

/// Order-book REST client for the exchange CLOB
#[derive(Clone)]
pub struct ClobRestClient {
    client: Client,
    base_url: String,
}

impl ClobRestClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        ClobRestClient {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// Same as [`ClobRestClient::new`] with a per-request timeout
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, RestError> {
        Ok(ClobRestClient {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// `GET /book?token_id=...`, reduced to its best bid and ask
    pub async fn get_book_top(&self, token_id: &str) -> Result<BookTop, RestError> {
        let url = format!("{}/book", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(&[("token_id", token_id)])
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(RestError::Api(status));
        }

        let body = resp.text().await?;
        let value: Value =
            serde_json::from_str(&body).map_err(|e| RestError::Parse(e.to_string()))?;
        if !value.is_object() {
            return Err(RestError::Parse(format!("expected an object, got {value}")));
        }
        Ok(book_top_from_value(&value))
    }
}

#[async_trait]
impl QuoteSource for ClobRestClient {
    async fn fetch_top(&self, market: &MarketId) -> QuoteResult<BookTop> {
        Ok(self.get_book_top(market.as_str()).await?)
    }

    fn name(&self) -> &str {
        "ClobRestClient"
    }
}
