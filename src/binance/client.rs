//! Binance REST client
//!
//! # Example
//! ```no_run
//! use testnet_trader::binance::{BinanceClient, KlineQuery};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = BinanceClient::new("https://api.binance.us")?;
//!     let klines = client
//!         .get_klines(&KlineQuery::new("BTCUSDT", "1h").with_limit(100))
//!         .await?;
//!     println!("Fetched {} klines", klines.len());
//!     Ok(())
//! }
//! ```

use chrono::Utc;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::error::BinanceError;
use super::types::{AccountInfo, ApiErrorBody, Kline, OrderResponse, ServerTime, TickerPrice};
use crate::auth::{signed_query, Credentials, QueryString};
use crate::common::RetryPolicy;
use crate::config::Config;
use crate::orders::OrderRequest;

/// Header carrying the API key on SIGNED requests
pub const API_KEY_HEADER: &str = "X-MBX-APIKEY";

/// Maximum klines per request (Binance limit)
pub const MAX_KLINES_PER_REQUEST: u32 = 1000;

/// Pause between pages when paginating klines (ms)
const PAGE_DELAY_MS: u64 = 100;

/// Parameters for `GET /api/v3/klines`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineQuery {
    pub symbol: String,
    pub interval: String,
    /// Start time in milliseconds
    pub start_time: Option<i64>,
    /// End time in milliseconds
    pub end_time: Option<i64>,
    /// Number of klines, capped at [`MAX_KLINES_PER_REQUEST`]
    pub limit: Option<u32>,
}

impl KlineQuery {
    pub fn new(symbol: impl Into<String>, interval: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            interval: interval.into(),
            start_time: None,
            end_time: None,
            limit: None,
        }
    }

    pub fn with_start(mut self, start_ms: i64) -> Self {
        self.start_time = Some(start_ms);
        self
    }

    pub fn with_end(mut self, end_ms: i64) -> Self {
        self.end_time = Some(end_ms);
        self
    }

    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn to_query(&self) -> QueryString {
        let limit = self
            .limit
            .unwrap_or(MAX_KLINES_PER_REQUEST)
            .min(MAX_KLINES_PER_REQUEST);

        let mut query = QueryString::new();
        query
            .push("symbol", &self.symbol)
            .push("interval", &self.interval)
            .push("limit", limit)
            .push_opt("startTime", self.start_time)
            .push_opt("endTime", self.end_time);
        query
    }
}

/// Binance API client
#[derive(Debug, Clone)]
pub struct BinanceClient {
    http: Client,
    base_url: String,
    credentials: Option<Credentials>,
    retry: RetryPolicy,
}

impl BinanceClient {
    /// Create a public-data client with a 30 second timeout
    pub fn new(base_url: impl Into<String>) -> Result<Self, BinanceError> {
        Self::with_timeout(base_url, Duration::from_secs(30))
    }

    pub fn with_timeout(
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, BinanceError> {
        let http = Client::builder().timeout(timeout).build()?;

        Ok(BinanceClient {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            credentials: None,
            retry: RetryPolicy::default(),
        })
    }

    /// Client for the configured endpoint, with credentials when present
    pub fn from_config(config: &Config) -> Result<Self, BinanceError> {
        let settings = &config.settings;
        let mut client = Self::with_timeout(&settings.base_url, settings.timeout())?
            .with_retry_policy(RetryPolicy::from_settings(settings));

        if let Ok(credentials) = config.credentials() {
            client.credentials = Some(credentials);
        }

        Ok(client)
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn url(&self, endpoint: &str, query: &str) -> String {
        if query.is_empty() {
            format!("{}{}", self.base_url, endpoint)
        } else {
            format!("{}{}?{}", self.base_url, endpoint, query)
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BinanceError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(match serde_json::from_str::<ApiErrorBody>(&body) {
                Ok(err) => BinanceError::Api {
                    status: status.as_u16(),
                    code: err.code,
                    msg: err.msg,
                },
                Err(_) => BinanceError::Http {
                    status: status.as_u16(),
                    body,
                },
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    /// Unauthenticated GET, retried per the client's policy
    pub async fn send_public_request<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &QueryString,
    ) -> Result<T, BinanceError> {
        let url = self.url(endpoint, &params.encode());
        let http = &self.http;

        self.retry
            .run(|attempt| {
                let url = url.clone();
                async move {
                    debug!("GET {} (attempt {})", url, attempt);
                    let response = http.get(&url).send().await?;
                    Self::decode(response).await
                }
            })
            .await
    }

    /// SIGNED request
    ///
    /// Each attempt is signed with a fresh timestamp. GETs are retried;
    /// anything else is sent once since it may not be safe to repeat.
    pub async fn send_signed_request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        params: &QueryString,
    ) -> Result<T, BinanceError> {
        let credentials = self
            .credentials
            .as_ref()
            .ok_or_else(|| BinanceError::MissingCredentials(endpoint.to_string()))?;

        let send = |attempt: u32| {
            let query = signed_query(
                params,
                credentials.api_secret(),
                Utc::now().timestamp_millis(),
            );
            let request = self
                .http
                .request(method.clone(), self.url(endpoint, &query))
                .header(API_KEY_HEADER, credentials.api_key());
            let method = method.clone();

            async move {
                debug!("{} {} signed (attempt {})", method, endpoint, attempt);
                let response = request.send().await?;
                Self::decode(response).await
            }
        };

        if method == Method::GET {
            self.retry.run(send).await
        } else {
            send(1).await
        }
    }

    /// Check server connectivity
    pub async fn ping(&self) -> Result<(), BinanceError> {
        self.send_public_request::<serde_json::Value>("/api/v3/ping", &QueryString::new())
            .await
            .map(|_| ())
    }

    /// Server time in milliseconds
    pub async fn server_time(&self) -> Result<i64, BinanceError> {
        let time: ServerTime = self
            .send_public_request("/api/v3/time", &QueryString::new())
            .await?;
        Ok(time.server_time)
    }

    /// Latest price for a symbol
    pub async fn get_ticker_price(&self, symbol: &str) -> Result<TickerPrice, BinanceError> {
        let params = QueryString::new().with("symbol", symbol);
        self.send_public_request("/api/v3/ticker/price", &params)
            .await
    }

    /// Account snapshot (SIGNED)
    pub async fn get_account(&self) -> Result<AccountInfo, BinanceError> {
        self.send_signed_request(Method::GET, "/api/v3/account", &QueryString::new())
            .await
    }

    /// Place an order (SIGNED, not retried)
    pub async fn place_order(&self, order: &OrderRequest) -> Result<OrderResponse, BinanceError> {
        info!(
            "Placing {} {} order: {} {}",
            order.order_type, order.side, order.quantity, order.symbol
        );
        self.send_signed_request(Method::POST, "/api/v3/order", &order.to_query())
            .await
    }

    /// Fetch one page of klines
    pub async fn get_klines(&self, query: &KlineQuery) -> Result<Vec<Kline>, BinanceError> {
        debug!(
            "Fetching klines: symbol={}, interval={}, limit={:?}",
            query.symbol, query.interval, query.limit
        );

        let raw_data: Vec<Vec<serde_json::Value>> = self
            .send_public_request("/api/v3/klines", &query.to_query())
            .await?;

        let total = raw_data.len();
        let klines: Vec<Kline> = raw_data
            .iter()
            .filter_map(|row| Kline::from_raw(row))
            .collect();

        if klines.len() < total {
            warn!(
                "Skipped {} malformed kline rows out of {} for {}",
                total - klines.len(),
                total,
                query.symbol
            );
        }

        Ok(klines)
    }

    /// Fetch every kline between two timestamps by paginating on `startTime`
    ///
    /// Each request asks for `page_limit` klines (capped at
    /// [`MAX_KLINES_PER_REQUEST`]). `on_page` is told the running total after
    /// each page.
    pub async fn fetch_range(
        &self,
        symbol: &str,
        interval: &str,
        start_ms: i64,
        end_ms: i64,
        page_limit: u32,
        mut on_page: impl FnMut(usize),
    ) -> Result<Vec<Kline>, BinanceError> {
        info!(
            "Fetching {} {} klines from {} to {}",
            symbol, interval, start_ms, end_ms
        );

        let mut all_klines: Vec<Kline> = Vec::new();
        let mut current_start = start_ms;

        while current_start < end_ms {
            let query = KlineQuery::new(symbol, interval)
                .with_start(current_start)
                .with_end(end_ms)
                .with_limit(page_limit.max(1));
            let klines = self.get_klines(&query).await?;

            let Some(last) = klines.last() else {
                break;
            };
            let next_start = last.open_time + 1;
            if next_start <= current_start {
                break;
            }
            current_start = next_start;

            all_klines.extend(klines);
            on_page(all_klines.len());

            tokio::time::sleep(Duration::from_millis(PAGE_DELAY_MS)).await;
        }

        all_klines.sort_by_key(|k| k.open_time);
        all_klines.dedup_by_key(|k| k.open_time);

        info!(
            "Fetched {} candles for {} {}",
            all_klines.len(),
            symbol,
            interval
        );

        Ok(all_klines)
    }
}
