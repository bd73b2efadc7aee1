//! Errors returned by the Binance client

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BinanceError {
    /// Connection, timeout or other transport failure
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Binance rejected the request with its `{"code", "msg"}` error body
    #[error("Binance API error {status} (code {code}): {msg}")]
    Api { status: u16, code: i64, msg: String },

    /// Non-success status without a recognisable error body
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("endpoint {0} requires API credentials")]
    MissingCredentials(String),
}

impl BinanceError {
    /// HTTP status of the failed response, if one was received
    pub fn status(&self) -> Option<u16> {
        match self {
            BinanceError::Api { status, .. } | BinanceError::Http { status, .. } => Some(*status),
            BinanceError::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
