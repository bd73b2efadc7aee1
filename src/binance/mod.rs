//! Binance spot REST API client
//!
//! Public market data needs no credentials. Account and order endpoints are
//! SIGNED: they carry the API key header and an HMAC-SHA256 signature of the
//! query string (see [`crate::auth`]).

mod client;
mod error;
mod types;

pub use client::{BinanceClient, KlineQuery, MAX_KLINES_PER_REQUEST};
pub use error::BinanceError;
pub use types::*;
