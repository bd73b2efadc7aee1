//! Binance Spot Testnet Toolkit
//!
//! Request signing, order placement, historical kline download and
//! single-symbol backtesting against the Binance REST API.

pub mod auth;
pub mod backtest;
pub mod binance;
pub mod common;
pub mod config;
pub mod data;
pub mod indicators;
pub mod orders;
pub mod strategies;
pub mod types;

pub use auth::{sign_request, Credentials, QueryString};
pub use binance::{BinanceClient, BinanceError};
pub use common::RetryPolicy;
pub use config::Config;
pub use orders::{OrderError, OrderManager, OrderRequest};
pub use strategies::Strategy;
pub use types::*;
