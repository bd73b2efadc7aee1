//! Utilities shared by the exchange client and the downloader

pub mod retry;

pub use retry::RetryPolicy;
