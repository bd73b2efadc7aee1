//! Enhanced multi-indicator strategy
//!
//! Long entries need three of five confirmations (EMA stack, RSI band,
//! MACD, volume, higher lows). Exits use ATR stops and targets around the
//! entry price plus trend-reversal checks. The short side trades MACD
//! crossovers filtered by trend, volume and volatility.

mod config;
mod strategy;

pub use config::EnhancedConfig;
pub use strategy::{EnhancedStrategy, Trend};

use super::{parse_params, Strategy, StrategyParams};
use anyhow::Result;

/// Create strategy from params (called by registry)
pub fn create(params: &StrategyParams) -> Result<Box<dyn Strategy>> {
    let config: EnhancedConfig = parse_params("enhanced", params)?;
    if config.fast_ema == 0 || config.fast_ema >= config.slow_ema {
        anyhow::bail!(
            "enhanced needs 0 < fast_ema < slow_ema, got {} and {}",
            config.fast_ema,
            config.slow_ema
        );
    }
    if config.max_history < config.long_warmup() {
        anyhow::bail!(
            "max_history ({}) must cover the warm-up of {} bars",
            config.max_history,
            config.long_warmup()
        );
    }
    Ok(Box::new(EnhancedStrategy::new(config)))
}
