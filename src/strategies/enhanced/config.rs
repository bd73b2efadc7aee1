//! Enhanced strategy configuration

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancedConfig {
    // MACD
    pub fast_ema: usize,
    pub slow_ema: usize,
    pub signal_ema: usize,

    // RSI
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,

    // Long exits, in ATR multiples from the entry price
    pub atr_period: usize,
    pub stop_atr_multiple: f64,
    pub take_profit_atr_multiple: f64,

    // Short exits, as fractions of the entry price
    pub short_profit_target: f64,
    pub short_stop_loss: f64,

    /// Bars kept in memory
    pub max_history: usize,
}

impl Default for EnhancedConfig {
    fn default() -> Self {
        Self {
            fast_ema: 12,
            slow_ema: 26,
            signal_ema: 9,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            atr_period: 14,
            stop_atr_multiple: 2.0,
            take_profit_atr_multiple: 3.0,
            short_profit_target: 0.03,
            short_stop_loss: 0.01,
            max_history: 500,
        }
    }
}

impl EnhancedConfig {
    /// Bars needed before long signals: the slow EMA plus 20, and the 50-bar EMA
    pub fn long_warmup(&self) -> usize {
        (self.slow_ema + 20).max(50)
    }

    /// Bars needed before short signals
    pub fn short_warmup(&self) -> usize {
        self.slow_ema + 10
    }
}
