//! Moving-average crossover
//!
//! Long while the short SMA is above the long SMA. Only the last
//! `long_period` closes are kept.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::{parse_params, Strategy, StrategyParams};
use crate::indicators::sma_last;
use crate::types::Candle;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaCrossConfig {
    pub short_period: usize,
    pub long_period: usize,
}

impl Default for SmaCrossConfig {
    fn default() -> Self {
        Self {
            short_period: 10,
            long_period: 50,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SmaCrossStrategy {
    config: SmaCrossConfig,
    closes: VecDeque<f64>,
}

impl SmaCrossStrategy {
    pub fn new(config: SmaCrossConfig) -> Self {
        let capacity = config.long_period.max(1);
        Self {
            config,
            closes: VecDeque::with_capacity(capacity),
        }
    }

    pub fn config(&self) -> &SmaCrossConfig {
        &self.config
    }

    /// Number of closes currently held
    pub fn history_len(&self) -> usize {
        self.closes.len()
    }

    /// `(short, long)` SMAs once `long_period` closes exist
    pub fn averages(&self) -> Option<(f64, f64)> {
        if self.closes.len() < self.config.long_period {
            return None;
        }
        let closes = self.closes.iter().copied().collect::<Vec<_>>();
        Some((
            sma_last(&closes, self.config.short_period)?,
            sma_last(&closes, self.config.long_period)?,
        ))
    }
}

impl Strategy for SmaCrossStrategy {
    fn name(&self) -> &'static str {
        "sma-cross"
    }

    fn on_bar(&mut self, candle: &Candle) {
        self.closes.push_back(candle.close);
        while self.closes.len() > self.config.long_period.max(1) {
            self.closes.pop_front();
        }
    }

    fn should_enter_long(&self) -> bool {
        self.averages().is_some_and(|(short, long)| short > long)
    }

    fn should_exit_long(&self) -> bool {
        self.averages().is_some_and(|(short, long)| short < long)
    }
}

/// Create strategy from params (called by registry)
pub fn create(params: &StrategyParams) -> Result<Box<dyn Strategy>> {
    let config: SmaCrossConfig = parse_params("sma-cross", params)?;
    if config.short_period == 0 || config.short_period > config.long_period {
        anyhow::bail!(
            "sma-cross needs 0 < short_period <= long_period, got {} and {}",
            config.short_period,
            config.long_period
        );
    }
    Ok(Box::new(SmaCrossStrategy::new(config)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn candle(i: usize, close: f64) -> Candle {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Candle::new(
            start + Duration::minutes(i as i64),
            close,
            close,
            close,
            close,
            1.0,
        )
        .unwrap()
    }

    fn strategy(short: usize, long: usize) -> SmaCrossStrategy {
        SmaCrossStrategy::new(SmaCrossConfig {
            short_period: short,
            long_period: long,
        })
    }

    #[test]
    fn test_no_signal_before_long_period() {
        let mut s = strategy(2, 4);
        for i in 0..3 {
            s.on_bar(&candle(i, 100.0 + i as f64));
        }
        assert!(!s.should_enter_long());
        assert!(!s.should_exit_long());
    }

    #[test]
    fn test_uptrend_enters_downtrend_exits() {
        let mut s = strategy(2, 4);
        for (i, close) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            s.on_bar(&candle(i, *close));
        }
        assert!(s.should_enter_long());

        for (i, close) in [3.0, 2.0, 1.0].iter().enumerate() {
            s.on_bar(&candle(4 + i, *close));
        }
        assert!(s.should_exit_long());
        assert!(!s.should_enter_long());
    }

    #[test]
    fn test_history_bounded_to_long_period() {
        let mut s = strategy(3, 5);
        for i in 0..100 {
            s.on_bar(&candle(i, 100.0));
        }
        assert_eq!(s.history_len(), 5);
    }

    #[test]
    fn test_create_validates_periods() {
        assert!(create(&json!({"short_period": 20, "long_period": 10})).is_err());
        assert!(create(&json!({"short_period": 0})).is_err());

        let s = create(&json!({"short_period": 5})).unwrap();
        assert_eq!(s.name(), "sma-cross");
    }
}
