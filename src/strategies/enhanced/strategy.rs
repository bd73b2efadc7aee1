//! Enhanced strategy implementation

use std::collections::VecDeque;

use super::config::EnhancedConfig;
use crate::indicators::{atr_last, ema_last, macd, rsi, Macd};
use crate::strategies::Strategy;
use crate::types::Candle;

/// RSI used when there is not enough history
const NEUTRAL_RSI: f64 = 50.0;

/// Trend classification from EMA 20/50 and the 20-bar change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Up,
    Down,
    Sideways,
}

/// Column view of the held candles
struct Series {
    close: Vec<f64>,
    high: Vec<f64>,
    low: Vec<f64>,
    volume: Vec<f64>,
}

impl Series {
    fn last_close(&self) -> f64 {
        self.close.last().copied().unwrap_or(0.0)
    }
}

#[derive(Debug, Clone)]
pub struct EnhancedStrategy {
    config: EnhancedConfig,
    history: VecDeque<Candle>,
    entry_price: Option<f64>,
}

impl EnhancedStrategy {
    pub fn new(config: EnhancedConfig) -> Self {
        Self {
            history: VecDeque::with_capacity(config.max_history),
            config,
            entry_price: None,
        }
    }

    pub fn config(&self) -> &EnhancedConfig {
        &self.config
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn entry_price(&self) -> Option<f64> {
        self.entry_price
    }

    fn series(&self) -> Series {
        Series {
            close: self.history.iter().map(|c| c.close).collect(),
            high: self.history.iter().map(|c| c.high).collect(),
            low: self.history.iter().map(|c| c.low).collect(),
            volume: self.history.iter().map(|c| c.volume).collect(),
        }
    }

    fn rsi(&self, s: &Series) -> f64 {
        rsi(&s.close, self.config.rsi_period).unwrap_or(NEUTRAL_RSI)
    }

    fn macd(&self, s: &Series) -> Macd {
        macd(
            &s.close,
            self.config.fast_ema,
            self.config.slow_ema,
            self.config.signal_ema,
        )
    }

    fn atr(&self, s: &Series) -> f64 {
        atr_last(&s.high, &s.low, &s.close, self.config.atr_period).unwrap_or(0.0)
    }

    fn above_ema(s: &Series, period: usize) -> bool {
        ema_last(&s.close, period).is_some_and(|e| s.last_close() > e)
    }

    /// Needs 50 bars; anything shorter is sideways
    fn trend(s: &Series) -> Trend {
        let n = s.close.len();
        if n < 50 {
            return Trend::Sideways;
        }

        let above_20 = Self::above_ema(s, 20);
        let above_50 = Self::above_ema(s, 50);
        let base = s.close[n - 20];
        let change_pct = (s.last_close() - base) / base * 100.0;

        if above_20 && above_50 && change_pct > 2.0 {
            Trend::Up
        } else if !above_20 && !above_50 && change_pct < -2.0 {
            Trend::Down
        } else {
            Trend::Sideways
        }
    }

    /// Current trend of the held history
    pub fn current_trend(&self) -> Trend {
        Self::trend(&self.series())
    }

    /// Mean of the last 3 volumes more than 20% above the 7 before them
    fn volume_increasing(s: &Series) -> bool {
        let n = s.volume.len();
        if n < 10 {
            return false;
        }
        let recent = s.volume[n - 3..].iter().sum::<f64>() / 3.0;
        let before = s.volume[n - 10..n - 3].iter().sum::<f64>() / 7.0;
        recent > before * 1.2
    }

    /// ATR above 2% of the price
    fn volatility_high(&self, s: &Series) -> bool {
        self.atr(s) > s.last_close() * 0.02
    }

    /// Number of long-entry confirmations on the latest bar
    pub fn long_confirmations(&self) -> usize {
        let s = self.series();
        let n = s.close.len();
        if n < self.config.long_warmup() {
            return 0;
        }
        let price = s.last_close();

        let ema_stack = match (
            ema_last(&s.close, 8),
            ema_last(&s.close, 21),
            ema_last(&s.close, 50),
        ) {
            (Some(e8), Some(e21), Some(e50)) => {
                e8 > e21 && e21 > e50 && price > e8 && price > e21
            }
            _ => false,
        };

        let rsi = self.rsi(&s);
        let rsi_good = rsi > 40.0 && rsi < 65.0;

        let macd_positive = self
            .macd(&s)
            .last()
            .is_some_and(|(m, signal)| m > 0.0 && m > signal);

        let volume_good = n > 10 && {
            let avg = s.volume[n - 10..].iter().sum::<f64>() / 10.0;
            s.volume[n - 1] > avg
        };

        let higher_lows = n > 4 && {
            let recent = s.low[n - 2..].iter().copied().fold(f64::INFINITY, f64::min);
            let before = s.low[n - 4..n - 2].iter().copied().fold(f64::INFINITY, f64::min);
            recent > before
        };

        [ema_stack, rsi_good, macd_positive, volume_good, higher_lows]
            .iter()
            .filter(|&&ok| ok)
            .count()
    }
}

impl Strategy for EnhancedStrategy {
    fn name(&self) -> &'static str {
        "enhanced"
    }

    fn on_bar(&mut self, candle: &Candle) {
        self.history.push_back(candle.clone());
        while self.history.len() > self.config.max_history {
            self.history.pop_front();
        }
    }

    fn should_enter_long(&self) -> bool {
        self.long_confirmations() >= 3
    }

    fn should_exit_long(&self) -> bool {
        let s = self.series();
        if s.close.len() < self.config.long_warmup() {
            return false;
        }
        let price = s.last_close();

        let (stop_loss, take_profit) = match self.entry_price {
            Some(entry) => {
                let atr = self.atr(&s);
                let move_from_entry = price - entry;
                (
                    move_from_entry < -atr * self.config.stop_atr_multiple,
                    move_from_entry > atr * self.config.take_profit_atr_multiple,
                )
            }
            None => (false, false),
        };

        let trend_reversal = match (ema_last(&s.close, 8), ema_last(&s.close, 21)) {
            (Some(e8), Some(e21)) => price < e8 && e8 < e21,
            _ => false,
        };

        let rsi = self.rsi(&s);
        let rsi_exit = rsi > self.config.rsi_overbought || rsi < 40.0;

        let macd = self.macd(&s);
        let macd_reversal = match (macd.previous(), macd.last()) {
            (Some((prev, _)), Some((m, _))) => m < 0.0 && m < prev,
            _ => false,
        };

        stop_loss || take_profit || (trend_reversal && (rsi_exit || macd_reversal))
    }

    fn should_enter_short(&self) -> bool {
        let s = self.series();
        if s.close.len() < self.config.short_warmup() {
            return false;
        }

        let rsi = self.rsi(&s);
        let rsi_ok = rsi < self.config.rsi_overbought && rsi > 40.0;
        let crossunder = self.macd(&s).crossed_below();
        let downtrend = Self::trend(&s) == Trend::Down;
        let volume_up = Self::volume_increasing(&s);
        let calm = !self.volatility_high(&s);

        let strong = downtrend && (crossunder || rsi_ok) && volume_up;
        let moderate = crossunder && rsi_ok && calm;
        strong || moderate
    }

    fn should_exit_short(&self) -> bool {
        let s = self.series();
        if s.close.len() < self.config.short_warmup() {
            return false;
        }

        let oversold = self.rsi(&s) < self.config.rsi_oversold;
        let crossover = self.macd(&s).crossed_above();
        let uptrend = Self::trend(&s) == Trend::Up;

        let (target_hit, stop_hit) = match self.entry_price {
            Some(entry) if entry > 0.0 => {
                let gain = (entry - s.last_close()) / entry;
                (
                    gain > self.config.short_profit_target,
                    gain < -self.config.short_stop_loss,
                )
            }
            _ => (false, false),
        };

        oversold || crossover || uptrend || target_hit || stop_hit
    }

    fn notify_entry(&mut self, price: f64) {
        self.entry_price = Some(price);
    }

    fn notify_exit(&mut self) {
        self.entry_price = None;
    }
}
