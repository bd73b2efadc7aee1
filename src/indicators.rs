//! Technical indicators
//!
//! Series functions return one entry per input value, `None` until the
//! indicator has enough history. The `*_last` helpers return only the most
//! recent value.

use ta::indicators::SimpleMovingAverage;
use ta::Next;

/// Calculate Simple Moving Average
pub fn sma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    if values.is_empty() || period == 0 {
        return vec![];
    }

    let mut indicator = match SimpleMovingAverage::new(period) {
        Ok(i) => i,
        Err(_) => return vec![None; values.len()],
    };

    values
        .iter()
        .enumerate()
        .map(|(i, &value)| {
            let sma_val = indicator.next(value);
            (i + 1 >= period).then_some(sma_val)
        })
        .collect()
}

/// Mean of the last `period` values
pub fn sma_last(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }
    let window = &values[values.len() - period..];
    Some(window.iter().sum::<f64>() / period as f64)
}

/// Calculate Exponential Moving Average, seeded with the SMA of the first `period` values
pub fn ema(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(values.len());

    if values.is_empty() || period == 0 {
        return result;
    }

    let multiplier = 2.0 / (period as f64 + 1.0);
    let mut ema_value = 0.0;

    for (i, &value) in values.iter().enumerate() {
        if i + 1 < period {
            result.push(None);
        } else if i + 1 == period {
            ema_value = values[..period].iter().sum::<f64>() / period as f64;
            result.push(Some(ema_value));
        } else {
            ema_value = (value - ema_value) * multiplier + ema_value;
            result.push(Some(ema_value));
        }
    }

    result
}

pub fn ema_last(values: &[f64], period: usize) -> Option<f64> {
    ema(values, period).last().copied().flatten()
}

/// RSI from simple averages of the last `period` price changes
///
/// Needs `period + 1` values. With no losses in the window the result is 100.
pub fn rsi(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() <= period {
        return None;
    }

    let window = &values[values.len() - period - 1..];
    let (gains, losses) = window
        .windows(2)
        .map(|w| w[1] - w[0])
        .fold((0.0, 0.0), |(g, l), change| {
            if change > 0.0 {
                (g + change, l)
            } else {
                (g, l - change)
            }
        });

    let avg_gain = gains / period as f64;
    let avg_loss = losses / period as f64;

    if avg_loss == 0.0 {
        return Some(100.0);
    }
    let rs = avg_gain / avg_loss;
    Some(100.0 - (100.0 / (1.0 + rs)))
}

/// MACD line and its signal line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Macd {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
}

impl Macd {
    /// `(macd, signal)` at `offset` bars back from the latest
    pub fn at_offset(&self, offset: usize) -> Option<(f64, f64)> {
        let idx = self.macd.len().checked_sub(offset + 1)?;
        Some((self.macd[idx]?, self.signal[idx]?))
    }

    pub fn last(&self) -> Option<(f64, f64)> {
        self.at_offset(0)
    }

    pub fn previous(&self) -> Option<(f64, f64)> {
        self.at_offset(1)
    }

    /// MACD crossed above its signal on the latest bar
    pub fn crossed_above(&self) -> bool {
        match (self.previous(), self.last()) {
            (Some((pm, ps)), Some((m, s))) => pm <= ps && m > s,
            _ => false,
        }
    }

    /// MACD crossed below its signal on the latest bar
    pub fn crossed_below(&self) -> bool {
        match (self.previous(), self.last()) {
            (Some((pm, ps)), Some((m, s))) => pm >= ps && m < s,
            _ => false,
        }
    }
}

/// Calculate MACD: EMA(fast) - EMA(slow), signal = EMA(signal) of the MACD line
pub fn macd(values: &[f64], fast: usize, slow: usize, signal: usize) -> Macd {
    let fast_ema = ema(values, fast);
    let slow_ema = ema(values, slow);

    let line: Vec<Option<f64>> = fast_ema
        .iter()
        .zip(&slow_ema)
        .map(|(f, s)| Some((*f)? - (*s)?))
        .collect();

    // the signal EMA runs over the defined part of the MACD line only
    let first = line.iter().position(Option::is_some).unwrap_or(line.len());
    let defined: Vec<f64> = line[first..].iter().flatten().copied().collect();
    let mut signal_line = vec![None; first];
    signal_line.extend(ema(&defined, signal));
    signal_line.resize(line.len(), None);

    Macd {
        macd: line,
        signal: signal_line,
    }
}

/// Calculate True Range
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let len = high.len().min(low.len()).min(close.len());
    let mut tr = Vec::with_capacity(len);

    for i in 0..len {
        let tr_value = if i == 0 {
            high[i] - low[i]
        } else {
            let hl = high[i] - low[i];
            let hc = (high[i] - close[i - 1]).abs();
            let lc = (low[i] - close[i - 1]).abs();
            hl.max(hc).max(lc)
        };
        tr.push(tr_value);
    }

    tr
}

/// Average True Range: mean TR over the last `period` bars
///
/// Every TR in the window uses the previous close, so the first value
/// appears at index `period`.
pub fn atr(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Vec<Option<f64>> {
    let tr = true_range(high, low, close);
    if period == 0 {
        return vec![None; tr.len()];
    }

    (0..tr.len())
        .map(|i| {
            (i >= period).then(|| tr[i + 1 - period..=i].iter().sum::<f64>() / period as f64)
        })
        .collect()
}

pub fn atr_last(high: &[f64], low: &[f64], close: &[f64], period: usize) -> Option<f64> {
    atr(high, low, close, period).last().copied().flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_sma() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = sma(&values, 3);

        assert_eq!(result[0], None);
        assert_eq!(result[1], None);
        assert_relative_eq!(result[2].unwrap(), 2.0);
        assert_relative_eq!(result[3].unwrap(), 3.0);
        assert_relative_eq!(result[4].unwrap(), 4.0);
        assert_eq!(sma_last(&values, 2), Some(4.5));
        assert_eq!(sma_last(&values, 6), None);
    }

    #[test]
    fn test_ema_seeded_with_sma() {
        let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let result = ema(&values, 3);

        assert_eq!(result[1], None);
        assert_relative_eq!(result[2].unwrap(), 2.0);
        // multiplier 0.5: (4 - 2) * 0.5 + 2
        assert_relative_eq!(result[3].unwrap(), 3.0);
        assert_relative_eq!(ema_last(&values, 3).unwrap(), 4.0);
    }

    #[test]
    fn test_rsi_bounds() {
        let rising: Vec<f64> = (1..=20).map(f64::from).collect();
        assert_eq!(rsi(&rising, 14), Some(100.0));

        let falling: Vec<f64> = rising.iter().rev().copied().collect();
        assert_relative_eq!(rsi(&falling, 14).unwrap(), 0.0);

        assert_eq!(rsi(&rising[..14], 14), None);
    }

    #[test]
    fn test_rsi_balanced_moves() {
        let values = vec![10.0, 11.0, 10.0, 11.0, 10.0];
        assert_relative_eq!(rsi(&values, 4).unwrap(), 50.0);
    }

    #[test]
    fn test_macd_lengths_and_warmup() {
        let values: Vec<f64> = (0..60).map(|i| 100.0 + i as f64).collect();
        let result = macd(&values, 12, 26, 9);

        assert_eq!(result.macd.len(), 60);
        assert_eq!(result.signal.len(), 60);
        assert!(result.macd[24].is_none());
        assert!(result.macd[25].is_some());
        assert!(result.signal[32].is_none());
        assert!(result.signal[33].is_some());

        let (m, s) = result.last().unwrap();
        assert!(m > 0.0);
        assert!(s > 0.0);
    }

    #[test]
    fn test_macd_too_short() {
        let result = macd(&[1.0, 2.0, 3.0], 12, 26, 9);
        assert!(result.last().is_none());
        assert!(!result.crossed_above());
    }

    #[test]
    fn test_true_range_uses_previous_close() {
        let high = [10.0, 12.0];
        let low = [9.0, 11.0];
        let close = [9.5, 11.5];

        let tr = true_range(&high, &low, &close);
        assert_relative_eq!(tr[0], 1.0);
        assert_relative_eq!(tr[1], 2.5);
    }

    #[test]
    fn test_atr_needs_period_plus_one_bars() {
        let high = [11.0, 12.0, 13.0, 14.0];
        let low = [9.0, 10.0, 11.0, 12.0];
        let close = [10.0, 11.0, 12.0, 13.0];

        let values = atr(&high, &low, &close, 3);
        assert!(values[2].is_none());
        assert_relative_eq!(values[3].unwrap(), 2.0);
        assert_eq!(atr_last(&high[..3], &low[..3], &close[..3], 3), None);
    }
}
