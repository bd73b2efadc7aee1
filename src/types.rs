//! Core data types shared by the client, the downloader and the backtester

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Validation errors for candle data
#[derive(Debug, Error)]
pub enum CandleValidationError {
    #[error("high ({high}) must be >= low ({low})")]
    HighLessThanLow { high: f64, low: f64 },

    #[error("volume ({0}) must be >= 0")]
    NegativeVolume(f64),

    #[error("open ({open}) must be between low ({low}) and high ({high})")]
    OpenOutOfRange { open: f64, low: f64, high: f64 },

    #[error("close ({close}) must be between low ({low}) and high ({high})")]
    CloseOutOfRange { close: f64, low: f64, high: f64 },

    #[error("values must be finite: open={open}, high={high}, low={low}, close={close}, volume={volume}")]
    NonFinite {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    },

    #[error("timestamp {0} ms is out of range")]
    InvalidTimestamp(i64),

    #[error("prices must be positive: open={open}, high={high}, low={low}, close={close}")]
    NonPositivePrice {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
}

/// OHLCV candlestick data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub datetime: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    /// Create a new candle with validation
    pub fn new(
        datetime: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: f64,
    ) -> Result<Self, CandleValidationError> {
        let candle = Self {
            datetime,
            open,
            high,
            low,
            close,
            volume,
        };
        candle.validate()?;
        Ok(candle)
    }

    /// Validate the candle data
    pub fn validate(&self) -> Result<(), CandleValidationError> {
        if ![self.open, self.high, self.low, self.close, self.volume]
            .iter()
            .all(|v| v.is_finite())
        {
            return Err(CandleValidationError::NonFinite {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
                volume: self.volume,
            });
        }

        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(CandleValidationError::NonPositivePrice {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }

        if self.high < self.low {
            return Err(CandleValidationError::HighLessThanLow {
                high: self.high,
                low: self.low,
            });
        }

        if self.volume < 0.0 {
            return Err(CandleValidationError::NegativeVolume(self.volume));
        }

        if self.open < self.low || self.open > self.high {
            return Err(CandleValidationError::OpenOutOfRange {
                open: self.open,
                low: self.low,
                high: self.high,
            });
        }

        if self.close < self.low || self.close > self.high {
            return Err(CandleValidationError::CloseOutOfRange {
                close: self.close,
                low: self.low,
                high: self.high,
            });
        }

        Ok(())
    }
}

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        }
    }
}

impl std::str::FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(Side::Buy),
            "SELL" => Ok(Side::Sell),
            _ => Err(format!("Invalid side '{}'. Must be BUY or SELL", s)),
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Order type accepted by the order endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Market,
    Limit,
}

impl OrderType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        }
    }
}

impl std::str::FromStr for OrderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "MARKET" => Ok(OrderType::Market),
            "LIMIT" => Ok(OrderType::Limit),
            _ => Err(format!(
                "Invalid order type '{}'. Must be MARKET or LIMIT",
                s
            )),
        }
    }
}

impl std::fmt::Display for OrderType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How long a limit order stays on the book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Good till cancelled
    #[default]
    Gtc,
    /// Immediate or cancel
    Ioc,
    /// Fill or kill
    Fok,
}

impl TimeInForce {
    pub fn as_str(&self) -> &'static str {
        match self {
            TimeInForce::Gtc => "GTC",
            TimeInForce::Ioc => "IOC",
            TimeInForce::Fok => "FOK",
        }
    }
}

impl std::str::FromStr for TimeInForce {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "GTC" => Ok(TimeInForce::Gtc),
            "IOC" => Ok(TimeInForce::Ioc),
            "FOK" => Ok(TimeInForce::Fok),
            _ => Err(format!(
                "Invalid time in force '{}'. Must be GTC, IOC or FOK",
                s
            )),
        }
    }
}

/// Trading signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    /// Open (or keep) a long position
    Long,
    /// Close any long position
    Flat,
    /// No opinion on this bar
    Hold,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts() -> DateTime<Utc> {
        DateTime::from_timestamp_millis(1_704_067_200_000).unwrap()
    }

    #[test]
    fn test_valid_candle() {
        let candle = Candle::new(ts(), 100.0, 110.0, 95.0, 105.0, 12.5).unwrap();
        assert_eq!(candle.close, 105.0);
    }

    #[test]
    fn test_candle_rejects_non_finite_values() {
        let err = Candle::new(ts(), f64::NAN, f64::NAN, f64::NAN, f64::NAN, 1.0).unwrap_err();
        assert!(matches!(err, CandleValidationError::NonFinite { .. }));

        let err = Candle::new(ts(), 100.0, f64::INFINITY, 95.0, 100.0, 1.0).unwrap_err();
        assert!(matches!(err, CandleValidationError::NonFinite { .. }));

        assert!(Candle::new(ts(), 100.0, 110.0, 95.0, 105.0, f64::NAN).is_err());
    }

    #[test]
    fn test_candle_rejects_inverted_range() {
        let err = Candle::new(ts(), 100.0, 90.0, 95.0, 92.0, 1.0).unwrap_err();
        assert!(matches!(err, CandleValidationError::HighLessThanLow { .. }));
    }

    #[test]
    fn test_candle_rejects_close_outside_range() {
        let err = Candle::new(ts(), 100.0, 110.0, 95.0, 120.0, 1.0).unwrap_err();
        assert!(matches!(err, CandleValidationError::CloseOutOfRange { .. }));
    }

    #[test]
    fn test_candle_rejects_negative_volume() {
        let err = Candle::new(ts(), 100.0, 110.0, 95.0, 100.0, -1.0).unwrap_err();
        assert!(matches!(err, CandleValidationError::NegativeVolume(_)));
    }

    #[test]
    fn test_candle_rejects_zero_price() {
        assert!(Candle::new(ts(), 0.0, 110.0, 95.0, 100.0, 1.0).is_err());
    }

    #[test]
    fn test_side_parsing() {
        assert_eq!("buy".parse::<Side>().unwrap(), Side::Buy);
        assert_eq!(" SELL ".parse::<Side>().unwrap(), Side::Sell);
        let err = "hold".parse::<Side>().unwrap_err();
        assert!(err.contains("BUY or SELL"));
    }

    #[test]
    fn test_order_type_parsing() {
        assert_eq!("Market".parse::<OrderType>().unwrap(), OrderType::Market);
        assert_eq!("LIMIT".parse::<OrderType>().unwrap(), OrderType::Limit);
        assert!("STOP_LOSS".parse::<OrderType>().is_err());
    }

    #[test]
    fn test_wire_names() {
        assert_eq!(Side::Sell.to_string(), "SELL");
        assert_eq!(OrderType::Limit.to_string(), "LIMIT");
        assert_eq!(TimeInForce::default().as_str(), "GTC");
        assert_eq!(serde_json::to_string(&Side::Buy).unwrap(), "\"BUY\"");
    }
}
