//! Data loading and management
//!
//! Downloads klines from the exchange into CSV files and loads them back as
//! validated candles for the backtester.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

use crate::binance::{BinanceClient, Kline, KlineQuery, MAX_KLINES_PER_REQUEST};
use crate::types::{Candle, CandleValidationError};

/// Timestamp layout used in CSV files (UTC)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 2024-01-01T00:00:00Z in milliseconds
pub const DEFAULT_START_MS: i64 = 1_704_067_200_000;

// =============================================================================
// Conversions
// =============================================================================

impl TryFrom<&Kline> for Candle {
    type Error = CandleValidationError;

    fn try_from(kline: &Kline) -> Result<Self, Self::Error> {
        let datetime = DateTime::from_timestamp_millis(kline.open_time)
            .ok_or(CandleValidationError::InvalidTimestamp(kline.open_time))?;
        Candle::new(
            datetime,
            kline.open,
            kline.high,
            kline.low,
            kline.close,
            kline.volume,
        )
    }
}

/// `{symbol}_{interval}_historical_data.csv`
pub fn historical_filename(symbol: &str, interval: &str) -> String {
    format!("{}_{}_historical_data.csv", symbol, interval)
}

/// Accepts `%Y-%m-%d %H:%M:%S` (UTC), RFC 3339, or epoch milliseconds
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ndt) = NaiveDateTime::parse_from_str(value, TIMESTAMP_FORMAT) {
        return Some(ndt.and_utc());
    }
    if let Ok(dt) = value.parse::<DateTime<Utc>>() {
        return Some(dt);
    }
    value
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
}

// =============================================================================
// CSV
// =============================================================================

#[derive(Debug, Serialize)]
struct CsvRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl CsvRow {
    fn new(datetime: DateTime<Utc>, o: f64, h: f64, l: f64, c: f64, v: f64) -> Self {
        CsvRow {
            timestamp: datetime.format(TIMESTAMP_FORMAT).to_string(),
            open: o,
            high: h,
            low: l,
            close: c,
            volume: v,
        }
    }
}

/// Write klines as `timestamp,open,high,low,close,volume`
///
/// Returns the number of rows written.
pub fn write_klines_csv(path: impl AsRef<Path>, klines: &[Kline]) -> Result<usize> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    if klines.is_empty() {
        writer.write_record(["timestamp", "open", "high", "low", "close", "volume"])?;
    }

    for kline in klines {
        let datetime = DateTime::from_timestamp_millis(kline.open_time)
            .with_context(|| format!("Kline open time {} is out of range", kline.open_time))?;
        writer.serialize(CsvRow::new(
            datetime,
            kline.open,
            kline.high,
            kline.low,
            kline.close,
            kline.volume,
        ))?;
    }

    writer.flush()?;
    Ok(klines.len())
}

/// Write candles in the same layout as [`write_klines_csv`]
pub fn write_candles_csv(path: impl AsRef<Path>, candles: &[Candle]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    for c in candles {
        writer.serialize(CsvRow::new(c.datetime, c.open, c.high, c.low, c.close, c.volume))?;
    }

    writer.flush()?;
    Ok(())
}

/// Load OHLCV data from CSV file
///
/// The first column holds the timestamp, followed by open, high, low, close
/// and volume. Rows that parse but fail candle validation are skipped.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();
    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("Failed to open CSV file {}", path.display()))?;

    let mut candles = Vec::new();
    let mut skipped = 0usize;

    for (row_idx, result) in reader.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read row {}", row_idx + 1))?;

        let ts = record.get(0).context("Missing timestamp column")?;
        let datetime = parse_timestamp(ts)
            .with_context(|| format!("Failed to parse timestamp: {}", ts))?;

        let field = |idx: usize, name: &str| -> Result<f64> {
            record
                .get(idx)
                .with_context(|| format!("Missing {} column", name))?
                .trim()
                .parse()
                .with_context(|| format!("Failed to parse {} on row {}", name, row_idx + 1))
        };

        let open = field(1, "open")?;
        let high = field(2, "high")?;
        let low = field(3, "low")?;
        let close = field(4, "close")?;
        let volume = field(5, "volume")?;

        match Candle::new(datetime, open, high, low, close, volume) {
            Ok(candle) => candles.push(candle),
            Err(e) => {
                warn!("Skipping row {}: {}", row_idx + 1, e);
                skipped += 1;
            }
        }
    }

    if skipped > 0 {
        warn!("Skipped {} invalid rows in {}", skipped, path.display());
    }

    Ok(candles)
}

// =============================================================================
// Download
// =============================================================================

/// What to download from `/api/v3/klines`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KlineDownload {
    pub symbol: String,
    pub interval: String,
    /// Candles per request, also the page size of a range download
    pub limit: u32,
    /// Start time in milliseconds
    pub start_time: i64,
    /// End time in milliseconds; set to paginate through the whole range
    pub end_time: Option<i64>,
}

impl Default for KlineDownload {
    fn default() -> Self {
        Self {
            symbol: "BTCUSDT".to_string(),
            interval: "1m".to_string(),
            limit: MAX_KLINES_PER_REQUEST,
            start_time: DEFAULT_START_MS,
            end_time: None,
        }
    }
}

impl KlineDownload {
    pub fn filename(&self) -> String {
        historical_filename(&self.symbol, &self.interval)
    }
}

/// Fetch klines and write them to `out_dir`, returning the file path
pub async fn download(
    client: &BinanceClient,
    request: &KlineDownload,
    out_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let out_dir = out_dir.as_ref();
    fs::create_dir_all(out_dir)
        .with_context(|| format!("Failed to create output directory {}", out_dir.display()))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner.set_message(format!(
        "Fetching {} {} klines",
        request.symbol, request.interval
    ));

    let fetched = match request.end_time {
        Some(end) => {
            client
                .fetch_range(
                    &request.symbol,
                    &request.interval,
                    request.start_time,
                    end,
                    request.limit,
                    |total| spinner.set_message(format!("{} klines fetched", total)),
                )
                .await
        }
        None => {
            let query = KlineQuery::new(&request.symbol, &request.interval)
                .with_limit(request.limit)
                .with_start(request.start_time);
            client.get_klines(&query).await
        }
    };
    spinner.finish_and_clear();

    let klines = fetched.with_context(|| {
        format!(
            "Failed to download {} {} klines",
            request.symbol, request.interval
        )
    })?;

    if klines.is_empty() {
        warn!(
            "No klines returned for {} {}",
            request.symbol, request.interval
        );
    }

    let path = out_dir.join(request.filename());
    let rows = write_klines_csv(&path, &klines)?;
    info!("Saved {} rows to {}", rows, path.display());

    Ok(path)
}

// =============================================================================
// Data Validation
// =============================================================================

/// Result of data validation
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Check a candle series before a backtest: non-empty, chronological
pub fn validate_candles(candles: &[Candle]) -> ValidationResult {
    let mut result = ValidationResult::default();

    if candles.is_empty() {
        result.errors.push("No candles provided".to_string());
        return result;
    }

    for (i, pair) in candles.windows(2).enumerate() {
        if pair[1].datetime <= pair[0].datetime {
            result
                .warnings
                .push(format!("Candle {}: not chronological", i + 1));
        }
    }

    result
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn kline(open_time: i64, close: f64) -> Kline {
        Kline {
            open_time,
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 10.0,
            close_time: open_time + 59_999,
            quote_volume: close * 10.0,
            trades: 5,
        }
    }

    #[test]
    fn test_historical_filename() {
        assert_eq!(
            historical_filename("BTCUSDT", "1m"),
            "BTCUSDT_1m_historical_data.csv"
        );
        assert_eq!(
            KlineDownload::default().filename(),
            "BTCUSDT_1m_historical_data.csv"
        );
    }

    #[test]
    fn test_download_defaults() {
        let request = KlineDownload::default();
        assert_eq!(request.limit, 1000);
        assert_eq!(
            DateTime::from_timestamp_millis(request.start_time)
                .unwrap()
                .to_rfc3339(),
            "2024-01-01T00:00:00+00:00"
        );
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let expected = DateTime::from_timestamp_millis(DEFAULT_START_MS).unwrap();
        assert_eq!(parse_timestamp("2024-01-01 00:00:00"), Some(expected));
        assert_eq!(parse_timestamp("2024-01-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_timestamp("1704067200000"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_write_klines_csv_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");

        let rows = write_klines_csv(&path, &[kline(DEFAULT_START_MS, 42000.5)]).unwrap();
        assert_eq!(rows, 1);

        let text = fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("timestamp,open,high,low,close,volume"));
        assert_eq!(
            lines.next(),
            Some("2024-01-01 00:00:00,42000.5,42001.5,41999.5,42000.5,10.0")
        );
        assert_eq!(lines.next(), None);
    }

    #[test]
    fn test_write_empty_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.csv");

        write_klines_csv(&path, &[]).unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim(), "timestamp,open,high,low,close,volume");
        assert!(load_csv(&path).unwrap().is_empty());
    }

    #[test]
    fn test_load_skips_invalid_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n\
             2024-01-01 00:00:00,100,110,90,105,1\n\
             2024-01-01 00:01:00,100,90,110,105,1\n\
             2024-01-01T00:02:00Z,105,106,104,105.5,2\n",
        )
        .unwrap();

        let candles = load_csv(&path).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[1].close, 105.5);
    }

    #[test]
    fn test_load_skips_non_finite_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nan.csv");
        fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n\
             2024-01-01 00:00:00,NaN,NaN,NaN,NaN,1\n\
             2024-01-01 00:01:00,100,inf,90,105,1\n\
             2024-01-01 00:02:00,100,110,90,105,1\n",
        )
        .unwrap();

        let candles = load_csv(&path).unwrap();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, 105.0);
        assert!(validate_candles(&candles).is_valid());
    }

    #[test]
    fn test_load_rejects_garbage_numbers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        fs::write(
            &path,
            "timestamp,open,high,low,close,volume\n2024-01-01 00:00:00,abc,1,1,1,1\n",
        )
        .unwrap();

        assert!(load_csv(&path).is_err());
    }

    #[test]
    fn test_kline_to_candle() {
        let candle = Candle::try_from(&kline(DEFAULT_START_MS, 50.0)).unwrap();
        assert_eq!(candle.datetime.timestamp_millis(), DEFAULT_START_MS);
        assert_eq!(candle.high, 51.0);
    }

    #[test]
    fn test_validate_candles_order() {
        let a = Candle::try_from(&kline(DEFAULT_START_MS, 50.0)).unwrap();
        let b = Candle::try_from(&kline(DEFAULT_START_MS + 60_000, 51.0)).unwrap();

        assert!(validate_candles(&[a.clone(), b.clone()]).warnings.is_empty());
        assert_eq!(validate_candles(&[b, a]).warnings.len(), 1);
        assert!(!validate_candles(&[]).is_valid());
    }
}
