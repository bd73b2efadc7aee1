//! Download command - fetch historical klines from Binance into a CSV file

use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use testnet_trader::binance::{is_valid_interval, BinanceClient, MAX_KLINES_PER_REQUEST};
use testnet_trader::data::{self, load_csv, parse_timestamp, KlineDownload};
use testnet_trader::RetryPolicy;
use tracing::{info, warn};

use super::{banner, rule};

/// Public market-data endpoint
pub const DEFAULT_DATA_URL: &str = "https://api.binance.us";

/// Socket timeout for market-data requests
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// `YYYY-MM-DD` (midnight UTC) or any format [`parse_timestamp`] accepts
fn parse_date_ms(value: &str) -> Result<i64> {
    if let Ok(date) = NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d") {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .context("Invalid date")?
            .and_utc();
        return Ok(midnight.timestamp_millis());
    }
    parse_timestamp(value)
        .map(|dt| dt.timestamp_millis())
        .with_context(|| format!("Invalid date '{}': expected YYYY-MM-DD or RFC 3339", value))
}

pub fn run(
    symbol: String,
    interval: String,
    limit: u32,
    start: String,
    end: Option<String>,
    output: PathBuf,
    base_url: String,
) -> Result<()> {
    if !is_valid_interval(&interval) {
        warn!("Interval '{}' is not a known Binance interval", interval);
    }
    if limit > MAX_KLINES_PER_REQUEST {
        warn!(
            "Limit {} exceeds {}; the request will be capped",
            limit, MAX_KLINES_PER_REQUEST
        );
    }

    let request = KlineDownload {
        symbol: symbol.to_uppercase(),
        interval,
        limit: limit.min(MAX_KLINES_PER_REQUEST),
        start_time: parse_date_ms(&start)?,
        end_time: end.as_deref().map(parse_date_ms).transpose()?,
    };

    banner("DOWNLOADING HISTORICAL DATA FROM BINANCE");
    println!("  Symbol:     {}", request.symbol);
    println!("  Interval:   {}", request.interval);
    println!("  Start:      {}", start);
    println!("  End:        {}", end.as_deref().unwrap_or("(single page)"));
    println!("  Output:     {}", output.display());
    rule();

    let client = BinanceClient::with_timeout(&base_url, DOWNLOAD_TIMEOUT)?
        .with_retry_policy(RetryPolicy::default());

    let rt = tokio::runtime::Runtime::new()?;
    let path = rt.block_on(data::download(&client, &request, &output))?;

    let candles = load_csv(&path)?;
    info!("Data saved to {}", path.display());

    println!("\n  ✓ {} candles saved to {}", candles.len(), path.display());
    if let (Some(first), Some(last)) = (candles.first(), candles.last()) {
        println!(
            "  Range: {} to {}",
            first.datetime.format("%Y-%m-%d %H:%M"),
            last.datetime.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}
