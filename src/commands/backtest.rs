//! Backtest command implementation

use anyhow::{Context, Result};
use std::path::PathBuf;
use testnet_trader::backtest::{print_report, write_trades_csv, BacktestConfig, Backtester};
use testnet_trader::data::{load_csv, validate_candles};
use testnet_trader::strategies;
use tracing::{info, warn};

pub fn run(
    data_path: PathBuf,
    strategy_name: String,
    params: Option<String>,
    capital_override: Option<f64>,
    fee_override: Option<f64>,
    trades_out: Option<PathBuf>,
) -> Result<()> {
    info!("Starting backtest");

    let candles = load_csv(&data_path)
        .with_context(|| format!("Failed to load {}", data_path.display()))?;
    info!("Loaded {} candles from {}", candles.len(), data_path.display());

    let validation = validate_candles(&candles);
    for warning in &validation.warnings {
        warn!("{}", warning);
    }
    if !validation.is_valid() {
        anyhow::bail!("Invalid data: {}", validation.errors.join("; "));
    }

    let params: serde_json::Value = match params {
        Some(json) => serde_json::from_str(&json).context("--params must be a JSON object")?,
        None => serde_json::Value::Null,
    };

    info!("Creating strategy: {}", strategy_name);
    let strategy = strategies::create(&strategy_name, &params)?;

    let mut config = BacktestConfig::default();
    if let Some(capital) = capital_override {
        info!("Overriding initial capital to: ${:.2}", capital);
        config.initial_capital = capital;
    }
    if let Some(fee) = fee_override {
        info!("Overriding fee rate to: {}", fee);
        config.fee_rate = fee;
    }
    config.validate()?;

    let mut backtester = Backtester::new(strategy, config);

    info!("Running backtest...");
    let result = backtester.run(&candles);

    print_report(&strategy_name, &result.report);

    if let Some(path) = trades_out {
        write_trades_csv(&path, &result.trades)?;
        println!("Trade log written to {}", path.display());
    }

    info!("Backtest completed successfully");

    Ok(())
}
