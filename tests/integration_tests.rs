//! Integration tests for the testnet trader
//!
//! These tests drive strategies, the backtester and the CSV layer together.

use chrono::{Duration, TimeZone, Utc};

use testnet_trader::backtest::{BacktestConfig, Backtester};
use testnet_trader::data::{load_csv, validate_candles, write_candles_csv};
use testnet_trader::strategies::{self, EnhancedConfig, EnhancedStrategy, PriceChangeStrategy};
use testnet_trader::{Candle, Signal, Strategy};

// =============================================================================
// Test Utilities
// =============================================================================

/// Generate mock candle data oscillating around `base_price`
fn generate_mock_candles(count: usize, base_price: f64, volatility: f64) -> Vec<Candle> {
    let start_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    let mut price = base_price;

    (0..count)
        .map(|i| {
            let change = match i % 3 {
                0 => volatility,
                1 => -volatility * 0.5,
                _ => -volatility * 0.4,
            };
            price += change;

            Candle {
                datetime: start_time + Duration::minutes(i as i64),
                open: price - change * 0.3,
                high: price + volatility * 0.5,
                low: price - volatility * 0.5,
                close: price,
                volume: 1000.0 + (i as f64 * 10.0),
            }
        })
        .collect()
}

/// Generate steadily rising candles
fn generate_trending_candles(count: usize, base_price: f64, trend_strength: f64) -> Vec<Candle> {
    let start_time = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    (0..count)
        .map(|i| {
            let price = base_price + (i as f64 * trend_strength);
            let volatility = base_price * 0.002;
            Candle {
                datetime: start_time + Duration::minutes(i as i64),
                open: price - volatility * 0.5,
                high: price + volatility,
                low: price - volatility,
                close: price,
                volume: 1000.0 + (i as f64 * 10.0),
            }
        })
        .collect()
}

// =============================================================================
// Strategy Tests
// =============================================================================

#[test]
fn test_registry_creates_every_strategy() {
    for name in strategies::available_strategies() {
        let strategy = strategies::create(name, &serde_json::Value::Null).unwrap();
        assert_eq!(strategy.name(), name);
    }
}

#[test]
fn test_registry_rejects_unknown_strategy() {
    let err = strategies::create("martingale", &serde_json::Value::Null)
        .err()
        .unwrap();
    assert!(err.to_string().contains("Unknown strategy"));
}

#[test]
fn test_sma_cross_goes_long_on_uptrend() {
    let params = serde_json::json!({ "short_period": 5, "long_period": 20 });
    let mut strategy = strategies::create("sma-cross", &params).unwrap();

    for candle in generate_trending_candles(40, 100.0, 0.5) {
        strategy.on_bar(&candle);
    }

    assert_eq!(strategy.signal(), Signal::Long);
}

#[test]
fn test_price_change_follows_last_bar() {
    let mut strategy = PriceChangeStrategy::new();
    let candles = generate_mock_candles(3, 100.0, 1.0);

    strategy.on_bar(&candles[0]);
    assert_eq!(strategy.signal(), Signal::Hold);

    // second bar falls
    strategy.on_bar(&candles[1]);
    assert_eq!(strategy.signal(), Signal::Flat);
}

#[test]
fn test_enhanced_strategy_holds_during_warmup() {
    let mut strategy = EnhancedStrategy::new(EnhancedConfig::default());
    for candle in generate_trending_candles(20, 100.0, 0.5) {
        strategy.on_bar(&candle);
    }

    assert!(!strategy.should_enter_long());
    assert!(!strategy.should_enter_short());
    assert_eq!(strategy.signal(), Signal::Hold);
}

// =============================================================================
// Backtest Tests
// =============================================================================

#[test]
fn test_backtest_without_trades_keeps_capital() {
    let strategy = strategies::create("enhanced", &serde_json::Value::Null).unwrap();
    let mut backtester = Backtester::new(strategy, BacktestConfig::default());

    // too short for the enhanced warmup
    let result = backtester.run(&generate_trending_candles(30, 100.0, 0.5));

    assert!(result.trades.is_empty());
    assert_eq!(result.equity_curve.len(), 30);
    assert_eq!(result.report.final_capital, 10_000.0);
    assert_eq!(result.report.total_return_pct, 0.0);
    assert_eq!(result.report.max_drawdown_pct, 0.0);
}

#[test]
fn test_backtest_closes_open_position_at_end() {
    let params = serde_json::json!({ "short_period": 3, "long_period": 10 });
    let strategy = strategies::create("sma-cross", &params).unwrap();
    let mut backtester = Backtester::new(strategy, BacktestConfig::default());

    let candles = generate_trending_candles(60, 100.0, 1.0);
    let result = backtester.run(&candles);

    assert_eq!(result.trades.len(), 1);
    let trade = &result.trades[0];
    assert_eq!(trade.exit_reason, "end of data");
    assert_eq!(trade.exit_price, candles.last().unwrap().close);
    assert!(trade.profit > 0.0);

    let report = &result.report;
    assert_eq!(report.total_trades, 1);
    assert_eq!(report.winning_trades, 1);
    assert!(report.final_capital > report.initial_capital);
    assert_eq!(
        result.equity_curve.last().unwrap().1,
        report.final_capital
    );
}

#[test]
fn test_backtest_fees_reduce_profit() {
    let candles = generate_trending_candles(60, 100.0, 1.0);
    let params = serde_json::json!({ "short_period": 3, "long_period": 10 });

    let run = |fee_rate: f64| {
        let strategy = strategies::create("sma-cross", &params).unwrap();
        let config = BacktestConfig {
            fee_rate,
            ..BacktestConfig::default()
        };
        Backtester::new(strategy, config).run(&candles).report
    };

    let free = run(0.0);
    let paid = run(0.01);
    assert!(paid.final_capital < free.final_capital);
}

#[test]
fn test_backtest_choppy_market_with_price_change() {
    let strategy: Box<dyn Strategy> = Box::new(PriceChangeStrategy::new());
    let mut backtester = Backtester::new(strategy, BacktestConfig::default());

    let result = backtester.run(&generate_mock_candles(90, 100.0, 2.0));

    // every rise is followed by a fall
    assert!(!result.trades.is_empty());
    assert!(result.trades.iter().all(|t| t.exit_time > t.entry_time));
    assert!(result.report.win_rate >= 0.0 && result.report.win_rate <= 100.0);
    assert!(result.report.max_drawdown_pct >= 0.0);
}

// =============================================================================
// Data Tests
// =============================================================================

#[test]
fn test_csv_roundtrip_feeds_backtest() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("BTCUSDT_1m_historical_data.csv");

    let candles = generate_trending_candles(50, 42_000.0, 15.0);
    write_candles_csv(&path, &candles).unwrap();

    let loaded = load_csv(&path).unwrap();
    assert_eq!(loaded.len(), candles.len());
    assert_eq!(loaded[0].datetime, candles[0].datetime);
    assert!(validate_candles(&loaded).is_valid());

    let strategy = strategies::create("sma-cross", &serde_json::json!({
        "short_period": 5,
        "long_period": 20
    }))
    .unwrap();
    let result = Backtester::new(strategy, BacktestConfig::default()).run(&loaded);
    assert_eq!(result.equity_curve.len(), loaded.len());
}

#[test]
fn test_csv_header_matches_download_format() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("candles.csv");

    write_candles_csv(&path, &generate_mock_candles(2, 100.0, 1.0)).unwrap();
    let contents = std::fs::read_to_string(&path).unwrap();

    let mut lines = contents.lines();
    assert_eq!(lines.next(), Some("timestamp,open,high,low,close,volume"));
    assert!(lines.next().unwrap().starts_with("2024-01-01 00:00:00,"));
}
