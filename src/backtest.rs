//! Backtesting engine
//!
//! Single-symbol, long-only simulation. Each bar is fed to the strategy, then
//! the position is opened or closed at the bar's close with a flat fee per
//! side. Position size risks a fixed share of cash against an ATR stop.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use std::path::Path;
use tracing::{debug, info};

use crate::indicators::atr;
use crate::strategies::Strategy;
use crate::types::Candle;

/// Simulation parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fee charged on each side, as a fraction of notional
    pub fee_rate: f64,
    /// Share of cash put at risk per trade
    pub risk_per_trade: f64,
    pub atr_period: usize,
    /// Stop distance in ATR multiples, used for sizing
    pub stop_atr_multiple: f64,
    /// Largest position as a share of cash
    pub max_position_pct: f64,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            fee_rate: 0.001,
            risk_per_trade: 0.01,
            atr_period: 14,
            stop_atr_multiple: 2.0,
            max_position_pct: 0.10,
        }
    }
}

impl BacktestConfig {
    /// Reject settings that would make the report meaningless
    pub fn validate(&self) -> Result<()> {
        if !self.initial_capital.is_finite() || self.initial_capital <= 0.0 {
            anyhow::bail!(
                "Initial capital must be positive, got {}",
                self.initial_capital
            );
        }
        if !(0.0..1.0).contains(&self.fee_rate) {
            anyhow::bail!("Fee rate must be in [0, 1), got {}", self.fee_rate);
        }
        Ok(())
    }
}

/// Closed trade
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Net of fees on both sides
    pub profit: f64,
    pub exit_reason: String,
}

#[derive(Debug, Clone)]
struct OpenPosition {
    entry_time: DateTime<Utc>,
    entry_price: f64,
    quantity: f64,
    /// Cash spent including the entry fee
    cost: f64,
}

/// Summary statistics
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BacktestReport {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub total_return_pct: f64,
    pub total_trades: usize,
    pub winning_trades: usize,
    pub win_rate: f64,
    pub total_profit: f64,
    pub max_drawdown_pct: f64,
    pub sharpe_ratio: f64,
}

#[derive(Debug, Default)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<(DateTime<Utc>, f64)>,
    pub report: BacktestReport,
}

/// Backtest engine
pub struct Backtester {
    config: BacktestConfig,
    strategy: Box<dyn Strategy>,
}

impl Backtester {
    pub fn new(strategy: Box<dyn Strategy>, config: BacktestConfig) -> Self {
        Backtester { config, strategy }
    }

    pub fn config(&self) -> &BacktestConfig {
        &self.config
    }

    /// Units to buy at `price`, or `None` when the size rounds to zero
    pub fn position_size(&self, cash: f64, price: f64, atr: Option<f64>) -> Option<f64> {
        if price <= 0.0 || cash <= 0.0 {
            return None;
        }

        let cap = cash * self.config.max_position_pct / price;
        let quantity = match atr {
            Some(atr) if atr > 0.0 => {
                let risk = cash * self.config.risk_per_trade;
                let stop_distance = atr * self.config.stop_atr_multiple;
                let quantity = (risk / stop_distance * 1000.0).floor() / 1000.0;
                quantity.min(cap)
            }
            _ => cap,
        };

        (quantity > 0.0).then_some(quantity)
    }

    /// Run the strategy over candles in chronological order
    pub fn run(&mut self, candles: &[Candle]) -> BacktestResult {
        let initial_capital = self.config.initial_capital;
        let fee = self.config.fee_rate;

        let high: Vec<f64> = candles.iter().map(|c| c.high).collect();
        let low: Vec<f64> = candles.iter().map(|c| c.low).collect();
        let close: Vec<f64> = candles.iter().map(|c| c.close).collect();
        let atr_values = atr(&high, &low, &close, self.config.atr_period);

        let mut cash = initial_capital;
        let mut position: Option<OpenPosition> = None;
        let mut trades = Vec::new();
        let mut equity_curve = Vec::with_capacity(candles.len());

        for (i, candle) in candles.iter().enumerate() {
            self.strategy.on_bar(candle);
            let price = candle.close;

            match position.take() {
                Some(pos) if self.strategy.should_exit_long() => {
                    cash += self.close_position(pos, candle, "signal", &mut trades);
                }
                Some(pos) => position = Some(pos),
                None if self.strategy.should_enter_long() => {
                    if let Some(quantity) = self.position_size(cash, price, atr_values[i]) {
                        let cost = quantity * price * (1.0 + fee);
                        cash -= cost;
                        debug!(
                            "{} BUY {:.3} @ {:.2}",
                            candle.datetime, quantity, price
                        );
                        self.strategy.notify_entry(price);
                        position = Some(OpenPosition {
                            entry_time: candle.datetime,
                            entry_price: price,
                            quantity,
                            cost,
                        });
                    }
                }
                None => {}
            }

            let held = position.as_ref().map_or(0.0, |p| p.quantity * price);
            equity_curve.push((candle.datetime, cash + held));
        }

        if let (Some(pos), Some(last)) = (position.take(), candles.last()) {
            cash += self.close_position(pos, last, "end of data", &mut trades);
            if let Some(point) = equity_curve.last_mut() {
                point.1 = cash;
            }
        }

        let report = build_report(initial_capital, cash, &trades, &equity_curve);
        info!(
            "Backtest finished: {} trades, return {:.2}%",
            report.total_trades, report.total_return_pct
        );

        BacktestResult {
            trades,
            equity_curve,
            report,
        }
    }

    /// Sell at the candle's close, returning the cash received
    fn close_position(
        &mut self,
        pos: OpenPosition,
        candle: &Candle,
        reason: &str,
        trades: &mut Vec<Trade>,
    ) -> f64 {
        let proceeds = pos.quantity * candle.close * (1.0 - self.config.fee_rate);
        debug!(
            "{} SELL {:.3} @ {:.2} ({})",
            candle.datetime, pos.quantity, candle.close, reason
        );

        trades.push(Trade {
            entry_time: pos.entry_time,
            exit_time: candle.datetime,
            entry_price: pos.entry_price,
            exit_price: candle.close,
            quantity: pos.quantity,
            profit: proceeds - pos.cost,
            exit_reason: reason.to_string(),
        });
        self.strategy.notify_exit();

        proceeds
    }
}

/// Largest peak-to-trough decline of the equity curve, in percent
pub fn max_drawdown_pct(initial_capital: f64, equity_curve: &[(DateTime<Utc>, f64)]) -> f64 {
    let mut peak = initial_capital;
    let mut max_dd = 0.0;

    for &(_, equity) in equity_curve {
        peak = peak.max(equity);
        if peak > 0.0 {
            max_dd = f64::max(max_dd, (peak - equity) / peak);
        }
    }

    max_dd * 100.0
}

/// Mean over population standard deviation of per-trade returns, times sqrt(252)
///
/// Each return is the trade's profit over the capital before it. Zero when
/// there are fewer than two trades or no dispersion.
pub fn sharpe_ratio(initial_capital: f64, trades: &[Trade]) -> f64 {
    if trades.len() < 2 {
        return 0.0;
    }

    let mut capital = initial_capital;
    let returns: Vec<f64> = trades
        .iter()
        .map(|t| {
            let r = t.profit / capital;
            capital += t.profit;
            r
        })
        .collect();

    let mean = returns.iter().mean();
    let std_dev = returns.iter().population_std_dev();

    if std_dev.is_finite() && std_dev > 0.0 {
        mean / std_dev * 252.0_f64.sqrt()
    } else {
        0.0
    }
}

fn build_report(
    initial_capital: f64,
    final_capital: f64,
    trades: &[Trade],
    equity_curve: &[(DateTime<Utc>, f64)],
) -> BacktestReport {
    let winning_trades = trades.iter().filter(|t| t.profit > 0.0).count();
    let win_rate = if trades.is_empty() {
        0.0
    } else {
        winning_trades as f64 / trades.len() as f64 * 100.0
    };

    BacktestReport {
        initial_capital,
        final_capital,
        total_return_pct: (final_capital - initial_capital) / initial_capital * 100.0,
        total_trades: trades.len(),
        winning_trades,
        win_rate,
        total_profit: trades.iter().map(|t| t.profit).sum(),
        max_drawdown_pct: max_drawdown_pct(initial_capital, equity_curve),
        sharpe_ratio: sharpe_ratio(initial_capital, trades),
    }
}

/// Write the trade log as CSV
pub fn write_trades_csv(path: impl AsRef<Path>, trades: &[Trade]) -> Result<()> {
    let path = path.as_ref();
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create trade log {}", path.display()))?;
    for trade in trades {
        writer.serialize(trade)?;
    }
    writer.flush()?;
    info!("Wrote {} trades to {}", trades.len(), path.display());
    Ok(())
}

/// Print the report to stdout
pub fn print_report(strategy: &str, report: &BacktestReport) {
    println!("\n{}", "=".repeat(60));
    println!("BACKTEST RESULTS ({})", strategy);
    println!("{}", "=".repeat(60));
    println!("Initial Capital:    ${:.2}", report.initial_capital);
    println!("Final Capital:      ${:.2}", report.final_capital);
    println!("Total Return:       {:.2}%", report.total_return_pct);
    println!("Total Trades:       {}", report.total_trades);
    println!("Winning Trades:     {}", report.winning_trades);
    println!("Win Rate:           {:.2}%", report.win_rate);
    println!("Total Profit:       ${:.2}", report.total_profit);
    println!("Max Drawdown:       {:.2}%", report.max_drawdown_pct);
    println!("Sharpe Ratio:       {:.2}", report.sharpe_ratio);
    println!("{}", "=".repeat(60));
}
