//! Watch command - poll the ticker and log SMA crossover signals
//!
//! Each poll becomes a flat candle at the current price. No orders are sent.

use anyhow::Result;
use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use std::time::Duration;
use testnet_trader::strategies::{SmaCrossConfig, SmaCrossStrategy};
use testnet_trader::types::{Candle, Signal};
use testnet_trader::{BinanceClient, Config, Strategy};
use tokio::sync::mpsc;
use tokio::time::interval;
use tracing::{error, info, warn};

pub fn run(
    config: &Config,
    symbol: &str,
    interval_secs: u64,
    short_period: usize,
    long_period: usize,
) -> Result<()> {
    if short_period == 0 || short_period > long_period {
        anyhow::bail!(
            "Need 0 < short <= long, got {} and {}",
            short_period,
            long_period
        );
    }

    let client = BinanceClient::from_config(config)?;
    let strategy = SmaCrossStrategy::new(SmaCrossConfig {
        short_period,
        long_period,
    });

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(watch(client, strategy, symbol, interval_secs.max(1)))
}

async fn watch(
    client: BinanceClient,
    mut strategy: SmaCrossStrategy,
    symbol: &str,
    interval_secs: u64,
) -> Result<()> {
    info!(
        "Watching {} every {}s with SMA {}/{} (Ctrl+C to stop)",
        symbol,
        interval_secs,
        strategy.config().short_period,
        strategy.config().long_period
    );

    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl+C, stopping...");
                let _ = shutdown_tx.send(()).await;
            }
            Err(e) => error!("Error setting up signal handler: {}", e),
        }
    });

    let mut ticker = interval(Duration::from_secs(interval_secs));
    let mut last_signal = Signal::Hold;
    let mut polls = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let price = match client.get_ticker_price(symbol).await {
                    Ok(quote) => quote.price.to_f64(),
                    Err(e) => {
                        warn!("Price poll failed: {}", e);
                        continue;
                    }
                };
                let Some(price) = price.filter(|p| *p > 0.0) else {
                    warn!("Ignoring unusable price for {}", symbol);
                    continue;
                };

                let candle = match Candle::new(Utc::now(), price, price, price, price, 0.0) {
                    Ok(candle) => candle,
                    Err(e) => {
                        warn!("Ignoring price {}: {}", price, e);
                        continue;
                    }
                };
                strategy.on_bar(&candle);
                polls += 1;

                if polls < strategy.config().long_period as u64 {
                    info!(
                        "{} {:.2} (warming up {}/{})",
                        symbol,
                        price,
                        polls,
                        strategy.config().long_period
                    );
                    continue;
                }

                let signal = strategy.signal();
                if let Some((short, long)) = strategy.averages() {
                    info!(
                        "{} {:.2} SMA{}={:.2} SMA{}={:.2} signal={:?}",
                        symbol,
                        price,
                        strategy.config().short_period,
                        short,
                        strategy.config().long_period,
                        long,
                        signal
                    );
                }
                if signal != last_signal && signal != Signal::Hold {
                    info!("Signal changed: {:?} -> {:?}", last_signal, signal);
                    last_signal = signal;
                }
            }
            _ = shutdown_rx.recv() => {
                break;
            }
        }
    }

    info!("Watch ended after {} polls", polls);
    Ok(())
}
