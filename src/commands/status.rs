//! Status command - connectivity, current price and account summary

use anyhow::Result;
use testnet_trader::{Config, OrderManager};
use tracing::{info, warn};

use super::{banner, rule};

pub fn run(config: &Config, symbol: &str) -> Result<()> {
    let manager = OrderManager::from_config(config)?;
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(show(&manager, symbol))
}

async fn show(manager: &OrderManager, symbol: &str) -> Result<()> {
    let client = manager.client();

    client.ping().await?;
    let server_time = client.server_time().await?;
    info!(
        "Connected to {} (server time {})",
        client.base_url(),
        server_time
    );

    banner(&format!("STATUS - {}", client.base_url()));

    match manager.current_price(symbol).await {
        Ok(price) => println!("  {} price: {}", symbol, price),
        Err(e) => warn!("Failed to retrieve price for {}: {}", symbol, e),
    }

    if !client.has_credentials() {
        warn!("No API credentials configured; skipping account information");
        rule();
        return Ok(());
    }

    let account = manager.account_info().await?;
    println!(
        "\n  Can Trade:     {}",
        if account.can_trade { "Yes" } else { "No" }
    );
    println!("  Account Type:  {}", account.account_type);
    println!("  Balances:");

    let mut shown = 0;
    for balance in account.non_zero_balances() {
        println!(
            "    {:<8} {} (free) / {} (locked)",
            balance.asset, balance.free, balance.locked
        );
        shown += 1;
    }
    if shown == 0 {
        println!("    (none)");
    }
    rule();

    Ok(())
}
