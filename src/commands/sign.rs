//! Sign command - build and sign an order query string without sending it

use anyhow::{Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use testnet_trader::auth::signed_query;
use testnet_trader::types::{OrderType, Side};
use testnet_trader::{Config, OrderRequest};
use tracing::info;

use super::{banner, rule};

pub fn run(
    config: &Config,
    symbol: &str,
    side: Side,
    order_type: OrderType,
    quantity: Decimal,
    price: Option<Decimal>,
    timestamp: Option<i64>,
) -> Result<()> {
    let credentials = config.credentials()?;

    let order = match order_type {
        OrderType::Market => OrderRequest::market(symbol, side, quantity),
        OrderType::Limit => {
            let price = price.context("--price is required for LIMIT orders")?;
            OrderRequest::limit(symbol, side, quantity, price)
        }
    };

    let timestamp = timestamp.unwrap_or_else(|| Utc::now().timestamp_millis());
    let query = signed_query(&order.to_query(), credentials.api_secret(), timestamp);
    let (payload, signature) = query
        .rsplit_once("&signature=")
        .context("Signed query has no signature")?;

    info!("Signed {} {} order for {}", order_type, side, order.symbol);

    banner("SIGNED ORDER REQUEST");
    println!("  Payload:    {}", payload);
    println!("  Signature:  {}", signature);
    println!("  Header:     X-MBX-APIKEY: {}", mask(credentials.api_key()));
    println!(
        "  Request:    POST {}/api/v3/order?{}",
        config.settings.base_url.trim_end_matches('/'),
        query
    );
    rule();

    Ok(())
}

/// First four characters, the rest starred out
fn mask(key: &str) -> String {
    let shown: String = key.chars().take(4).collect();
    format!("{}{}", shown, "*".repeat(key.chars().count().saturating_sub(4)))
}
