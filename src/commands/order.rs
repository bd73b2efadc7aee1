//! Order command - validate and place a MARKET or LIMIT order

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use testnet_trader::orders::validate_order;
use testnet_trader::types::{OrderType, Side, TimeInForce};
use testnet_trader::{Config, OrderManager, OrderRequest};
use tracing::info;

use super::{banner, rule};

#[derive(Debug, Clone)]
pub struct OrderArgs {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub dry_run: bool,
}

impl OrderArgs {
    fn to_request(&self) -> Result<OrderRequest> {
        Ok(match self.order_type {
            OrderType::Market => OrderRequest::market(&self.symbol, self.side, self.quantity),
            OrderType::Limit => {
                let price = self
                    .price
                    .context("--price is required for LIMIT orders")?;
                OrderRequest::limit(&self.symbol, self.side, self.quantity, price)
                    .with_time_in_force(self.time_in_force)
            }
        })
    }
}

pub fn run(config: &Config, args: OrderArgs) -> Result<()> {
    let order = args.to_request()?;
    let manager = OrderManager::from_config(config)?;

    let rt = tokio::runtime::Runtime::new()?;

    if args.dry_run {
        let reference_price = match order.wire_price() {
            Some(price) => price,
            None => rt.block_on(manager.current_price(&order.symbol))?,
        };
        validate_order(&order, reference_price, manager.min_order_size())?;

        banner("DRY RUN - ORDER NOT SENT");
        println!("  Query:      {}", order.to_query());
        println!("  Reference:  {}", reference_price);
        println!("  Notional:   {}", order.notional(reference_price));
        rule();
        return Ok(());
    }

    // fail before any network call when credentials are missing
    config.credentials()?;

    info!(
        "Submitting {} {} {} {} to {}",
        order.order_type,
        order.side,
        order.quantity,
        order.symbol,
        manager.client().base_url()
    );
    let response = rt.block_on(manager.place(&order))?;

    banner("ORDER PLACED");
    println!("  Symbol:     {}", response.symbol);
    println!("  Order ID:   {}", response.order_id);
    println!("  Status:     {}", response.status);
    println!("  Side/Type:  {} {}", response.side, response.order_type);
    println!("  Orig Qty:   {}", response.orig_qty);
    println!("  Executed:   {}", response.executed_qty);
    println!("  Quote Qty:  {}", response.cumulative_quote_qty);
    for fill in &response.fills {
        println!(
            "  Fill:       {} @ {} (fee {} {})",
            fill.qty, fill.price, fill.commission, fill.commission_asset
        );
    }
    rule();

    Ok(())
}
