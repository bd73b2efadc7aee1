//! Order requests, validation and placement
//!
//! Orders are checked locally before anything is signed: symbol format,
//! positive quantity, a price for LIMIT orders, and a minimum notional value
//! measured against a reference price (the limit price, or the last traded
//! price for MARKET orders).

use anyhow::Context;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;
use tracing::{info, warn};

use crate::auth::QueryString;
use crate::binance::{AccountInfo, BinanceClient, BinanceError, OrderResponse};
use crate::config::Config;
use crate::types::{OrderType, Side, TimeInForce};

/// Decimal places sent for quantities
pub const QUANTITY_DECIMALS: u32 = 8;

/// Decimal places sent for prices
pub const PRICE_DECIMALS: u32 = 2;

#[derive(Debug, Error)]
pub enum OrderError {
    #[error("invalid symbol '{0}': expected letters and digits only, e.g. BTCUSDT")]
    InvalidSymbol(String),

    #[error("quantity must be positive, got {0}")]
    NonPositiveQuantity(Decimal),

    #[error("limit orders need a positive price")]
    MissingPrice,

    #[error("order size too small: notional {notional} is below the minimum of {minimum}")]
    BelowMinimum { notional: Decimal, minimum: Decimal },

    #[error("no market price available for {0}")]
    NoPrice(String),

    #[error(transparent)]
    Api(#[from] BinanceError),
}

/// Parameters of `POST /api/v3/order`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: Decimal,
    pub price: Option<Decimal>,
    pub time_in_force: Option<TimeInForce>,
}

impl OrderRequest {
    pub fn market(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            side,
            order_type: OrderType::Market,
            quantity,
            price: None,
            time_in_force: None,
        }
    }

    /// Limit order, good till cancelled
    pub fn limit(symbol: impl Into<String>, side: Side, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into().to_uppercase(),
            side,
            order_type: OrderType::Limit,
            quantity,
            price: Some(price),
            time_in_force: Some(TimeInForce::Gtc),
        }
    }

    pub fn with_time_in_force(mut self, tif: TimeInForce) -> Self {
        self.time_in_force = Some(tif);
        self
    }

    /// Query parameters in wire order: symbol, side, type, [timeInForce], quantity, [price]
    pub fn to_query(&self) -> QueryString {
        let mut query = QueryString::new();
        query
            .push("symbol", &self.symbol)
            .push("side", self.side)
            .push("type", self.order_type);

        if self.order_type == OrderType::Limit {
            query.push("timeInForce", self.time_in_force.unwrap_or_default().as_str());
        }

        query.push("quantity", format_quantity(self.quantity));
        query.push_opt("price", self.price.map(format_price));
        query
    }

    /// Quantity as sent, truncated to [`QUANTITY_DECIMALS`]
    pub fn wire_quantity(&self) -> Decimal {
        round_quantity(self.quantity)
    }

    /// Price as sent, rounded to [`PRICE_DECIMALS`]
    pub fn wire_price(&self) -> Option<Decimal> {
        self.price.map(round_price)
    }

    /// Notional value of the quantity as sent, at the given price
    pub fn notional(&self, reference_price: Decimal) -> Decimal {
        self.wire_quantity() * reference_price
    }
}

fn round_quantity(quantity: Decimal) -> Decimal {
    quantity.round_dp_with_strategy(QUANTITY_DECIMALS, RoundingStrategy::ToZero)
}

fn round_price(price: Decimal) -> Decimal {
    price.round_dp_with_strategy(PRICE_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

/// Truncate to [`QUANTITY_DECIMALS`] and drop trailing zeros
pub fn format_quantity(quantity: Decimal) -> String {
    round_quantity(quantity).normalize().to_string()
}

/// Round to [`PRICE_DECIMALS`] and drop trailing zeros
pub fn format_price(price: Decimal) -> String {
    round_price(price).normalize().to_string()
}

/// Check an order before it is signed
///
/// Quantity, price and notional are checked after rounding, as they go on
/// the wire. A LIMIT order is measured against its own rounded price.
pub fn validate_order(
    order: &OrderRequest,
    reference_price: Decimal,
    min_notional: Decimal,
) -> Result<(), OrderError> {
    if order.symbol.is_empty() || !order.symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(OrderError::InvalidSymbol(order.symbol.clone()));
    }

    let quantity = order.wire_quantity();
    if quantity <= Decimal::ZERO {
        return Err(OrderError::NonPositiveQuantity(quantity));
    }

    let reference_price = match (order.order_type, order.wire_price()) {
        (OrderType::Limit, Some(price)) if price > Decimal::ZERO => price,
        (OrderType::Limit, _) => return Err(OrderError::MissingPrice),
        (OrderType::Market, _) => reference_price,
    };

    let notional = order.notional(reference_price);
    if notional < min_notional {
        return Err(OrderError::BelowMinimum {
            notional,
            minimum: min_notional,
        });
    }

    Ok(())
}

/// Validates and places orders through a [`BinanceClient`]
#[derive(Debug, Clone)]
pub struct OrderManager {
    client: BinanceClient,
    min_order_size: Decimal,
}

impl OrderManager {
    pub fn new(client: BinanceClient, min_order_size: Decimal) -> Self {
        Self {
            client,
            min_order_size,
        }
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let client = BinanceClient::from_config(config).context("Failed to create HTTP client")?;
        let min_order_size = Decimal::try_from(config.settings.min_order_size)
            .context("min_order_size is not a valid decimal")?;
        Ok(Self::new(client, min_order_size))
    }

    pub fn client(&self) -> &BinanceClient {
        &self.client
    }

    pub fn min_order_size(&self) -> Decimal {
        self.min_order_size
    }

    /// Last traded price for a symbol
    pub async fn current_price(&self, symbol: &str) -> Result<Decimal, OrderError> {
        let ticker = self.client.get_ticker_price(symbol).await?;
        if ticker.price <= Decimal::ZERO {
            return Err(OrderError::NoPrice(symbol.to_string()));
        }
        Ok(ticker.price)
    }

    pub async fn account_info(&self) -> Result<AccountInfo, OrderError> {
        Ok(self.client.get_account().await?)
    }

    pub async fn place_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
    ) -> Result<OrderResponse, OrderError> {
        self.place(&OrderRequest::market(symbol, side, quantity))
            .await
    }

    pub async fn place_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: Decimal,
        price: Decimal,
    ) -> Result<OrderResponse, OrderError> {
        self.place(&OrderRequest::limit(symbol, side, quantity, price))
            .await
    }

    /// Validate against the limit price (or the current price) and submit
    pub async fn place(&self, order: &OrderRequest) -> Result<OrderResponse, OrderError> {
        let reference_price = match (order.order_type, order.price) {
            (OrderType::Limit, Some(price)) => price,
            (OrderType::Limit, None) => return Err(OrderError::MissingPrice),
            (OrderType::Market, _) => self.current_price(&order.symbol).await?,
        };

        if let Err(e) = validate_order(order, reference_price, self.min_order_size) {
            warn!("Order rejected locally: {}", e);
            return Err(e);
        }

        let response = self.client.place_order(order).await?;
        info!(
            "Order {} accepted: status={} executed={}",
            response.order_id, response.status, response.executed_qty
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_market_query_matches_signing_demo() {
        let order = OrderRequest::market("btcusdt", Side::Buy, dec!(0.001));
        assert_eq!(
            order.to_query().encode(),
            "symbol=BTCUSDT&side=BUY&type=MARKET&quantity=0.001"
        );
    }

    #[test]
    fn test_limit_query_order() {
        let order = OrderRequest::limit("ETHUSDT", Side::Sell, dec!(0.5), dec!(2500.125));
        assert_eq!(
            order.to_query().encode(),
            "symbol=ETHUSDT&side=SELL&type=LIMIT&timeInForce=GTC&quantity=0.5&price=2500.13"
        );
    }

    #[test]
    fn test_limit_with_custom_time_in_force() {
        let order = OrderRequest::limit("ETHUSDT", Side::Buy, dec!(1), dec!(100))
            .with_time_in_force(TimeInForce::Ioc);
        assert_eq!(order.to_query().get("timeInForce"), Some("IOC"));
        assert_eq!(order.to_query().get("price"), Some("100"));
    }

    #[test]
    fn test_quantity_formatting_truncates() {
        assert_eq!(format_quantity(dec!(0.123456789)), "0.12345678");
        assert_eq!(format_quantity(dec!(1.50000000)), "1.5");
        assert_eq!(format_quantity(dec!(2)), "2");
    }

    #[test]
    fn test_price_formatting_rounds() {
        assert_eq!(format_price(dec!(42000.005)), "42000.01");
        assert_eq!(format_price(dec!(42000.10)), "42000.1");
    }

    #[test]
    fn test_validate_minimum_notional() {
        let order = OrderRequest::market("BTCUSDT", Side::Buy, dec!(0.0001));

        let err = validate_order(&order, dec!(40000), dec!(10)).unwrap_err();
        assert!(matches!(err, OrderError::BelowMinimum { .. }));
        assert!(err.to_string().contains("too small"));

        assert!(validate_order(&order, dec!(100000), dec!(10)).is_ok());
    }

    #[test]
    fn test_validate_checks_rounded_values() {
        // 0.004 rounds to a zero price
        let tiny_price = OrderRequest::limit("BTCUSDT", Side::Buy, dec!(5000), dec!(0.004));
        assert!(matches!(
            validate_order(&tiny_price, dec!(0.004), dec!(10)),
            Err(OrderError::MissingPrice)
        ));
        assert_eq!(tiny_price.wire_price(), Some(dec!(0)));

        let dust = OrderRequest::market("BTCUSDT", Side::Buy, dec!(0.000000001));
        assert!(matches!(
            validate_order(&dust, dec!(1000000000000), dec!(0)),
            Err(OrderError::NonPositiveQuantity(_))
        ));

        // 9.99995 as given, 9.9995 once truncated to 0.00019999
        let truncated = OrderRequest::market("BTCUSDT", Side::Buy, dec!(0.000199999));
        assert!(matches!(
            validate_order(&truncated, dec!(50000), dec!(9.9999)),
            Err(OrderError::BelowMinimum { .. })
        ));
    }

    #[test]
    fn test_validate_limit_uses_its_own_price() {
        let order = OrderRequest::limit("BTCUSDT", Side::Buy, dec!(0.001), dec!(9999.996));
        // rounds to 10000.00, notional 10
        assert!(validate_order(&order, dec!(1), dec!(10)).is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_input() {
        let bad_symbol = OrderRequest::market("BTC/USDT", Side::Buy, dec!(1));
        assert!(matches!(
            validate_order(&bad_symbol, dec!(1), dec!(0)),
            Err(OrderError::InvalidSymbol(_))
        ));

        let zero_qty = OrderRequest::market("BTCUSDT", Side::Buy, dec!(0));
        assert!(matches!(
            validate_order(&zero_qty, dec!(1), dec!(0)),
            Err(OrderError::NonPositiveQuantity(_))
        ));

        let mut no_price = OrderRequest::limit("BTCUSDT", Side::Buy, dec!(1), dec!(1));
        no_price.price = None;
        assert!(matches!(
            validate_order(&no_price, dec!(1), dec!(0)),
            Err(OrderError::MissingPrice)
        ));
    }

    #[test]
    fn test_manager_from_config() {
        let mut config = Config::default();
        config.settings.min_order_size = 12.5;

        let manager = OrderManager::from_config(&config).unwrap();
        assert_eq!(manager.min_order_size(), dec!(12.5));
        assert!(!manager.client().has_credentials());
    }
}
