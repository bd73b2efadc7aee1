//! Binance API response types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Binance kline/candlestick data
/// API returns an array: [open_time, open, high, low, close, volume, close_time,
///                        quote_volume, trades, taker_buy_base, taker_buy_quote, ignore]
#[derive(Debug, Clone, PartialEq)]
pub struct Kline {
    pub open_time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub close_time: i64,
    pub quote_volume: f64,
    pub trades: u64,
}

impl Kline {
    /// Parse from raw JSON array returned by Binance API
    pub fn from_raw(raw: &[serde_json::Value]) -> Option<Self> {
        if raw.len() < 9 {
            return None;
        }

        Some(Kline {
            open_time: raw[0].as_i64()?,
            open: parse_f64(&raw[1])?,
            high: parse_f64(&raw[2])?,
            low: parse_f64(&raw[3])?,
            close: parse_f64(&raw[4])?,
            volume: parse_f64(&raw[5])?,
            close_time: raw[6].as_i64()?,
            quote_volume: parse_f64(&raw[7])?,
            trades: raw[8].as_u64()?,
        })
    }
}

/// Binance sends prices as strings; accept plain numbers too
fn parse_f64(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::String(s) => s.parse().ok(),
        other => other.as_f64(),
    }
}

/// `GET /api/v3/ticker/price`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: Decimal,
}

/// One asset balance in the account snapshot
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Balance {
    pub asset: String,
    pub free: Decimal,
    pub locked: Decimal,
}

impl Balance {
    pub fn total(&self) -> Decimal {
        self.free + self.locked
    }

    pub fn is_empty(&self) -> bool {
        self.total().is_zero()
    }
}

/// `GET /api/v3/account`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default)]
    pub can_trade: bool,
    #[serde(default)]
    pub can_withdraw: bool,
    #[serde(default)]
    pub can_deposit: bool,
    #[serde(default)]
    pub account_type: String,
    #[serde(default)]
    pub update_time: i64,
    #[serde(default)]
    pub balances: Vec<Balance>,
}

impl AccountInfo {
    /// Balances with a non-zero free or locked amount
    pub fn non_zero_balances(&self) -> impl Iterator<Item = &Balance> {
        self.balances.iter().filter(|b| !b.is_empty())
    }
}

/// Fill reported in a FULL order response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fill {
    pub price: Decimal,
    pub qty: Decimal,
    #[serde(default)]
    pub commission: Decimal,
    #[serde(default)]
    pub commission_asset: String,
}

/// `POST /api/v3/order`
///
/// ACK responses carry only the identifiers, so everything else defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    pub symbol: String,
    pub order_id: i64,
    #[serde(default)]
    pub client_order_id: String,
    #[serde(default)]
    pub transact_time: i64,
    #[serde(default)]
    pub price: Decimal,
    #[serde(default)]
    pub orig_qty: Decimal,
    #[serde(default)]
    pub executed_qty: Decimal,
    #[serde(default, rename = "cummulativeQuoteQty")]
    pub cumulative_quote_qty: Decimal,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub time_in_force: String,
    #[serde(default, rename = "type")]
    pub order_type: String,
    #[serde(default)]
    pub side: String,
    #[serde(default)]
    pub fills: Vec<Fill>,
}

/// `GET /api/v3/time`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    pub server_time: i64,
}

/// Error body returned with non-2xx responses
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub code: i64,
    pub msg: String,
}

/// Valid Binance intervals
pub const BINANCE_INTERVALS: &[&str] = &[
    "1s", "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "6h", "8h", "12h", "1d", "3d", "1w",
    "1M",
];

/// Check if interval is valid for Binance
pub fn is_valid_interval(interval: &str) -> bool {
    BINANCE_INTERVALS.contains(&interval)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn test_kline_from_raw() {
        let raw = json!([
            1704067200000i64,
            "42283.58000000",
            "42298.62000000",
            "42261.02000000",
            "42298.61000000",
            "35.92724000",
            1704067259999i64,
            "1519032.71",
            1327,
            "20.1",
            "850000.0",
            "0"
        ]);
        let kline = Kline::from_raw(raw.as_array().unwrap()).unwrap();

        assert_eq!(kline.open_time, 1_704_067_200_000);
        assert_eq!(kline.open, 42283.58);
        assert_eq!(kline.close, 42298.61);
        assert_eq!(kline.volume, 35.92724);
        assert_eq!(kline.trades, 1327);
    }

    #[test]
    fn test_kline_from_short_or_bad_row() {
        let short = json!([1, "1", "1"]);
        assert!(Kline::from_raw(short.as_array().unwrap()).is_none());

        let bad = json!([1, "x", "1", "1", "1", "1", 2, "1", 3]);
        assert!(Kline::from_raw(bad.as_array().unwrap()).is_none());
    }

    #[test]
    fn test_account_parsing() {
        let body = json!({
            "makerCommission": 10,
            "canTrade": true,
            "canWithdraw": false,
            "canDeposit": false,
            "accountType": "SPOT",
            "balances": [
                {"asset": "BTC", "free": "1.00000000", "locked": "0.00000000"},
                {"asset": "BNB", "free": "0.00000000", "locked": "0.00000000"},
                {"asset": "USDT", "free": "0.00000000", "locked": "25.50000000"}
            ]
        });
        let account: AccountInfo = serde_json::from_value(body).unwrap();

        assert!(account.can_trade);
        assert_eq!(account.account_type, "SPOT");
        let assets: Vec<&str> = account
            .non_zero_balances()
            .map(|b| b.asset.as_str())
            .collect();
        assert_eq!(assets, vec!["BTC", "USDT"]);
        assert_eq!(account.balances[2].total(), dec!(25.5));
    }

    #[test]
    fn test_order_ack_response() {
        let body = json!({
            "symbol": "BTCUSDT",
            "orderId": 28,
            "orderListId": -1,
            "clientOrderId": "6gCrw2kRUAF9CvJDGP16IP",
            "transactTime": 1507725176595i64
        });
        let order: OrderResponse = serde_json::from_value(body).unwrap();

        assert_eq!(order.order_id, 28);
        assert!(order.fills.is_empty());
        assert_eq!(order.executed_qty, Decimal::ZERO);
    }

    #[test]
    fn test_order_full_response() {
        let body = json!({
            "symbol": "BTCUSDT",
            "orderId": 7,
            "clientOrderId": "abc",
            "transactTime": 1,
            "price": "0.00000000",
            "origQty": "0.00100000",
            "executedQty": "0.00100000",
            "cummulativeQuoteQty": "42.10000000",
            "status": "FILLED",
            "timeInForce": "GTC",
            "type": "MARKET",
            "side": "BUY",
            "fills": [{"price": "42100.00", "qty": "0.001", "commission": "0", "commissionAsset": "BTC"}]
        });
        let order: OrderResponse = serde_json::from_value(body).unwrap();

        assert_eq!(order.status, "FILLED");
        assert_eq!(order.order_type, "MARKET");
        assert_eq!(order.cumulative_quote_qty, dec!(42.1));
        assert_eq!(order.fills[0].price, dec!(42100));
    }

    #[test]
    fn test_valid_intervals() {
        assert!(is_valid_interval("1m"));
        assert!(is_valid_interval("4h"));
        assert!(is_valid_interval("1M"));
        assert!(!is_valid_interval("2d"));
    }
}
