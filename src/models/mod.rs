use serde::{Deserialize, Serialize};
use std::fmt;

/// Reference price a future drop is measured against, one per (symbol, exchange)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PriceAnchor {
    pub symbol: String,
    pub exchange: String,
    pub anchor_price: String, // Exchange-native decimal string
    pub last_transaction_time: i64, // Unix seconds of the last buy that consumed this anchor
}

/// Side of a trade as recorded in the ledger
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "buy",
            OrderSide::Sell => "sell",
        }
    }

    /// Wire format used by the exchange (`BUY` / `SELL`)
    pub fn as_exchange_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    /// Parse either the ledger (`buy`) or exchange (`BUY`) spelling
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "buy" => Some(OrderSide::Buy),
            "sell" => Some(OrderSide::Sell),
            _ => None,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ledger entry for a filled (or partially filled) exchange order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub order_id: i64,
    pub symbol: String,
    pub price: String,
    pub quantity: String,
    pub exchange: String,
    pub side: OrderSide,
    pub resolved: bool, // true once the matching sell has been placed
}

/// Exchange-side order status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    New,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    Other(String),
}

impl OrderStatus {
    pub fn parse(s: &str) -> Self {
        match s {
            "NEW" => OrderStatus::New,
            "PARTIALLY_FILLED" => OrderStatus::PartiallyFilled,
            "FILLED" => OrderStatus::Filled,
            "CANCELED" => OrderStatus::Canceled,
            "REJECTED" => OrderStatus::Rejected,
            "EXPIRED" => OrderStatus::Expired,
            other => OrderStatus::Other(other.to_string()),
        }
    }

    /// Orders that carry executed quantity worth recording in the ledger
    pub fn is_fill(&self) -> bool {
        matches!(self, OrderStatus::Filled | OrderStatus::PartiallyFilled)
    }

    /// Orders still resting on the book
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::New | OrderStatus::PartiallyFilled)
    }
}

/// An order as reported by the exchange
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeOrder {
    pub order_id: i64,
    pub symbol: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub price: String,
    pub orig_qty: String,
    pub executed_qty: String,
    pub time_ms: i64, // Creation time, unix milliseconds
}

/// Current spot price for a symbol
#[derive(Debug, Clone, PartialEq)]
pub struct TickerPrice {
    pub symbol: String,
    pub price: String,
}

/// Free/locked amounts of one asset in the account
#[derive(Debug, Clone, PartialEq)]
pub struct Balance {
    pub asset: String,
    pub free: String,
    pub locked: String,
}

/// OHLCV candle with exchange-native decimal strings
#[derive(Debug, Clone, PartialEq)]
pub struct Candle {
    pub open_time_ms: i64,
    pub open: String,
    pub high: String,
    pub low: String,
    pub close: String,
    pub volume: String,
}

/// Parameters of a GTC limit order
#[derive(Debug, Clone, PartialEq)]
pub struct LimitOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: String,
    pub price: String,
}

/// Which orders to list from the exchange
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderScope<'a> {
    /// Full order history for one symbol
    Symbol(&'a str),
    /// Every currently open order on the account
    AllOpen,
}
