// Ledger storage contract shared by every loop
pub mod memory;

use crate::models::{Order, OrderSide, PriceAnchor};
use crate::Result;
use async_trait::async_trait;

pub use memory::MemoryStore;

/// Result of an insert-if-absent write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    AlreadyExists,
}

/// Optional filters for order lookups; `None` matches anything
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OrderFilter {
    pub side: Option<OrderSide>,
    pub exchange: Option<String>,
    pub resolved: Option<bool>,
}

impl OrderFilter {
    /// Buy orders on `exchange` that have not been sold yet
    pub fn unresolved_buys(exchange: &str) -> Self {
        Self {
            side: Some(OrderSide::Buy),
            exchange: Some(exchange.to_string()),
            resolved: Some(false),
        }
    }

    pub fn matches(&self, order: &Order) -> bool {
        self.side.map_or(true, |side| order.side == side)
            && self
                .exchange
                .as_deref()
                .map_or(true, |exchange| order.exchange == exchange)
            && self.resolved.map_or(true, |resolved| order.resolved == resolved)
    }
}

/// Persistent store for price anchors and the order ledger
///
/// Implementations must give per-record atomicity; no multi-record
/// transactions are required.
#[async_trait]
pub trait Store: Send + Sync {
    /// Overwrite the anchor price, creating the anchor with
    /// `last_transaction_time = 0` when it does not exist yet
    async fn upsert_price_anchor(&self, symbol: &str, exchange: &str, price: &str) -> Result<()>;

    async fn find_price_anchor(&self, symbol: &str, exchange: &str)
        -> Result<Option<PriceAnchor>>;

    /// Record that a buy consumed the anchor; never touches `anchor_price`
    async fn update_anchor_cooldown(
        &self,
        symbol: &str,
        exchange: &str,
        timestamp: i64,
    ) -> Result<()>;

    /// Insert unless an order with the same (order_id, exchange) exists
    async fn insert_order_if_absent(&self, order: &Order) -> Result<InsertOutcome>;

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>>;

    /// Flip `resolved` to true; resolving twice is a no-op
    async fn mark_order_resolved(&self, order_id: i64, exchange: &str) -> Result<()>;
}
