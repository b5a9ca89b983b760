use super::{InsertOutcome, OrderFilter, Store};
use crate::models::{Order, PriceAnchor};
use crate::Result;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;

/// In-process store keyed exactly like the database tables
///
/// Used by tests and for running the engine without Postgres. Orders are
/// kept in insertion order so lookups are deterministic.
#[derive(Default)]
pub struct MemoryStore {
    anchors: RwLock<HashMap<(String, String), PriceAnchor>>,
    orders: RwLock<BTreeMap<u64, Order>>,
    order_index: RwLock<HashMap<(i64, String), u64>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn anchor_count(&self) -> usize {
        self.anchors.read().map(|a| a.len()).unwrap_or(0)
    }

    pub fn order_count(&self) -> usize {
        self.orders.read().map(|o| o.len()).unwrap_or(0)
    }
}

fn poisoned<T>(_: T) -> Box<dyn std::error::Error + Send + Sync> {
    "memory store lock poisoned".into()
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_price_anchor(&self, symbol: &str, exchange: &str, price: &str) -> Result<()> {
        let mut anchors = self.anchors.write().map_err(poisoned)?;
        anchors
            .entry((symbol.to_string(), exchange.to_string()))
            .and_modify(|anchor| anchor.anchor_price = price.to_string())
            .or_insert_with(|| PriceAnchor {
                symbol: symbol.to_string(),
                exchange: exchange.to_string(),
                anchor_price: price.to_string(),
                last_transaction_time: 0,
            });
        Ok(())
    }

    async fn find_price_anchor(
        &self,
        symbol: &str,
        exchange: &str,
    ) -> Result<Option<PriceAnchor>> {
        let anchors = self.anchors.read().map_err(poisoned)?;
        Ok(anchors
            .get(&(symbol.to_string(), exchange.to_string()))
            .cloned())
    }

    async fn update_anchor_cooldown(
        &self,
        symbol: &str,
        exchange: &str,
        timestamp: i64,
    ) -> Result<()> {
        let mut anchors = self.anchors.write().map_err(poisoned)?;
        if let Some(anchor) = anchors.get_mut(&(symbol.to_string(), exchange.to_string())) {
            anchor.last_transaction_time = timestamp;
        }
        Ok(())
    }

    async fn insert_order_if_absent(&self, order: &Order) -> Result<InsertOutcome> {
        let mut index = self.order_index.write().map_err(poisoned)?;
        let key = (order.order_id, order.exchange.clone());
        if index.contains_key(&key) {
            return Ok(InsertOutcome::AlreadyExists);
        }

        let mut orders = self.orders.write().map_err(poisoned)?;
        let seq = orders.len() as u64;
        orders.insert(seq, order.clone());
        index.insert(key, seq);

        Ok(InsertOutcome::Inserted)
    }

    async fn find_orders(&self, filter: &OrderFilter) -> Result<Vec<Order>> {
        let orders = self.orders.read().map_err(poisoned)?;
        Ok(orders
            .values()
            .filter(|order| filter.matches(order))
            .cloned()
            .collect())
    }

    async fn mark_order_resolved(&self, order_id: i64, exchange: &str) -> Result<()> {
        let index = self.order_index.read().map_err(poisoned)?;
        let Some(seq) = index.get(&(order_id, exchange.to_string())) else {
            return Ok(());
        };

        let mut orders = self.orders.write().map_err(poisoned)?;
        if let Some(order) = orders.get_mut(seq) {
            order.resolved = true;
        }
        Ok(())
    }
}
