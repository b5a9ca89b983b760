use super::{PeriodicTask, TradingContext};
use crate::config::ReconcileMode;
use crate::models::{ExchangeOrder, Order, OrderScope};
use crate::persistence::InsertOutcome;
use async_trait::async_trait;
use chrono::Utc;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub inserted: usize,
    pub already_recorded: usize,
    pub cancelled: usize,
    pub failures: usize,
}

/// Copies filled exchange orders into the ledger and cancels stale ones
///
/// Inserts are idempotent on (order_id, exchange), so re-reading the same
/// order history every tick is safe.
pub struct OrderReconciler {
    ctx: TradingContext,
}

impl OrderReconciler {
    pub fn new(ctx: TradingContext) -> Self {
        Self { ctx }
    }

    /// Pull orders from the exchange, record every fill and cancel stale ones
    ///
    /// Fills always come from the per-symbol order history, since the open
    /// orders endpoint never returns a FILLED order. The mode only picks where
    /// stale orders are found: the same per-symbol results, or one sweep of
    /// every open order on the account. A failed query is counted and the
    /// rest of the tick still runs.
    pub async fn tick(&self) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        let now_ms = Utc::now().timestamp_millis();
        let mode = self.ctx.settings.reconciler.mode;

        for symbol in self.ctx.symbols() {
            match self.ctx.gateway.list_orders(OrderScope::Symbol(symbol)).await {
                Ok(orders) => {
                    for order in &orders {
                        if order.status.is_fill() {
                            self.record(order, &mut summary).await;
                        }
                        if mode == ReconcileMode::PerSymbol && self.is_stale(order, now_ms) {
                            self.cancel(order, &mut summary).await;
                        }
                    }
                }
                Err(e) => {
                    tracing::warn!("Failed to list orders for {}: {}", symbol, e);
                    summary.failures += 1;
                }
            }
        }

        if mode == ReconcileMode::OpenOrders {
            self.sweep_open_orders(now_ms, &mut summary).await;
        }

        summary
    }

    async fn sweep_open_orders(&self, now_ms: i64, summary: &mut ReconcileSummary) {
        if self.ctx.settings.reconciler.stale_after().is_none() {
            return;
        }

        match self.ctx.gateway.list_orders(OrderScope::AllOpen).await {
            Ok(orders) => {
                for order in orders.iter().filter(|o| self.is_stale(o, now_ms)) {
                    self.cancel(order, summary).await;
                }
            }
            Err(e) => {
                tracing::warn!("Failed to list open orders: {}", e);
                summary.failures += 1;
            }
        }
    }

    async fn record(&self, order: &ExchangeOrder, summary: &mut ReconcileSummary) {
        // Partial fills are recorded with what has executed so far
        let entry = Order {
            order_id: order.order_id,
            symbol: order.symbol.clone(),
            price: order.price.clone(),
            quantity: order.executed_qty.clone(),
            exchange: self.ctx.exchange().to_string(),
            side: order.side,
            resolved: false,
        };

        match self.ctx.store.insert_order_if_absent(&entry).await {
            Ok(InsertOutcome::Inserted) => {
                tracing::info!(
                    "📒 Recorded {} {} {} @ {} (order {})",
                    entry.side,
                    entry.quantity,
                    entry.symbol,
                    entry.price,
                    entry.order_id
                );
                summary.inserted += 1;
            }
            Ok(InsertOutcome::AlreadyExists) => summary.already_recorded += 1,
            Err(e) => {
                tracing::warn!("Failed to record order {}: {}", entry.order_id, e);
                summary.failures += 1;
            }
        }
    }

    fn is_stale(&self, order: &ExchangeOrder, now_ms: i64) -> bool {
        let Some(stale_after) = self.ctx.settings.reconciler.stale_after() else {
            return false;
        };

        order.status.is_open() && now_ms - order.time_ms > stale_after.as_millis() as i64
    }

    async fn cancel(&self, order: &ExchangeOrder, summary: &mut ReconcileSummary) {
        match self
            .ctx
            .gateway
            .cancel_order(&order.symbol, order.order_id)
            .await
        {
            Ok(()) => {
                tracing::info!(
                    "🗑️  Cancelled stale {} order {} on {}",
                    order.side,
                    order.order_id,
                    order.symbol
                );
                summary.cancelled += 1;
            }
            Err(e) => {
                tracing::warn!("Failed to cancel order {}: {}", order.order_id, e);
                summary.failures += 1;
            }
        }
    }
}

#[async_trait]
impl PeriodicTask for OrderReconciler {
    fn name(&self) -> &'static str {
        "order-reconciler"
    }

    async fn run_tick(&self) {
        let summary = self.tick().await;
        if summary.inserted > 0 || summary.cancelled > 0 || summary.failures > 0 {
            tracing::info!(
                "Reconciled: {} new, {} known, {} cancelled, {} failed",
                summary.inserted,
                summary.already_recorded,
                summary.cancelled,
                summary.failures
            );
        }
    }
}
