use super::MarketGateway;
use crate::models::{
    Balance, Candle, ExchangeOrder, LimitOrderRequest, OrderScope, OrderStatus, TickerPrice,
};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Simulated order ids start far away from real exchange ids
const SIMULATED_ORDER_ID_START: i64 = 9_000_000_000_000;

/// Gateway wrapper that reads live market data but never trades
///
/// Order placement and cancellation are logged and answered with synthetic
/// responses. Simulated orders never show up in `list_orders`, so nothing
/// reaches the ledger.
pub struct DryRunGateway<G> {
    inner: G,
    next_order_id: AtomicI64,
}

impl<G: MarketGateway> DryRunGateway<G> {
    pub fn new(inner: G) -> Self {
        Self {
            inner,
            next_order_id: AtomicI64::new(SIMULATED_ORDER_ID_START),
        }
    }

    pub fn inner(&self) -> &G {
        &self.inner
    }
}

#[async_trait]
impl<G: MarketGateway> MarketGateway for DryRunGateway<G> {
    fn exchange(&self) -> &str {
        self.inner.exchange()
    }

    async fn list_prices(&self, symbols: &[String]) -> Result<Vec<TickerPrice>> {
        self.inner.list_prices(symbols).await
    }

    async fn get_account(&self) -> Result<Vec<Balance>> {
        self.inner.get_account().await
    }

    async fn list_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        self.inner.list_candles(symbol, interval, limit).await
    }

    async fn list_orders(&self, scope: OrderScope<'_>) -> Result<Vec<ExchangeOrder>> {
        self.inner.list_orders(scope).await
    }

    async fn place_limit_order(&self, request: &LimitOrderRequest) -> Result<ExchangeOrder> {
        let order_id = self.next_order_id.fetch_add(1, Ordering::Relaxed);

        tracing::info!(
            "[DRY RUN] Would place {} {} {} @ {} (simulated id {})",
            request.side,
            request.quantity,
            request.symbol,
            request.price,
            order_id
        );

        Ok(ExchangeOrder {
            order_id,
            symbol: request.symbol.clone(),
            side: request.side,
            status: OrderStatus::New,
            price: request.price.clone(),
            orig_qty: request.quantity.clone(),
            executed_qty: "0".to_string(),
            time_ms: Utc::now().timestamp_millis(),
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()> {
        tracing::info!("[DRY RUN] Would cancel order {} on {}", order_id, symbol);
        Ok(())
    }
}
