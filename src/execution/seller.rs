use super::{PeriodicTask, TradingContext};
use crate::models::{LimitOrderRequest, Order, OrderSide};
use crate::notify::TradeEvent;
use crate::persistence::OrderFilter;
use crate::strategy::signals::{is_profit_triggered, parse_positive, ratio, relative_change};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SellTickSummary {
    pub evaluated: usize,
    pub sold: usize,
    pub failed: usize,
}

/// Places the profit-taking sell for each unresolved buy in the ledger
pub struct SellEvaluator {
    ctx: TradingContext,
}

impl SellEvaluator {
    pub fn new(ctx: TradingContext) -> Self {
        Self { ctx }
    }

    /// Check every unresolved buy against the current price
    ///
    /// With nothing to sell the exchange is not queried at all.
    pub async fn tick(&self) -> Result<SellTickSummary> {
        let orders = self
            .ctx
            .store
            .find_orders(&OrderFilter::unresolved_buys(self.ctx.exchange()))
            .await?;

        let mut summary = SellTickSummary::default();
        if orders.is_empty() {
            return Ok(summary);
        }

        let prices = self.ctx.gateway.list_prices(self.ctx.symbols()).await?;
        let price_by_symbol: HashMap<&str, &str> = prices
            .iter()
            .map(|p| (p.symbol.as_str(), p.price.as_str()))
            .collect();

        for order in &orders {
            summary.evaluated += 1;
            match self.evaluate(order, &price_by_symbol).await {
                Ok(true) => summary.sold += 1,
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!("Skipping order {} ({}): {}", order.order_id, order.symbol, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Returns whether a sell was placed
    async fn evaluate(&self, order: &Order, prices: &HashMap<&str, &str>) -> Result<bool> {
        let Some(&raw_price) = prices.get(order.symbol.as_str()) else {
            // Orders on symbols outside the configured set have no price here
            tracing::debug!("No current price for {}", order.symbol);
            return Ok(false);
        };

        let current = parse_positive("current price", raw_price)?;
        let bought = parse_positive("order price", &order.price)?;
        let change = relative_change(current, bought);

        let threshold = ratio("profit threshold", self.ctx.settings.seller.profit_threshold)?;

        if !is_profit_triggered(change, threshold) {
            return Ok(false);
        }

        let request = LimitOrderRequest {
            symbol: order.symbol.clone(),
            side: OrderSide::Sell,
            quantity: order.quantity.clone(),
            price: raw_price.to_string(),
        };
        let placed = self.ctx.gateway.place_limit_order(&request).await?;

        tracing::info!(
            "🔴 SELL {} {} @ {} (+{:.2}% vs {}) for order {}",
            request.quantity,
            request.symbol,
            request.price,
            change * Decimal::ONE_HUNDRED,
            order.price,
            order.order_id
        );

        if let Err(e) = self
            .ctx
            .store
            .mark_order_resolved(order.order_id, &order.exchange)
            .await
        {
            tracing::error!(
                "Sell {} placed but order {} not marked resolved: {}",
                placed.order_id,
                order.order_id,
                e
            );
        }

        self.ctx.notifier.notify(&TradeEvent {
            source: "seller",
            symbol: request.symbol.clone(),
            side: OrderSide::Sell,
            quantity: request.quantity.clone(),
            price: request.price.clone(),
            order_id: placed.order_id,
        });

        Ok(true)
    }
}

#[async_trait]
impl PeriodicTask for SellEvaluator {
    fn name(&self) -> &'static str {
        "seller"
    }

    async fn run_tick(&self) {
        match self.tick().await {
            Ok(summary) if summary.sold > 0 || summary.failed > 0 => tracing::info!(
                "Seller: {} evaluated, {} sold, {} failed",
                summary.evaluated,
                summary.sold,
                summary.failed
            ),
            Ok(_) => {}
            Err(e) => tracing::error!("Seller tick failed: {}", e),
        }
    }
}
