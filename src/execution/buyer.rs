use super::{PeriodicTask, TradingContext};
use crate::models::{ExchangeOrder, LimitOrderRequest, OrderSide, TickerPrice};
use crate::notify::TradeEvent;
use crate::strategy::signals::{
    cooldown_elapsed, format_quantity, is_drop_triggered, order_quantity, parse_amount,
    parse_positive, ratio, relative_change,
};
use crate::strategy::BuyStrategy;
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;

#[derive(Debug, Clone, PartialEq)]
pub enum BuyAction {
    Placed(ExchangeOrder),
    Skip,
}

/// What happened to one symbol in a buy tick, and why
#[derive(Debug, Clone)]
pub struct BuyDecision {
    pub action: BuyAction,
    pub reason: String,
}

impl BuyDecision {
    fn skip(reason: impl Into<String>) -> Self {
        Self {
            action: BuyAction::Skip,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Default)]
pub struct BuyTickSummary {
    pub placed: Vec<ExchangeOrder>,
    pub skipped: usize,
    pub failed: usize,
}

/// Periodic buy loop driven by a [`BuyStrategy`]
///
/// Every strategy shares the per-symbol cooldown stored on the price anchor,
/// so a buy by one strategy also holds off the others.
pub struct BuyEvaluator<S> {
    ctx: TradingContext,
    strategy: S,
}

impl<S: BuyStrategy> BuyEvaluator<S> {
    pub fn new(ctx: TradingContext, strategy: S) -> Self {
        Self { ctx, strategy }
    }

    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Evaluate every configured symbol once
    ///
    /// Balance and price fetch failures abort the tick; anything that goes
    /// wrong for one symbol is counted and the rest are still evaluated.
    pub async fn tick(&self) -> Result<BuyTickSummary> {
        let free = self.free_quote_balance().await?;
        let prices = self.ctx.gateway.list_prices(self.ctx.symbols()).await?;
        let now = Utc::now().timestamp();

        let mut summary = BuyTickSummary::default();
        for price in &prices {
            match self.evaluate(price, free, now).await {
                Ok(decision) => match decision.action {
                    BuyAction::Placed(order) => summary.placed.push(order),
                    BuyAction::Skip => {
                        tracing::debug!(
                            "{} skip {}: {}",
                            self.strategy.name(),
                            price.symbol,
                            decision.reason
                        );
                        summary.skipped += 1;
                    }
                },
                Err(e) => {
                    tracing::warn!("{} failed on {}: {}", self.strategy.name(), price.symbol, e);
                    summary.failed += 1;
                }
            }
        }

        Ok(summary)
    }

    /// Free balance of the quote asset; a missing asset counts as zero
    async fn free_quote_balance(&self) -> Result<Decimal> {
        let balances = self.ctx.gateway.get_account().await?;
        let quote = &self.ctx.settings.quote_asset;

        match balances.iter().find(|b| &b.asset == quote) {
            Some(balance) => parse_amount(&format!("{} balance", quote), &balance.free),
            None => Ok(Decimal::ZERO),
        }
    }

    async fn evaluate(&self, price: &TickerPrice, free: Decimal, now: i64) -> Result<BuyDecision> {
        let exchange = self.ctx.exchange();
        let buying = &self.ctx.settings.buying;

        let anchor = match self
            .ctx
            .store
            .find_price_anchor(&price.symbol, exchange)
            .await?
        {
            Some(anchor) => anchor,
            None => return Ok(BuyDecision::skip("no anchor yet")),
        };

        if !cooldown_elapsed(now, anchor.last_transaction_time, buying.cooldown_secs) {
            return Ok(BuyDecision::skip(format!(
                "cooling down since {}",
                anchor.last_transaction_time
            )));
        }

        let current = parse_positive("current price", &price.price)?;
        let baseline = self
            .strategy
            .baseline(self.ctx.gateway.as_ref(), &anchor)
            .await?;
        let change = relative_change(current, baseline);
        let threshold = ratio("drop threshold", self.strategy.drop_threshold())?;

        if !is_drop_triggered(change, threshold) {
            return Ok(BuyDecision::skip(format!(
                "change {:.4}% vs baseline {}",
                change * Decimal::ONE_HUNDRED,
                baseline
            )));
        }

        let split_factor = ratio("split factor", buying.split_factor)?;
        let quantity = format_quantity(
            order_quantity(free, current, split_factor),
            buying.quantity_precision,
        );
        if parse_amount("order quantity", &quantity)?.is_zero() {
            return Ok(BuyDecision::skip(format!(
                "{} balance too small ({})",
                self.ctx.settings.quote_asset, free
            )));
        }

        let request = LimitOrderRequest {
            symbol: price.symbol.clone(),
            side: OrderSide::Buy,
            quantity,
            price: price.price.clone(),
        };
        let order = self.ctx.gateway.place_limit_order(&request).await?;

        tracing::info!(
            "🟢 {} BUY {} {} @ {} ({:.2}% vs {}) order {}",
            self.strategy.name(),
            request.quantity,
            request.symbol,
            request.price,
            change * Decimal::ONE_HUNDRED,
            baseline,
            order.order_id
        );

        // The order is live; a failed cooldown write must not hide that
        if let Err(e) = self
            .ctx
            .store
            .update_anchor_cooldown(&price.symbol, exchange, now)
            .await
        {
            tracing::error!(
                "Order {} placed but cooldown for {} not recorded: {}",
                order.order_id,
                price.symbol,
                e
            );
        }

        self.ctx.notifier.notify(&TradeEvent {
            source: self.strategy.name(),
            symbol: request.symbol.clone(),
            side: OrderSide::Buy,
            quantity: request.quantity.clone(),
            price: request.price.clone(),
            order_id: order.order_id,
        });

        Ok(BuyDecision {
            action: BuyAction::Placed(order),
            reason: format!("dropped {:.2}%", change * Decimal::ONE_HUNDRED),
        })
    }
}

#[async_trait]
impl<S: BuyStrategy> PeriodicTask for BuyEvaluator<S> {
    fn name(&self) -> &'static str {
        self.strategy.name()
    }

    async fn run_tick(&self) {
        match self.tick().await {
            Ok(summary) => {
                if !summary.placed.is_empty() || summary.failed > 0 {
                    tracing::info!(
                        "{}: {} placed, {} skipped, {} failed",
                        self.strategy.name(),
                        summary.placed.len(),
                        summary.skipped,
                        summary.failed
                    );
                }
            }
            Err(e) => tracing::error!("{} tick failed: {}", self.strategy.name(), e),
        }
    }
}
