use super::{PeriodicTask, TradingContext};
use crate::Result;
use async_trait::async_trait;

/// Refreshes the stored anchor price of every configured symbol
pub struct AnchorKeeper {
    ctx: TradingContext,
}

impl AnchorKeeper {
    pub fn new(ctx: TradingContext) -> Self {
        Self { ctx }
    }

    /// Fetch current prices and overwrite each symbol's anchor
    ///
    /// A failed price fetch aborts the tick; a failed write only skips that
    /// symbol. Returns the number of anchors written.
    pub async fn tick(&self) -> Result<usize> {
        let prices = self.ctx.gateway.list_prices(self.ctx.symbols()).await?;

        let mut written = 0;
        for price in &prices {
            match self
                .ctx
                .store
                .upsert_price_anchor(&price.symbol, self.ctx.exchange(), &price.price)
                .await
            {
                Ok(()) => {
                    tracing::debug!("Anchor {} = {}", price.symbol, price.price);
                    written += 1;
                }
                Err(e) => {
                    tracing::warn!("Failed to store anchor for {}: {}", price.symbol, e);
                }
            }
        }

        Ok(written)
    }
}

#[async_trait]
impl PeriodicTask for AnchorKeeper {
    fn name(&self) -> &'static str {
        "anchor-keeper"
    }

    async fn run_tick(&self) {
        match self.tick().await {
            Ok(written) => tracing::info!("⚓ Refreshed {} price anchor(s)", written),
            Err(e) => tracing::error!("Anchor refresh failed: {}", e),
        }
    }
}
