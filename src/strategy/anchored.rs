use super::signals::parse_positive;
use super::BuyStrategy;
use crate::api::MarketGateway;
use crate::models::PriceAnchor;
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Buy when the price falls below the stored anchor price
#[derive(Debug, Clone)]
pub struct AnchoredDrop {
    drop_threshold: f64,
}

impl AnchoredDrop {
    pub fn new(drop_threshold: f64) -> Self {
        Self { drop_threshold }
    }
}

impl Default for AnchoredDrop {
    fn default() -> Self {
        Self::new(-0.03)
    }
}

#[async_trait]
impl BuyStrategy for AnchoredDrop {
    fn name(&self) -> &'static str {
        "anchored-drop"
    }

    fn drop_threshold(&self) -> f64 {
        self.drop_threshold
    }

    async fn baseline(&self, _gateway: &dyn MarketGateway, anchor: &PriceAnchor) -> Result<Decimal> {
        parse_positive("anchor price", &anchor.anchor_price)
    }
}
