// Buy strategies: where the baseline for a drop comes from
pub mod anchored;
pub mod range_midpoint;
pub mod signals;

use crate::api::MarketGateway;
use crate::models::PriceAnchor;
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

pub use anchored::AnchoredDrop;
pub use range_midpoint::RangeMidpoint;

/// A percentage-drop buy rule
///
/// Both rules share the anchor's cooldown gate; they differ only in the
/// baseline and the threshold.
#[async_trait]
pub trait BuyStrategy: Send + Sync {
    /// Strategy name (for logs and notifications)
    fn name(&self) -> &'static str;

    /// Negative relative change the price must fall strictly below
    fn drop_threshold(&self) -> f64;

    /// Price the current price is measured against
    async fn baseline(&self, gateway: &dyn MarketGateway, anchor: &PriceAnchor) -> Result<Decimal>;
}
