use super::signals::parse_positive;
use super::BuyStrategy;
use crate::api::MarketGateway;
use crate::models::{Candle, PriceAnchor};
use crate::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Buy when the price falls below the midpoint of the latest candle's range
///
/// The candle is fetched fresh every tick; the stored anchor is only used for
/// its cooldown timestamp.
#[derive(Debug, Clone)]
pub struct RangeMidpoint {
    drop_threshold: f64,
    candle_interval: String,
}

impl RangeMidpoint {
    pub fn new(drop_threshold: f64, candle_interval: impl Into<String>) -> Self {
        Self {
            drop_threshold,
            candle_interval: candle_interval.into(),
        }
    }

    pub fn candle_interval(&self) -> &str {
        &self.candle_interval
    }
}

impl Default for RangeMidpoint {
    fn default() -> Self {
        Self::new(-0.05, "8h")
    }
}

/// `(high + low) / 2`
pub fn candle_midpoint(candle: &Candle) -> Result<Decimal> {
    let high = parse_positive("candle high", &candle.high)?;
    let low = parse_positive("candle low", &candle.low)?;
    Ok((high + low) / Decimal::TWO)
}

#[async_trait]
impl BuyStrategy for RangeMidpoint {
    fn name(&self) -> &'static str {
        "range-midpoint"
    }

    fn drop_threshold(&self) -> f64 {
        self.drop_threshold
    }

    async fn baseline(&self, gateway: &dyn MarketGateway, anchor: &PriceAnchor) -> Result<Decimal> {
        let candles = gateway
            .list_candles(&anchor.symbol, &self.candle_interval, 1)
            .await?;

        let candle = candles.last().ok_or_else(|| {
            format!(
                "No {} candle returned for {}",
                self.candle_interval, anchor.symbol
            )
        })?;

        candle_midpoint(candle)
    }
}
