pub mod binance;
pub mod dry_run;
pub mod error;

use crate::models::{Balance, Candle, ExchangeOrder, LimitOrderRequest, OrderScope, TickerPrice};
use crate::Result;
use async_trait::async_trait;

pub use binance::BinanceClient;
pub use dry_run::DryRunGateway;
pub use error::ExchangeError;

/// Everything the engine needs from an exchange
///
/// Prices and quantities stay decimal strings on this boundary; callers parse
/// them only for comparisons.
#[async_trait]
pub trait MarketGateway: Send + Sync {
    /// Exchange identifier stored alongside anchors and orders
    fn exchange(&self) -> &str;

    async fn list_prices(&self, symbols: &[String]) -> Result<Vec<TickerPrice>>;

    async fn get_account(&self) -> Result<Vec<Balance>>;

    /// Most recent `limit` candles of the given interval (e.g. "8h"), oldest first
    async fn list_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>>;

    async fn list_orders(&self, scope: OrderScope<'_>) -> Result<Vec<ExchangeOrder>>;

    async fn place_limit_order(&self, request: &LimitOrderRequest) -> Result<ExchangeOrder>;

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()>;
}
