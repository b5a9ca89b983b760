// Best-effort trade notifications
pub mod telegram;

use crate::models::OrderSide;
use std::fmt;

pub use telegram::TelegramNotifier;

/// A placed order worth telling a human about
#[derive(Debug, Clone, PartialEq)]
pub struct TradeEvent {
    pub source: &'static str,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: String,
    pub price: String,
    pub order_id: i64,
}

impl fmt::Display for TradeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {} {} @ {} (order {})",
            self.source,
            self.side.as_exchange_str(),
            self.quantity,
            self.symbol,
            self.price,
            self.order_id
        )
    }
}

/// Fire-and-forget sink for trade events
///
/// `notify` must return immediately and must never fail the caller.
pub trait Notifier: Send + Sync {
    fn notify(&self, event: &TradeEvent);
}

/// Notifier that only writes the event to the log
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, event: &TradeEvent) {
        tracing::info!("📣 {}", event);
    }
}
