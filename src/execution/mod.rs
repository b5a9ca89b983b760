// Periodic trading loops and the shared context they run against
pub mod anchor_keeper;
pub mod buyer;
pub mod reconciler;
pub mod scheduler;
pub mod seller;

use crate::api::MarketGateway;
use crate::config::Settings;
use crate::notify::Notifier;
use crate::persistence::Store;
use std::sync::Arc;

pub use anchor_keeper::AnchorKeeper;
pub use buyer::{BuyAction, BuyDecision, BuyEvaluator, BuyTickSummary};
pub use reconciler::{OrderReconciler, ReconcileSummary};
pub use scheduler::{run_every, FirstTick, PeriodicTask};
pub use seller::{SellEvaluator, SellTickSummary};

/// Handles shared by every loop
///
/// Loops coordinate only through the store; nothing here is mutable.
#[derive(Clone)]
pub struct TradingContext {
    pub gateway: Arc<dyn MarketGateway>,
    pub store: Arc<dyn Store>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Arc<Settings>,
}

impl TradingContext {
    pub fn new(
        gateway: Arc<dyn MarketGateway>,
        store: Arc<dyn Store>,
        notifier: Arc<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            gateway,
            store,
            notifier,
            settings: Arc::new(settings),
        }
    }

    /// Exchange id written to every anchor and ledger row
    pub fn exchange(&self) -> &str {
        &self.settings.exchange
    }

    pub fn symbols(&self) -> &[String] {
        &self.settings.symbols
    }
}
