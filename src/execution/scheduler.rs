use async_trait::async_trait;
use std::sync::Arc;
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

/// One unit of periodic work
#[async_trait]
pub trait PeriodicTask: Send + Sync {
    fn name(&self) -> &'static str;

    /// Run one tick; failures are logged inside, never propagated
    async fn run_tick(&self);
}

/// When the first tick fires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FirstTick {
    Immediate,
    AfterPeriod,
}

/// Drive `task` forever on a fixed period
///
/// The tick body is awaited before the next tick is taken, so ticks of the
/// same task never overlap; ticks missed while a slow tick runs are skipped.
pub async fn run_every(task: Arc<dyn PeriodicTask>, period: Duration, first: FirstTick) {
    let start = match first {
        FirstTick::Immediate => Instant::now(),
        FirstTick::AfterPeriod => Instant::now() + period,
    };

    let mut ticker = interval_at(start, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tracing::info!("🔄 {} loop starting (every {:?})", task.name(), period);

    loop {
        ticker.tick().await;
        task.run_tick().await;
    }
}
