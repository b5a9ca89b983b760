use autotrader::api::{BinanceClient, DryRunGateway, MarketGateway};
use autotrader::config::{Settings, DEFAULT_CONFIG_PATH};
use autotrader::db::PostgresStore;
use autotrader::execution::{
    run_every, AnchorKeeper, BuyEvaluator, FirstTick, OrderReconciler, PeriodicTask,
    SellEvaluator, TradingContext,
};
use autotrader::notify::{LogNotifier, Notifier, TelegramNotifier};
use autotrader::strategy::{AnchoredDrop, RangeMidpoint};
use autotrader::Result;
use clap::Parser;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Duration;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "autotrader")]
#[command(about = "Spot auto-trader: buys on drops, sells on fixed profit")]
struct Args {
    /// Path to configuration file (TOML)
    #[arg(long, short, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Read live market data but never place or cancel orders
    #[arg(long)]
    dry_run: bool,

    /// Log filter, e.g. "autotrader=debug" (RUST_LOG wins when set)
    #[arg(long)]
    log_filter: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();

    let mut overrides = Vec::new();
    if args.dry_run {
        overrides.push(("dry_run", "true".to_string()));
    }
    if let Some(filter) = &args.log_filter {
        overrides.push(("log_filter", filter.clone()));
    }

    let settings = Settings::load_with_overrides(&args.config, &overrides)
        .map_err(|e| format!("{:#}", e))?;
    setup_logging(&settings.log_filter);

    tracing::info!("🚀 Autotrader starting - Multi-Loop Architecture");
    if settings.dry_run {
        tracing::warn!("🧪 DRY RUN: orders are logged, never sent");
    }

    // The ledger is the only shared state; running without it is not an option
    let store = PostgresStore::connect(&settings.database)
        .await
        .map_err(|e| format!("Failed to connect to Postgres: {}", e))?;
    tracing::info!("✅ Postgres ledger ready");

    let gateway = build_gateway(&settings)?;
    let notifier = build_notifier(&settings)?;

    log_configuration(&settings, gateway.exchange());

    let ctx = TradingContext::new(gateway, Arc::new(store), notifier, settings);
    let settings = ctx.settings.clone();

    tracing::info!("\n🔄 Spawning independent loops...");

    let mut tasks = JoinSet::new();

    spawn_loop(
        &mut tasks,
        Arc::new(AnchorKeeper::new(ctx.clone())),
        settings.anchor.refresh_secs,
        FirstTick::Immediate,
    );

    if settings.anchored_drop.enabled {
        let strategy = AnchoredDrop::new(settings.anchored_drop.drop_threshold);
        spawn_loop(
            &mut tasks,
            Arc::new(BuyEvaluator::new(ctx.clone(), strategy)),
            settings.anchored_drop.interval_secs,
            FirstTick::AfterPeriod,
        );
    }

    if settings.range_midpoint.enabled {
        let strategy = RangeMidpoint::new(
            settings.range_midpoint.drop_threshold,
            settings.range_midpoint.candle_interval.clone(),
        );
        spawn_loop(
            &mut tasks,
            Arc::new(BuyEvaluator::new(ctx.clone(), strategy)),
            settings.range_midpoint.interval_secs,
            FirstTick::AfterPeriod,
        );
    }

    spawn_loop(
        &mut tasks,
        Arc::new(OrderReconciler::new(ctx.clone())),
        settings.reconciler.interval_secs,
        FirstTick::AfterPeriod,
    );

    spawn_loop(
        &mut tasks,
        Arc::new(SellEvaluator::new(ctx.clone())),
        settings.seller.interval_secs,
        FirstTick::AfterPeriod,
    );

    tracing::info!("✅ {} loops spawned", tasks.len());
    tracing::info!("\nPress Ctrl+C to stop...\n");

    // Wait for a signal or for any loop to die
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("\n⚠️  Received Ctrl+C, shutting down...");
        }
        _ = terminate_signal() => {
            tracing::info!("⚠️  Received SIGTERM, shutting down...");
        }
        Some(result) = tasks.join_next() => {
            match result {
                Ok(name) => tracing::error!("{} loop exited", name),
                Err(e) => tracing::error!("Loop exited: {}", e),
            }
        }
    }

    tasks.abort_all();

    tracing::info!("👋 Autotrader stopped");
    Ok(())
}

fn setup_logging(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_gateway(settings: &Settings) -> Result<Arc<dyn MarketGateway>> {
    let client = BinanceClient::new(&settings.binance)?;
    if settings.dry_run {
        Ok(Arc::new(DryRunGateway::new(client)))
    } else {
        Ok(Arc::new(client))
    }
}

fn build_notifier(settings: &Settings) -> Result<Arc<dyn Notifier>> {
    match (&settings.notify.telegram_token, settings.notify.chat_id) {
        (Some(token), Some(chat_id)) if !token.is_empty() => {
            tracing::info!("📨 Telegram notifications enabled (chat {})", chat_id);
            Ok(Arc::new(TelegramNotifier::new(token.clone(), chat_id)?))
        }
        _ => {
            tracing::info!("📨 Telegram not configured, notifications go to the log");
            Ok(Arc::new(LogNotifier))
        }
    }
}

fn log_configuration(settings: &Settings, exchange: &str) {
    tracing::info!("\n📊 Configuration:");
    tracing::info!("  Exchange: {} (ledger id {})", exchange, settings.exchange);
    tracing::info!("  Quote asset: {}", settings.quote_asset);
    tracing::info!("  Symbols: {}", settings.symbols.join(", "));
    tracing::info!(
        "  Buy sizing: 1/{} of free balance, cooldown {}s",
        settings.buying.split_factor,
        settings.buying.cooldown_secs
    );
    tracing::info!(
        "  Anchored drop: {} ({}% every {}s)",
        on_off(settings.anchored_drop.enabled),
        settings.anchored_drop.drop_threshold * 100.0,
        settings.anchored_drop.interval_secs
    );
    tracing::info!(
        "  Range midpoint: {} ({}% vs {} candle every {}s)",
        on_off(settings.range_midpoint.enabled),
        settings.range_midpoint.drop_threshold * 100.0,
        settings.range_midpoint.candle_interval,
        settings.range_midpoint.interval_secs
    );
    tracing::info!(
        "  Take profit: +{}% (checked every {}s)",
        settings.seller.profit_threshold * 100.0,
        settings.seller.interval_secs
    );
}

fn on_off(enabled: bool) -> &'static str {
    if enabled {
        "on"
    } else {
        "off"
    }
}

fn spawn_loop<T: PeriodicTask + 'static>(
    tasks: &mut JoinSet<&'static str>,
    task: Arc<T>,
    period_secs: u64,
    first: FirstTick,
) {
    let name = task.name();
    tasks.spawn(async move {
        run_every(task, Duration::from_secs(period_secs), first).await;
        name
    });
}

#[cfg(unix)]
async fn terminate_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::warn!("Cannot listen for SIGTERM: {}", e);
            std::future::pending::<()>().await
        }
    }
}

#[cfg(not(unix))]
async fn terminate_signal() {
    std::future::pending::<()>().await
}
