// Shared fixtures for the engine tests: a scripted exchange and a recording notifier
#![allow(dead_code)]

use async_trait::async_trait;
use autotrader::api::MarketGateway;
use autotrader::config::Settings;
use autotrader::execution::TradingContext;
use autotrader::models::{
    Balance, Candle, ExchangeOrder, LimitOrderRequest, OrderScope, OrderSide, OrderStatus,
    TickerPrice,
};
use autotrader::notify::{Notifier, TradeEvent};
use autotrader::persistence::MemoryStore;
use autotrader::Result;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const EXCHANGE: &str = "binance";

/// In-memory exchange whose answers are set by the test
#[derive(Default)]
pub struct ScriptedGateway {
    prices: Mutex<HashMap<String, String>>,
    balances: Mutex<Vec<Balance>>,
    candles: Mutex<HashMap<String, Vec<Candle>>>,
    orders: Mutex<Vec<ExchangeOrder>>,
    failing_order_symbols: Mutex<HashSet<String>>,
    fail_prices: AtomicBool,
    placed: Mutex<Vec<LimitOrderRequest>>,
    cancelled: Mutex<Vec<(String, i64)>>,
    calls: AtomicUsize,
    next_order_id: AtomicI64,
}

impl ScriptedGateway {
    pub fn new() -> Self {
        Self {
            next_order_id: AtomicI64::new(1),
            ..Default::default()
        }
    }

    pub fn set_price(&self, symbol: &str, price: &str) {
        self.prices
            .lock()
            .unwrap()
            .insert(symbol.to_string(), price.to_string());
    }

    pub fn set_free_balance(&self, asset: &str, free: &str) {
        let mut balances = self.balances.lock().unwrap();
        balances.retain(|b| b.asset != asset);
        balances.push(Balance {
            asset: asset.to_string(),
            free: free.to_string(),
            locked: "0".to_string(),
        });
    }

    pub fn set_candle(&self, symbol: &str, high: &str, low: &str) {
        let candle = Candle {
            open_time_ms: 0,
            open: low.to_string(),
            high: high.to_string(),
            low: low.to_string(),
            close: high.to_string(),
            volume: "1000".to_string(),
        };
        self.candles
            .lock()
            .unwrap()
            .insert(symbol.to_string(), vec![candle]);
    }

    pub fn add_order(&self, order: ExchangeOrder) {
        self.orders.lock().unwrap().push(order);
    }

    pub fn fail_orders_for(&self, symbol: &str) {
        self.failing_order_symbols
            .lock()
            .unwrap()
            .insert(symbol.to_string());
    }

    pub fn fail_prices(&self, fail: bool) {
        self.fail_prices.store(fail, Ordering::SeqCst);
    }

    pub fn placed(&self) -> Vec<LimitOrderRequest> {
        self.placed.lock().unwrap().clone()
    }

    pub fn cancelled(&self) -> Vec<(String, i64)> {
        self.cancelled.lock().unwrap().clone()
    }

    /// Total number of gateway calls of any kind
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn count(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MarketGateway for ScriptedGateway {
    fn exchange(&self) -> &str {
        EXCHANGE
    }

    async fn list_prices(&self, symbols: &[String]) -> Result<Vec<TickerPrice>> {
        self.count();
        if self.fail_prices.load(Ordering::SeqCst) {
            return Err("ticker endpoint unavailable".into());
        }

        let prices = self.prices.lock().unwrap();
        Ok(symbols
            .iter()
            .filter_map(|symbol| {
                prices.get(symbol).map(|price| TickerPrice {
                    symbol: symbol.clone(),
                    price: price.clone(),
                })
            })
            .collect())
    }

    async fn get_account(&self) -> Result<Vec<Balance>> {
        self.count();
        Ok(self.balances.lock().unwrap().clone())
    }

    async fn list_candles(&self, symbol: &str, _interval: &str, limit: u32) -> Result<Vec<Candle>> {
        self.count();
        let candles = self.candles.lock().unwrap();
        let all = candles.get(symbol).cloned().unwrap_or_default();
        let skip = all.len().saturating_sub(limit as usize);
        Ok(all.into_iter().skip(skip).collect())
    }

    async fn list_orders(&self, scope: OrderScope<'_>) -> Result<Vec<ExchangeOrder>> {
        self.count();
        let orders = self.orders.lock().unwrap();
        match scope {
            OrderScope::Symbol(symbol) => {
                if self.failing_order_symbols.lock().unwrap().contains(symbol) {
                    return Err(format!("allOrders failed for {}", symbol).into());
                }
                Ok(orders.iter().filter(|o| o.symbol == symbol).cloned().collect())
            }
            OrderScope::AllOpen => Ok(orders.iter().filter(|o| o.status.is_open()).cloned().collect()),
        }
    }

    async fn place_limit_order(&self, request: &LimitOrderRequest) -> Result<ExchangeOrder> {
        self.count();
        self.placed.lock().unwrap().push(request.clone());

        Ok(ExchangeOrder {
            order_id: self.next_order_id.fetch_add(1, Ordering::SeqCst),
            symbol: request.symbol.clone(),
            side: request.side,
            status: OrderStatus::New,
            price: request.price.clone(),
            orig_qty: request.quantity.clone(),
            executed_qty: "0".to_string(),
            time_ms: chrono::Utc::now().timestamp_millis(),
        })
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()> {
        self.count();
        self.cancelled
            .lock()
            .unwrap()
            .push((symbol.to_string(), order_id));
        Ok(())
    }
}

/// Notifier that keeps every event for assertions
#[derive(Default)]
pub struct RecordingNotifier {
    events: Mutex<Vec<TradeEvent>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<TradeEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, event: &TradeEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}

/// Dry-run settings trading the given symbols with default thresholds
pub fn settings(symbols: &[&str]) -> Settings {
    let symbols: Vec<String> = symbols.iter().map(|s| s.to_string()).collect();
    let raw = config::Config::builder()
        .set_override("symbols", symbols)
        .unwrap()
        .set_override("dry_run", true)
        .unwrap()
        .build()
        .unwrap();
    let settings: Settings = raw.try_deserialize().unwrap();
    settings.validate().unwrap();
    settings
}

pub struct Harness {
    pub gateway: Arc<ScriptedGateway>,
    pub store: Arc<MemoryStore>,
    pub notifier: Arc<RecordingNotifier>,
    pub ctx: TradingContext,
}

pub fn harness(settings: Settings) -> Harness {
    harness_with_gateway(settings, Arc::new(ScriptedGateway::new()))
}

pub fn harness_with_gateway(settings: Settings, gateway: Arc<ScriptedGateway>) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let ctx = TradingContext::new(gateway.clone(), store.clone(), notifier.clone(), settings);

    Harness {
        gateway,
        store,
        notifier,
        ctx,
    }
}

pub fn exchange_order(
    order_id: i64,
    symbol: &str,
    side: OrderSide,
    status: OrderStatus,
    price: &str,
    executed_qty: &str,
) -> ExchangeOrder {
    ExchangeOrder {
        order_id,
        symbol: symbol.to_string(),
        side,
        status,
        price: price.to_string(),
        orig_qty: "10".to_string(),
        executed_qty: executed_qty.to_string(),
        time_ms: chrono::Utc::now().timestamp_millis(),
    }
}
