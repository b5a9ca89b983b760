// Runtime settings, loaded once at startup and shared read-only by every loop

use anyhow::{bail, Context};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config/autotrader.toml";
const ENV_PREFIX: &str = "AUTOTRADER";

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default = "default_exchange")]
    pub exchange: String,
    #[serde(default = "default_quote_asset")]
    pub quote_asset: String,
    #[serde(default)]
    pub symbols: Vec<String>,
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default)]
    pub binance: BinanceSettings,
    #[serde(default)]
    pub database: DatabaseSettings,
    #[serde(default)]
    pub notify: NotifySettings,
    #[serde(default)]
    pub anchor: AnchorSettings,
    #[serde(default)]
    pub buying: BuyingSettings,
    #[serde(default)]
    pub anchored_drop: AnchoredDropSettings,
    #[serde(default)]
    pub range_midpoint: RangeMidpointSettings,
    #[serde(default)]
    pub reconciler: ReconcilerSettings,
    #[serde(default)]
    pub seller: SellerSettings,
}

#[derive(Clone, Deserialize)]
pub struct BinanceSettings {
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub secret_key: String,
    #[serde(default = "default_binance_url")]
    pub base_url: String,
    #[serde(default = "default_recv_window")]
    pub recv_window_ms: u64,
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
}

// Credentials never reach logs through `{:?}`
impl std::fmt::Debug for BinanceSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceSettings")
            .field("api_key", &"<redacted>")
            .field("secret_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("recv_window_ms", &self.recv_window_ms)
            .field("requests_per_minute", &self.requests_per_minute)
            .finish()
    }
}

impl Default for BinanceSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            secret_key: String::new(),
            base_url: default_binance_url(),
            recv_window_ms: default_recv_window(),
            requests_per_minute: default_requests_per_minute(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
        }
    }
}

#[derive(Clone, Default, Deserialize)]
pub struct NotifySettings {
    pub telegram_token: Option<String>,
    pub chat_id: Option<i64>,
}

impl std::fmt::Debug for NotifySettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifySettings")
            .field("telegram_token", &self.telegram_token.as_ref().map(|_| "<redacted>"))
            .field("chat_id", &self.chat_id)
            .finish()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnchorSettings {
    #[serde(default = "default_anchor_refresh")]
    pub refresh_secs: u64,
}

impl Default for AnchorSettings {
    fn default() -> Self {
        Self {
            refresh_secs: default_anchor_refresh(),
        }
    }
}

/// Parameters shared by both buy strategies
#[derive(Debug, Clone, Deserialize)]
pub struct BuyingSettings {
    #[serde(default = "default_cooldown")]
    pub cooldown_secs: i64,
    /// Fraction of the free quote balance one trigger may spend is `1 / split_factor`
    #[serde(default = "default_split_factor")]
    pub split_factor: f64,
    #[serde(default = "default_quantity_precision")]
    pub quantity_precision: u32,
}

impl Default for BuyingSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown(),
            split_factor: default_split_factor(),
            quantity_precision: default_quantity_precision(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnchoredDropSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_anchored_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_anchored_threshold")]
    pub drop_threshold: f64,
}

impl Default for AnchoredDropSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_anchored_interval(),
            drop_threshold: default_anchored_threshold(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RangeMidpointSettings {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_range_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_range_threshold")]
    pub drop_threshold: f64,
    #[serde(default = "default_candle_interval")]
    pub candle_interval: String,
}

impl Default for RangeMidpointSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: default_range_interval(),
            drop_threshold: default_range_threshold(),
            candle_interval: default_candle_interval(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileMode {
    /// Stale orders are taken from the per-symbol order history
    PerSymbol,
    /// Stale orders are taken from one query for every open order on the
    /// account, including symbols outside `symbols`
    OpenOrders,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReconcilerSettings {
    #[serde(default = "default_reconcile_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_reconcile_mode")]
    pub mode: ReconcileMode,
    /// Resting orders older than this are cancelled; 0 disables cancellation
    #[serde(default = "default_stale_order")]
    pub stale_order_secs: u64,
}

impl Default for ReconcilerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_reconcile_interval(),
            mode: default_reconcile_mode(),
            stale_order_secs: default_stale_order(),
        }
    }
}

impl ReconcilerSettings {
    pub fn stale_after(&self) -> Option<Duration> {
        (self.stale_order_secs > 0).then(|| Duration::from_secs(self.stale_order_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SellerSettings {
    #[serde(default = "default_seller_interval")]
    pub interval_secs: u64,
    #[serde(default = "default_profit_threshold")]
    pub profit_threshold: f64,
}

impl Default for SellerSettings {
    fn default() -> Self {
        Self {
            interval_secs: default_seller_interval(),
            profit_threshold: default_profit_threshold(),
        }
    }
}

fn default_exchange() -> String {
    "binance".to_string()
}
fn default_quote_asset() -> String {
    "USDT".to_string()
}
fn default_log_filter() -> String {
    "autotrader=info".to_string()
}
fn default_binance_url() -> String {
    "https://api.binance.com".to_string()
}
fn default_recv_window() -> u64 {
    5000
}
fn default_requests_per_minute() -> u32 {
    600
}
fn default_database_url() -> String {
    "postgres://localhost/autotrader".to_string()
}
fn default_max_connections() -> u32 {
    5
}
fn default_anchor_refresh() -> u64 {
    3600
}
fn default_cooldown() -> i64 {
    1800
}
fn default_split_factor() -> f64 {
    10.0
}
fn default_quantity_precision() -> u32 {
    4
}
fn default_true() -> bool {
    true
}
fn default_anchored_interval() -> u64 {
    15
}
fn default_anchored_threshold() -> f64 {
    -0.03
}
fn default_range_interval() -> u64 {
    300
}
fn default_range_threshold() -> f64 {
    -0.05
}
fn default_candle_interval() -> String {
    "8h".to_string()
}
fn default_reconcile_interval() -> u64 {
    60
}
fn default_reconcile_mode() -> ReconcileMode {
    ReconcileMode::PerSymbol
}
fn default_stale_order() -> u64 {
    12 * 3600
}
fn default_seller_interval() -> u64 {
    1
}
fn default_profit_threshold() -> f64 {
    0.05
}

impl Settings {
    /// Load settings from an optional file, then `AUTOTRADER__*` environment overrides
    ///
    /// # Example
    /// `AUTOTRADER__BINANCE__API_KEY=... AUTOTRADER__SYMBOLS=BTCUSDT,ETHUSDT`
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        Self::load_with_overrides(path, &[])
    }

    /// Like [`Settings::load`], with command-line `(key, value)` pairs applied last
    pub fn load_with_overrides(
        path: impl AsRef<Path>,
        overrides: &[(&str, String)],
    ) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let mut builder = config::Config::builder()
            .add_source(config::File::from(path).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("symbols")
                    .try_parsing(true),
            );
        for (key, value) in overrides {
            builder = builder
                .set_override(*key, value.as_str())
                .with_context(|| format!("Invalid override for {}", key))?;
        }

        let raw = builder
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let settings: Settings = raw
            .try_deserialize()
            .context("Failed to parse configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings that would make the engine misbehave
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.symbols.is_empty() {
            bail!("`symbols` must list at least one trading pair");
        }
        if self.symbols.iter().any(|s| s.trim().is_empty()) {
            bail!("`symbols` contains an empty entry");
        }
        if self.exchange.is_empty() {
            bail!("`exchange` must not be empty");
        }
        if !self.dry_run && (self.binance.api_key.is_empty() || self.binance.secret_key.is_empty())
        {
            bail!("binance.api_key and binance.secret_key are required unless dry_run is set");
        }
        if self.buying.split_factor <= 0.0 {
            bail!("buying.split_factor must be positive, got {}", self.buying.split_factor);
        }
        if self.buying.quantity_precision > 18 {
            bail!(
                "buying.quantity_precision must be at most 18, got {}",
                self.buying.quantity_precision
            );
        }
        if self.buying.cooldown_secs < 0 {
            bail!("buying.cooldown_secs must not be negative");
        }
        if self.anchored_drop.drop_threshold >= 0.0 {
            bail!(
                "anchored_drop.drop_threshold must be negative, got {}",
                self.anchored_drop.drop_threshold
            );
        }
        if self.range_midpoint.drop_threshold >= 0.0 {
            bail!(
                "range_midpoint.drop_threshold must be negative, got {}",
                self.range_midpoint.drop_threshold
            );
        }
        if self.seller.profit_threshold <= 0.0 {
            bail!(
                "seller.profit_threshold must be positive, got {}",
                self.seller.profit_threshold
            );
        }

        let intervals = [
            ("anchor.refresh_secs", self.anchor.refresh_secs),
            ("anchored_drop.interval_secs", self.anchored_drop.interval_secs),
            ("range_midpoint.interval_secs", self.range_midpoint.interval_secs),
            ("reconciler.interval_secs", self.reconciler.interval_secs),
            ("seller.interval_secs", self.seller.interval_secs),
        ];
        for (name, secs) in intervals {
            if secs == 0 {
                bail!("{} must be greater than zero", name);
            }
        }

        Ok(())
    }
}
