// Core modules
pub mod api;
pub mod config;
pub mod db;
pub mod execution;
pub mod models;
pub mod notify;
pub mod persistence;
pub mod strategy;

// Re-export commonly used types
pub use api::{MarketGateway, ExchangeError};
pub use config::Settings;
pub use models::*;
pub use persistence::Store;

// Error handling
pub type Result<T> = std::result::Result<T, Box<dyn std::error::Error + Send + Sync>>;
