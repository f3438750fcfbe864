pub mod candle;
pub mod service;
pub mod symbol_registry;

// Re-export the Candle struct for convenient access (e.g. `use crate::market_data::Candle`).
pub use candle::Candle;
pub use service::MarketDataService;
