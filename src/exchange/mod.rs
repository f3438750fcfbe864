// =============================================================================
// Exchange access: REST client, rate limiting, public WebSocket stream
// =============================================================================

pub mod bybit_client;
pub mod rate_limit;
pub mod ws;

pub use bybit_client::{BybitClient, OrderFillStatus, PlacedOrder, Ticker};
pub use rate_limit::{RateLimitSnapshot, RateLimitTracker};
