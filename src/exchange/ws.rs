// =============================================================================
// Public ticker WebSocket stream
// =============================================================================
//
// Subscribes to Bybit's public `tickers.<SYMBOL>` topic for a fixed symbol
// set and republishes last-price updates onto the shared event bus. Runs
// until the stream disconnects or errors, then returns so the caller can
// reconnect with backoff — the same shape as the source's kline/trade/depth
// stream loops in `main.rs`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, info, warn};

use crate::events::EventBus;
use crate::types::Category;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

fn ws_url(category: Category) -> &'static str {
    match category {
        Category::Spot => "wss://stream.bybit.com/v5/public/spot",
        Category::Linear => "wss://stream.bybit.com/v5/public/linear",
    }
}

/// Runs the reconnect loop forever. Intended to be spawned as its own task;
/// never returns under normal operation.
pub async fn run_ticker_stream(category: Category, symbols: Vec<String>, event_bus: Arc<EventBus>) {
    if symbols.is_empty() {
        warn!(?category, "no symbols to subscribe to, ticker stream not started");
        return;
    }

    loop {
        match connect_and_stream(category, &symbols, &event_bus).await {
            Ok(()) => info!(?category, "ticker stream ended cleanly"),
            Err(e) => error!(?category, error = %e, "ticker stream error, reconnecting in 5s"),
        }
        tokio::time::sleep(RECONNECT_DELAY).await;
    }
}

async fn connect_and_stream(category: Category, symbols: &[String], event_bus: &Arc<EventBus>) -> Result<()> {
    let url = ws_url(category);
    info!(url, symbol_count = symbols.len(), "connecting to ticker WebSocket");

    let (ws_stream, _response) = connect_async(url).await.context("failed to connect to ticker WebSocket")?;
    let (mut write, mut read) = ws_stream.split();

    let args: Vec<String> = symbols.iter().map(|s| format!("tickers.{s}")).collect();
    let subscribe = serde_json::json!({ "op": "subscribe", "args": args });
    write.send(Message::Text(subscribe.to_string())).await.context("failed to send subscribe frame")?;

    info!(category = ?category, "ticker WebSocket subscribed");

    loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => {
                if let Some((symbol, price)) = parse_ticker_update(&text) {
                    event_bus.publish_event(crate::events::EngineEvent::PriceUpdate { symbol, price });
                }
            }
            Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {}
            Some(Ok(Message::Close(_))) => {
                warn!("ticker WebSocket closed by server");
                return Ok(());
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                return Err(e.into());
            }
            None => {
                warn!("ticker WebSocket stream ended");
                return Ok(());
            }
        }
    }
}

/// Parses a `tickers.<SYMBOL>` push message. Returns `None` for anything that
/// isn't a price-bearing ticker update (subscribe acks, pings already
/// filtered at the frame level, malformed payloads).
fn parse_ticker_update(text: &str) -> Option<(String, f64)> {
    let root: serde_json::Value = serde_json::from_str(text).ok()?;
    let topic = root.get("topic")?.as_str()?;
    if !topic.starts_with("tickers.") {
        return None;
    }
    let data = root.get("data")?;
    let symbol = data.get("symbol")?.as_str()?.to_string();
    let price = data.get("lastPrice")?.as_str()?.parse::<f64>().ok()?;
    Some((symbol, price))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_snapshot_ticker_message() {
        let text = r#"{"topic":"tickers.BTCUSDT","type":"snapshot","data":{"symbol":"BTCUSDT","lastPrice":"65000.5"}}"#;
        let (symbol, price) = parse_ticker_update(text).unwrap();
        assert_eq!(symbol, "BTCUSDT");
        assert_eq!(price, 65000.5);
    }

    #[test]
    fn ignores_non_ticker_messages() {
        let text = r#"{"success":true,"op":"subscribe"}"#;
        assert!(parse_ticker_update(text).is_none());
    }

    #[test]
    fn ignores_malformed_json() {
        assert!(parse_ticker_update("not json").is_none());
    }
}
