// =============================================================================
// Operator event stream
// =============================================================================
//
// The source mixed progress events and failures onto one emitter. Split into
// two broadcast channels here: `EngineEvent` for routine progress the
// dashboard renders as a feed, `EngineAlert` for failures the operator must
// triage. Consumers subscribe to whichever they need instead of filtering a
// combined stream.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::types::{BotLogLevel, BotState, TradingMode};

/// Routine progress, mirrors the dashboard feed types named in the external
/// interfaces: bot_log, position_update, position_closed, price_update,
/// bot_status_update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    BotLog {
        trading_mode: TradingMode,
        level: BotLogLevel,
        message: String,
    },
    PositionUpdate {
        position_id: String,
        symbol: String,
        current_price: f64,
        pnl: f64,
    },
    PositionClosed {
        position_id: String,
        symbol: String,
        exit_price: f64,
        pnl: f64,
        reason: String,
    },
    PriceUpdate {
        symbol: String,
        price: f64,
    },
    BotStatusUpdate {
        trading_mode: TradingMode,
        state: BotState,
    },
}

/// A failure the operator must see in the System Errors view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineAlert {
    pub kind: String,
    pub component: String,
    pub message: String,
    pub code: Option<String>,
}

impl EngineAlert {
    pub fn new(kind: impl Into<String>, component: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            component: component.into(),
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

/// Holds both broadcast senders; cloned cheaply into every task that needs to
/// publish or subscribe.
#[derive(Clone)]
pub struct EventBus {
    events: broadcast::Sender<EngineEvent>,
    alerts: broadcast::Sender<EngineAlert>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity);
        let (alerts, _) = broadcast::channel(capacity);
        Self { events, alerts }
    }

    pub fn publish_event(&self, event: EngineEvent) {
        // A send error only means there are currently no subscribers; the
        // event is simply dropped, matching the best-effort delivery policy.
        let _ = self.events.send(event);
    }

    pub fn publish_alert(&self, alert: EngineAlert) {
        let _ = self.alerts.send(alert);
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<EngineAlert> {
        self.alerts.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_and_alerts_are_independent_channels() {
        let bus = EventBus::new(16);
        let mut events_rx = bus.subscribe_events();
        let mut alerts_rx = bus.subscribe_alerts();

        bus.publish_event(EngineEvent::PriceUpdate {
            symbol: "BTCUSDT".into(),
            price: 50000.0,
        });
        bus.publish_alert(EngineAlert::new("StorageError", "store", "disk full"));

        let ev = events_rx.recv().await.unwrap();
        matches!(ev, EngineEvent::PriceUpdate { .. });

        let alert = alerts_rx.recv().await.unwrap();
        assert_eq!(alert.kind, "StorageError");
    }

    #[test]
    fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new(4);
        bus.publish_event(EngineEvent::PriceUpdate { symbol: "X".into(), price: 1.0 });
        bus.publish_alert(EngineAlert::new("k", "c", "m"));
    }
}
