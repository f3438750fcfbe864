// =============================================================================
// LLM-backed advisor
// =============================================================================
//
// Calls an HTTP endpoint carrying the market + technical snapshot and parses
// a structured response by named fields. Any timeout, transport error, or
// malformed field degrades to the rule-based fallback — the advisor never
// surfaces an error into a bot's hot path.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::warn;

use crate::advisor::rule_based::RuleBasedAdvisor;
use crate::advisor::{Action, Advisor, AdvisorResponse, MarketSnapshot, RiskLevel, TechnicalSnapshot, ADVISOR_TIMEOUT};
use crate::types::TradingMode;

/// Wire shape returned by the advisor endpoint, field names matching the
/// protocol's `ACTION`/`CONFIDENCE`/`RISK`/... contract.
#[derive(Debug, Deserialize)]
struct RawAdvisorResponse {
    action: String,
    confidence: f64,
    risk: String,
    entry: Option<f64>,
    stop_loss: Option<f64>,
    take_profit: Option<f64>,
    reasoning: Option<String>,
}

impl TryFrom<RawAdvisorResponse> for AdvisorResponse {
    type Error = ();

    fn try_from(raw: RawAdvisorResponse) -> Result<Self, Self::Error> {
        let action = match raw.action.to_uppercase().as_str() {
            "BUY" => Action::Buy,
            "SELL" => Action::Sell,
            "HOLD" => Action::Hold,
            _ => return Err(()),
        };
        let risk = match raw.risk.to_uppercase().as_str() {
            "LOW" => RiskLevel::Low,
            "MEDIUM" => RiskLevel::Medium,
            "HIGH" => RiskLevel::High,
            _ => return Err(()),
        };
        if !(0.0..=100.0).contains(&raw.confidence) {
            return Err(());
        }
        Ok(AdvisorResponse {
            action,
            confidence: raw.confidence,
            risk,
            entry: raw.entry,
            stop_loss: raw.stop_loss,
            take_profit: raw.take_profit,
            reasoning: raw.reasoning.unwrap_or_default(),
        })
    }
}

pub struct LlmAdvisor {
    endpoint: String,
    client: reqwest::Client,
    fallback: RuleBasedAdvisor,
}

impl LlmAdvisor {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::builder().timeout(ADVISOR_TIMEOUT).build().expect("failed to build reqwest client"),
            fallback: RuleBasedAdvisor,
        }
    }

    async fn call(&self, market: &MarketSnapshot, technical: &TechnicalSnapshot, mode: TradingMode) -> Option<AdvisorResponse> {
        let body = serde_json::json!({
            "market": market,
            "technical": technical,
            "tradingMode": mode.as_str(),
        });

        let call = async {
            let resp = self.client.post(&self.endpoint).json(&body).send().await.ok()?;
            let raw: RawAdvisorResponse = resp.json().await.ok()?;
            AdvisorResponse::try_from(raw).ok()
        };

        match tokio::time::timeout(ADVISOR_TIMEOUT, call).await {
            Ok(Some(response)) => Some(response),
            Ok(None) => {
                warn!(symbol = %market.symbol, "advisor returned malformed response, falling back");
                None
            }
            Err(_) => {
                warn!(symbol = %market.symbol, "advisor call timed out, falling back");
                None
            }
        }
    }
}

#[async_trait]
impl Advisor for LlmAdvisor {
    async fn advise(&self, market: &MarketSnapshot, technical: &TechnicalSnapshot, mode: TradingMode) -> AdvisorResponse {
        match self.call(market, technical, mode).await {
            Some(response) => response,
            None => self.fallback.advise(market, technical, mode).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_action_is_rejected() {
        let raw = RawAdvisorResponse {
            action: "MAYBE".into(),
            confidence: 50.0,
            risk: "LOW".into(),
            entry: None,
            stop_loss: None,
            take_profit: None,
            reasoning: None,
        };
        assert!(AdvisorResponse::try_from(raw).is_err());
    }

    #[test]
    fn confidence_out_of_range_is_rejected() {
        let raw = RawAdvisorResponse {
            action: "BUY".into(),
            confidence: 150.0,
            risk: "LOW".into(),
            entry: None,
            stop_loss: None,
            take_profit: None,
            reasoning: None,
        };
        assert!(AdvisorResponse::try_from(raw).is_err());
    }

    #[test]
    fn well_formed_response_parses() {
        let raw = RawAdvisorResponse {
            action: "buy".into(),
            confidence: 70.0,
            risk: "medium".into(),
            entry: Some(100.0),
            stop_loss: Some(98.0),
            take_profit: Some(106.0),
            reasoning: Some("uptrend".into()),
        };
        let response = AdvisorResponse::try_from(raw).unwrap();
        assert_eq!(response.action, Action::Buy);
        assert_eq!(response.risk, RiskLevel::Medium);
    }
}
