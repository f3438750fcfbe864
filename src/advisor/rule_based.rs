// =============================================================================
// Rule-based advisor fallback
// =============================================================================
//
// A conservative composite of the four strategies: each contributes a vote
// (LONG/SHORT/abstain); the advisor only recommends BUY/SELL when the votes
// agree, otherwise HOLD. This is the mandatory fallback when the LLM advisor
// times out or returns a malformed response — it must never fail to produce
// a valid (possibly HOLD) response.

use async_trait::async_trait;

use crate::advisor::{Action, Advisor, AdvisorResponse, MarketSnapshot, RiskLevel, TechnicalSnapshot};
use crate::types::TradingMode;

pub struct RuleBasedAdvisor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vote {
    Long,
    Short,
    Abstain,
}

fn trend_vote(t: &TechnicalSnapshot) -> Vote {
    let (Some(adx), Some(fast), Some(slow), Some(macd), Some(signal)) =
        (t.indicators.adx, t.indicators.ema_fast, t.indicators.ema_slow, t.indicators.macd, t.indicators.macd_signal)
    else {
        return Vote::Abstain;
    };
    if adx > 25.0 && fast > slow && macd > signal {
        Vote::Long
    } else if adx > 25.0 && fast < slow && macd < signal {
        Vote::Short
    } else {
        Vote::Abstain
    }
}

fn mean_reversion_vote(t: &TechnicalSnapshot, price: f64) -> Vote {
    let (Some(rsi), Some(lower), Some(upper)) = (t.indicators.rsi, t.indicators.bollinger_lower, t.indicators.bollinger_upper) else {
        return Vote::Abstain;
    };
    if rsi < 30.0 && price < lower {
        Vote::Long
    } else if rsi > 70.0 && price > upper {
        Vote::Short
    } else {
        Vote::Abstain
    }
}

fn breakout_vote(t: &TechnicalSnapshot, price: f64) -> Vote {
    let (Some(adx), Some(lower), Some(upper)) = (t.indicators.adx, t.indicators.bollinger_lower, t.indicators.bollinger_upper) else {
        return Vote::Abstain;
    };
    if price > upper && adx > 20.0 {
        Vote::Long
    } else if price < lower && adx > 20.0 {
        Vote::Short
    } else {
        Vote::Abstain
    }
}

fn pullback_vote(t: &TechnicalSnapshot) -> Vote {
    let (Some(fast), Some(slow), Some(rsi)) = (t.indicators.ema_fast, t.indicators.ema_slow, t.indicators.rsi) else {
        return Vote::Abstain;
    };
    if !(40.0..60.0).contains(&rsi) {
        return Vote::Abstain;
    }
    if fast > slow {
        Vote::Long
    } else if fast < slow {
        Vote::Short
    } else {
        Vote::Abstain
    }
}

#[async_trait]
impl Advisor for RuleBasedAdvisor {
    async fn advise(&self, market: &MarketSnapshot, technical: &TechnicalSnapshot, mode: TradingMode) -> AdvisorResponse {
        let votes = [
            trend_vote(technical),
            mean_reversion_vote(technical, market.current_price),
            breakout_vote(technical, market.current_price),
            pullback_vote(technical),
        ];
        let longs = votes.iter().filter(|v| **v == Vote::Long).count();
        let shorts = votes.iter().filter(|v| **v == Vote::Short).count();

        let (action, confidence, reasoning) = if longs >= 2 && longs > shorts {
            (Action::Buy, 50.0 + 10.0 * longs as f64, format!("{longs}/4 strategies agree long"))
        } else if shorts >= 2 && shorts > longs && mode == TradingMode::Leverage {
            (Action::Sell, 50.0 + 10.0 * shorts as f64, format!("{shorts}/4 strategies agree short"))
        } else {
            (Action::Hold, 0.0, "no strategy consensus".to_string())
        };

        AdvisorResponse {
            action,
            confidence: confidence.min(90.0),
            risk: RiskLevel::Medium,
            entry: None,
            stop_loss: None,
            take_profit: None,
            reasoning,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::advisor::IndicatorSnapshotView;
    use chrono::Utc;

    fn market() -> MarketSnapshot {
        MarketSnapshot {
            symbol: "BTCUSDT".into(),
            current_price: 100.0,
            price_change_24h: 0.0,
            volume_24h: 0.0,
            high_24h: 0.0,
            low_24h: 0.0,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn consensus_long_produces_buy() {
        let technical = TechnicalSnapshot {
            indicators: IndicatorSnapshotView {
                rsi: Some(55.0),
                ema_fast: Some(110.0),
                ema_slow: Some(100.0),
                macd: Some(2.0),
                macd_signal: Some(1.0),
                adx: Some(40.0),
                bollinger_upper: None,
                bollinger_middle: None,
                bollinger_lower: None,
            },
            support: None,
            resistance: None,
        };
        let response = RuleBasedAdvisor.advise(&market(), &technical, TradingMode::Leverage).await;
        assert_eq!(response.action, Action::Buy);
    }

    #[tokio::test]
    async fn no_consensus_holds() {
        let technical = TechnicalSnapshot { indicators: IndicatorSnapshotView::default(), support: None, resistance: None };
        let response = RuleBasedAdvisor.advise(&market(), &technical, TradingMode::Leverage).await;
        assert_eq!(response.action, Action::Hold);
    }

    #[tokio::test]
    async fn short_consensus_discarded_for_spot() {
        let technical = TechnicalSnapshot {
            indicators: IndicatorSnapshotView {
                rsi: Some(45.0),
                ema_fast: Some(90.0),
                ema_slow: Some(100.0),
                macd: Some(-2.0),
                macd_signal: Some(-1.0),
                adx: Some(40.0),
                bollinger_upper: None,
                bollinger_middle: None,
                bollinger_lower: None,
            },
            support: None,
            resistance: None,
        };
        let response = RuleBasedAdvisor.advise(&market(), &technical, TradingMode::Spot).await;
        assert_eq!(response.action, Action::Hold);
    }
}
