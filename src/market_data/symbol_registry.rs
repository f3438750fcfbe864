// =============================================================================
// USDT pair symbol registry
// =============================================================================
//
// Seeded from a static list of canonical USDT pairs. Dynamic discovery (e.g.
// querying the exchange's instrument list) could extend this, but per spec
// startup must never block on it, so only the static seed is implemented.

const UNIVERSE: &[&str] = &[
    "BTCUSDT",
    "ETHUSDT",
    "BNBUSDT",
    "XRPUSDT",
    "SOLUSDT",
    "ADAUSDT",
    "DOGEUSDT",
    "AVAXUSDT",
    "LINKUSDT",
    "DOTUSDT",
    "MATICUSDT",
    "LTCUSDT",
    "TRXUSDT",
    "ATOMUSDT",
    "NEARUSDT",
];

/// All registered USDT pairs, in a fixed canonical order.
pub fn get_all_usdt_pairs() -> Vec<String> {
    UNIVERSE.iter().map(|s| s.to_string()).collect()
}

/// A deterministic prefix of the registered universe.
pub fn get_top_trading_pairs(limit: usize) -> Vec<String> {
    UNIVERSE.iter().take(limit).map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn universe_starts_with_btc() {
        assert_eq!(get_all_usdt_pairs()[0], "BTCUSDT");
    }

    #[test]
    fn top_pairs_is_deterministic_prefix() {
        let top5 = get_top_trading_pairs(5);
        assert_eq!(top5, get_all_usdt_pairs()[..5]);
    }

    #[test]
    fn limit_beyond_universe_returns_whole_universe() {
        let all = get_all_usdt_pairs();
        assert_eq!(get_top_trading_pairs(1000).len(), all.len());
    }
}
