// =============================================================================
// Aurora Dual Engine — Main Entry Point
// =============================================================================
//
// Boots both bots in paper-trading mode by default (the settings row's own
// `spotPaperTrading`/`leveragePaperTrading` flags, true unless an operator
// has changed them). Starting a bot in live mode with no exchange
// credentials configured fails fast with `CredentialsMissing`.
// =============================================================================

use std::sync::Arc;

use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use aurora_dual_engine::advisor::llm_advisor::LlmAdvisor;
use aurora_dual_engine::advisor::Advisor;
use aurora_dual_engine::engine::BotEngine;
use aurora_dual_engine::events::EventBus;
use aurora_dual_engine::exchange::{self, BybitClient};
use aurora_dual_engine::manager::BotManager;
use aurora_dual_engine::market_data::MarketDataService;
use aurora_dual_engine::monitor::PositionMonitor;
use aurora_dual_engine::server;
use aurora_dual_engine::store::models::MarketDataCache;
use aurora_dual_engine::store::sqlite::SqliteStore;
use aurora_dual_engine::store::Store;
use aurora_dual_engine::types::TradingMode;

const DEFAULT_USERNAME: &str = "operator";
const MARKET_DATA_CACHE_INTERVAL: std::time::Duration = std::time::Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenv::dotenv();

    let default_log_filter = match std::env::var("AURORA_ENV").as_deref() {
        Ok("production") => "warn",
        _ => "info",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_log_filter)))
        .init();

    info!("Aurora dual engine starting up");

    // ── 1. Store ──────────────────────────────────────────────────────────
    let db_path = std::env::var("AURORA_DB_PATH").unwrap_or_else(|_| "./aurora.db".to_string());
    let database_url = format!("sqlite://{db_path}");
    let store: Arc<dyn Store> = Arc::new(SqliteStore::connect(&database_url).await?);

    let user = match store.get_user_by_username(DEFAULT_USERNAME).await? {
        Some(user) => user,
        None => {
            info!(username = DEFAULT_USERNAME, "seeding default operator user");
            store.create_user(DEFAULT_USERNAME, "unset").await?
        }
    };

    let settings = store.get_trading_settings(&user.id).await?;
    settings.validate()?;

    // ── 2. Exchange client + market data service ─────────────────────────
    let mut exchange_client = BybitClient::mainnet();
    if let Some(credentials) = &settings.credentials {
        exchange_client = exchange_client.with_credentials(credentials.api_key.clone(), credentials.api_secret.clone());
    }
    let exchange_client = Arc::new(exchange_client);

    let market_data = Arc::new(MarketDataService::new((*exchange_client).clone(), (*exchange_client).clone()));

    // ── 3. Event bus ──────────────────────────────────────────────────────
    let event_bus = Arc::new(EventBus::default());

    // ── 4. Optional AI advisor ────────────────────────────────────────────
    let advisor: Option<Arc<dyn Advisor>> =
        std::env::var("AURORA_ADVISOR_BROWSER_PATH").ok().map(|endpoint| Arc::new(LlmAdvisor::new(endpoint)) as Arc<dyn Advisor>);
    if advisor.is_none() {
        info!("AURORA_ADVISOR_BROWSER_PATH not set; AI-enabled bots will not produce signals until configured");
    }

    // ── 5. Bot engines ────────────────────────────────────────────────────
    let spot_engine = Arc::new(BotEngine::new(
        TradingMode::Spot,
        user.id.clone(),
        store.clone(),
        market_data.clone(),
        exchange_client.clone(),
        event_bus.clone(),
        advisor.clone(),
    ));
    let leverage_engine = Arc::new(BotEngine::new(
        TradingMode::Leverage,
        user.id.clone(),
        store.clone(),
        market_data.clone(),
        exchange_client.clone(),
        event_bus.clone(),
        advisor.clone(),
    ));

    let manager = Arc::new(BotManager::new(spot_engine.clone(), leverage_engine.clone(), store.clone()));

    // ── 6. Ticker WebSocket streams (spot + linear) ──────────────────────
    let watched_symbols = market_data.get_top_trading_pairs(15);
    {
        let symbols = watched_symbols.clone();
        let bus = event_bus.clone();
        tokio::spawn(async move { exchange::ws::run_ticker_stream(TradingMode::Spot.category(), symbols, bus).await });
    }
    {
        let symbols = watched_symbols.clone();
        let bus = event_bus.clone();
        tokio::spawn(async move { exchange::ws::run_ticker_stream(TradingMode::Leverage.category(), symbols, bus).await });
    }

    // ── 6b. Market data cache refresh ─────────────────────────────────────
    {
        let store = store.clone();
        let market_data = market_data.clone();
        let symbols = watched_symbols.clone();
        tokio::spawn(async move { market_data_cache_loop(store, market_data, symbols).await });
    }

    // ── 7. Position monitor ───────────────────────────────────────────────
    let monitor = Arc::new(PositionMonitor::new(store.clone(), market_data.clone(), event_bus.clone()));
    {
        let monitor = monitor.clone();
        let user_ids = vec![user.id.clone()];
        tokio::spawn(async move { monitor.run(user_ids).await });
    }

    // ── 8. Start both bots ────────────────────────────────────────────────
    if let Err(e) = manager.start_spot().await {
        warn!(error = %e, "spot bot did not start");
    }
    if let Err(e) = manager.start_leverage().await {
        warn!(error = %e, "leverage bot did not start");
    }

    // ── 9. HTTP/WebSocket server ───────────────────────────────────────────
    let bind_addr = std::env::var("AURORA_BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let app = server::router(event_bus.clone());
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "event server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "event server failed");
        }
    });

    info!("all subsystems running, press Ctrl+C to stop");

    // ── 10. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("shutdown signal received, stopping both bots");
    manager.stop_all().await;

    info!("aurora dual engine shut down complete");
    Ok(())
}

/// Refreshes the advisory `MarketData` cache from spot tickers for the
/// watched symbol universe. Runs forever on its own cadence, independent of
/// both bot engines and the Position Monitor; a single bad symbol only skips
/// that symbol's row rather than aborting the pass.
async fn market_data_cache_loop(store: Arc<dyn Store>, market_data: Arc<MarketDataService>, symbols: Vec<String>) {
    loop {
        for symbol in &symbols {
            match market_data.get_market_data(symbol, true).await {
                Ok(ticker) => {
                    let cache = MarketDataCache {
                        symbol: ticker.symbol,
                        price: ticker.last_price,
                        volume_24h: ticker.volume_24h,
                        change_24h: ticker.price_change_pct_24h,
                        updated_at: chrono::Utc::now(),
                    };
                    if let Err(e) = store.upsert_market_data(&cache).await {
                        warn!(symbol = %symbol, error = %e, "failed to cache market data");
                    }
                }
                Err(e) => warn!(symbol = %symbol, error = %e, "ticker fetch for market data cache failed"),
            }
        }
        tokio::time::sleep(MARKET_DATA_CACHE_INTERVAL).await;
    }
}
