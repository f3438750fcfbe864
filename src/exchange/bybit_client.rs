// =============================================================================
// Bybit v5 REST client — HMAC-SHA256 signed requests
// =============================================================================
//
// SECURITY: the secret is never logged or serialized. Signed requests carry
// `X-BAPI-API-KEY`, `X-BAPI-TIMESTAMP`, `X-BAPI-RECV-WINDOW` headers and an
// `X-BAPI-SIGN` HMAC-SHA256 signature over `timestamp || apiKey || recvWindow
// || (queryString||body)`. Public market-data calls are unauthenticated GETs
// and never carry credentials.

use anyhow::{Context, Result};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use crate::error::EngineError;
use crate::market_data::Candle;
use crate::types::{Category, OrderSide, OrderType};

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW_MS: u64 = 5000;

/// Bybit v5 REST API client. Credentials are optional: unauthenticated calls
/// (tickers, klines) work without them; authenticated calls fail fast with
/// `CredentialsMissing` when none are configured.
#[derive(Clone)]
pub struct BybitClient {
    credentials: Option<(String, String)>,
    base_url: String,
    client: reqwest::Client,
}

impl BybitClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        Self { credentials: None, base_url: base_url.into(), client }
    }

    pub fn mainnet() -> Self {
        Self::new("https://api.bybit.com")
    }

    pub fn with_credentials(mut self, api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        self.credentials = Some((api_key.into(), api_secret.into()));
        self
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn sign(&self, secret: &str, payload: &str) -> String {
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key size");
        mac.update(payload.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn timestamp_ms() -> u64 {
        SystemTime::now().duration_since(UNIX_EPOCH).expect("system clock before UNIX epoch").as_millis() as u64
    }

    fn signed_headers(&self, query_or_body: &str) -> Result<HeaderMap, EngineError> {
        let (api_key, secret) = self
            .credentials
            .as_ref()
            .ok_or_else(|| EngineError::CredentialsMissing("bybit".into()))?;
        let ts = Self::timestamp_ms();
        let payload = format!("{ts}{api_key}{RECV_WINDOW_MS}{query_or_body}");
        let signature = self.sign(secret, &payload);

        let mut headers = HeaderMap::new();
        headers.insert("X-BAPI-API-KEY", HeaderValue::from_str(api_key).unwrap());
        headers.insert("X-BAPI-TIMESTAMP", HeaderValue::from_str(&ts.to_string()).unwrap());
        headers.insert("X-BAPI-RECV-WINDOW", HeaderValue::from_str(&RECV_WINDOW_MS.to_string()).unwrap());
        headers.insert("X-BAPI-SIGN", HeaderValue::from_str(&signature).unwrap());
        Ok(headers)
    }

    fn check_ret_code(body: &serde_json::Value) -> Result<(), EngineError> {
        let ret_code = body.get("retCode").and_then(|v| v.as_i64()).unwrap_or(-1);
        if ret_code != 0 {
            let ret_msg = body.get("retMsg").and_then(|v| v.as_str()).unwrap_or("unknown error").to_string();
            return Err(EngineError::ExchangeRejected { code: ret_code, msg: ret_msg });
        }
        Ok(())
    }

    /// Unauthenticated connectivity probe; also works as a credential-less
    /// startup check.
    #[instrument(skip(self), name = "bybit::test_connection")]
    pub async fn test_connection(&self) -> Result<(), EngineError> {
        let url = format!("{}/v5/market/time", self.base_url);
        let resp = self.client.get(&url).send().await.map_err(|e| EngineError::NetworkTimeout(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| EngineError::ProtocolError(e.to_string()))?;
        Self::check_ret_code(&body)
    }

    #[instrument(skip(self), name = "bybit::get_balance")]
    pub async fn get_balance(&self, coin: &str) -> Result<f64, EngineError> {
        let query = format!("accountType=UNIFIED&coin={coin}");
        let headers = self.signed_headers(&query)?;
        let url = format!("{}/v5/account/wallet-balance?{}", self.base_url, query);

        let resp = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| EngineError::NetworkTimeout(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| EngineError::ProtocolError(e.to_string()))?;
        Self::check_ret_code(&body)?;

        let balance = body["result"]["list"]
            .as_array()
            .and_then(|accounts| accounts.first())
            .and_then(|acc| acc["coin"].as_array())
            .and_then(|coins| coins.iter().find(|c| c["coin"].as_str() == Some(coin)))
            .and_then(|c| c["walletBalance"].as_str())
            .and_then(|s| s.parse::<f64>().ok())
            .unwrap_or(0.0);

        debug!(coin, balance, "balance retrieved");
        Ok(balance)
    }

    #[instrument(skip(self, price), name = "bybit::place_order")]
    pub async fn place_order(
        &self,
        category: Category,
        symbol: &str,
        side: OrderSide,
        order_type: OrderType,
        qty: f64,
        price: Option<f64>,
    ) -> Result<PlacedOrder, EngineError> {
        let mut body = serde_json::json!({
            "category": category.to_string(),
            "symbol": symbol,
            "side": side.as_str(),
            "orderType": order_type.as_str(),
            "qty": qty.to_string(),
        });
        if let Some(p) = price {
            body["price"] = serde_json::Value::String(p.to_string());
        }
        let body_str = body.to_string();
        let headers = self.signed_headers(&body_str)?;
        let url = format!("{}/v5/order/create", self.base_url);

        debug!(symbol, side = side.as_str(), qty, "placing order");

        let resp = self
            .client
            .post(&url)
            .headers(headers)
            .header("Content-Type", "application/json")
            .body(body_str)
            .send()
            .await
            .map_err(|e| EngineError::NetworkTimeout(e.to_string()))?;
        let resp_body: serde_json::Value = resp.json().await.map_err(|e| EngineError::ProtocolError(e.to_string()))?;

        if let Err(e) = Self::check_ret_code(&resp_body) {
            warn!(symbol, error = %e, "order rejected by exchange");
            return Err(e);
        }

        let order_id = resp_body["result"]["orderId"].as_str().unwrap_or_default().to_string();
        let status = resp_body["result"]["orderStatus"].as_str().map(OrderFillStatus::from_bybit).unwrap_or(OrderFillStatus::Unknown);
        debug!(symbol, order_id, ?status, "order placed");
        Ok(PlacedOrder { order_id, symbol: symbol.to_string(), status })
    }

    #[instrument(skip(self), name = "bybit::get_positions")]
    pub async fn get_positions(&self, category: Category) -> Result<serde_json::Value, EngineError> {
        let query = format!("category={category}&settleCoin=USDT");
        let headers = self.signed_headers(&query)?;
        let url = format!("{}/v5/position/list?{}", self.base_url, query);
        let resp = self
            .client
            .get(&url)
            .headers(headers)
            .send()
            .await
            .map_err(|e| EngineError::NetworkTimeout(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| EngineError::ProtocolError(e.to_string()))?;
        Self::check_ret_code(&body)?;
        Ok(body["result"].clone())
    }

    #[instrument(skip(self), name = "bybit::get_ticker")]
    pub async fn get_ticker(&self, category: Category, symbol: &str) -> Result<Ticker, EngineError> {
        let url = format!("{}/v5/market/tickers?category={}&symbol={}", self.base_url, category, symbol);
        let resp = self.client.get(&url).send().await.map_err(|e| EngineError::NetworkTimeout(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| EngineError::ProtocolError(e.to_string()))?;
        Self::check_ret_code(&body)?;

        let entry = body["result"]["list"]
            .as_array()
            .and_then(|arr| arr.first())
            .ok_or_else(|| EngineError::DataUnavailable(format!("no ticker for {symbol}")))?;

        Ok(Ticker {
            symbol: symbol.to_string(),
            last_price: parse_str_f64(&entry["lastPrice"]).unwrap_or(0.0),
            volume_24h: parse_str_f64(&entry["volume24h"]).unwrap_or(0.0),
            price_change_pct_24h: parse_str_f64(&entry["price24hPcnt"]).unwrap_or(0.0) * 100.0,
            high_24h: parse_str_f64(&entry["highPrice24h"]).unwrap_or(0.0),
            low_24h: parse_str_f64(&entry["lowPrice24h"]).unwrap_or(0.0),
        })
    }

    #[instrument(skip(self), name = "bybit::get_klines")]
    pub async fn get_klines(&self, category: Category, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>, EngineError> {
        let url = format!(
            "{}/v5/market/kline?category={}&symbol={}&interval={}&limit={}",
            self.base_url, category, symbol, interval, limit
        );
        let resp = self.client.get(&url).send().await.map_err(|e| EngineError::NetworkTimeout(e.to_string()))?;
        let body: serde_json::Value = resp.json().await.map_err(|e| EngineError::ProtocolError(e.to_string()))?;
        Self::check_ret_code(&body)?;

        let raw = body["result"]["list"]
            .as_array()
            .ok_or_else(|| EngineError::ProtocolError("klines response missing list".into()))?;

        // Bybit returns candles newest-first; reverse to chronological order.
        let mut candles = Vec::with_capacity(raw.len());
        for entry in raw.iter().rev() {
            let arr = match entry.as_array() {
                Some(a) if a.len() >= 7 => a,
                _ => {
                    warn!("skipping malformed kline entry");
                    continue;
                }
            };
            let open_time = arr[0].as_str().and_then(|s| s.parse::<i64>().ok()).unwrap_or(0);
            let open = parse_str_f64(&arr[1]).unwrap_or(f64::NAN);
            let high = parse_str_f64(&arr[2]).unwrap_or(f64::NAN);
            let low = parse_str_f64(&arr[3]).unwrap_or(f64::NAN);
            let close = parse_str_f64(&arr[4]).unwrap_or(f64::NAN);
            let volume = parse_str_f64(&arr[5]).unwrap_or(f64::NAN);
            let candle = Candle::new(open_time, open, high, low, close, volume, open_time);
            if candle.is_valid() {
                candles.push(candle);
            } else {
                warn!(symbol, "dropping invalid candle");
            }
        }

        debug!(symbol, interval, count = candles.len(), "klines fetched");
        Ok(candles)
    }
}

fn parse_str_f64(val: &serde_json::Value) -> Option<f64> {
    if let Some(s) = val.as_str() {
        s.parse::<f64>().ok()
    } else {
        val.as_f64()
    }
}

/// Fill state reported by the exchange at order placement time. Market
/// orders normally arrive as `Filled`; `Unknown` covers responses that omit
/// `orderStatus` altogether (Bybit's create-order ack doesn't always carry
/// it — only a follow-up order query does).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderFillStatus {
    Filled,
    PartiallyFilled,
    New,
    Rejected,
    Cancelled,
    Unknown,
}

impl OrderFillStatus {
    fn from_bybit(raw: &str) -> Self {
        match raw {
            "Filled" => Self::Filled,
            "PartiallyFilled" => Self::PartiallyFilled,
            "New" | "Created" | "PendingNew" => Self::New,
            "Rejected" => Self::Rejected,
            "Cancelled" | "Deactivated" => Self::Cancelled,
            _ => Self::Unknown,
        }
    }

    /// `true` only for a status we can positively confirm as filled;
    /// `Unknown` is treated as "not provably filled" by callers rather than
    /// assumed good, since Bybit's create-order response often omits it.
    pub fn is_confirmed_filled(&self) -> bool {
        matches!(self, Self::Filled)
    }
}

#[derive(Debug, Clone)]
pub struct PlacedOrder {
    pub order_id: String,
    pub symbol: String,
    pub status: OrderFillStatus,
}

#[derive(Debug, Clone)]
pub struct Ticker {
    pub symbol: String,
    pub last_price: f64,
    pub volume_24h: f64,
    pub price_change_pct_24h: f64,
    pub high_24h: f64,
    pub low_24h: f64,
}

impl std::fmt::Debug for BybitClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BybitClient")
            .field("credentials", &self.credentials.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ret_code_zero_is_success() {
        let body = serde_json::json!({"retCode": 0, "retMsg": "OK"});
        assert!(BybitClient::check_ret_code(&body).is_ok());
    }

    #[test]
    fn nonzero_ret_code_is_rejected() {
        let body = serde_json::json!({"retCode": 10001, "retMsg": "params error"});
        let err = BybitClient::check_ret_code(&body).unwrap_err();
        assert!(matches!(err, EngineError::ExchangeRejected { code: 10001, .. }));
    }

    #[tokio::test]
    async fn signed_call_without_credentials_fails_fast() {
        let client = BybitClient::mainnet();
        let err = client.get_balance("USDT").await.unwrap_err();
        assert!(matches!(err, EngineError::CredentialsMissing(_)));
    }
}
