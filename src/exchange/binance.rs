//! Binance USDⓈ-M futures REST client

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Response};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use std::str::FromStr;
use std::time::Duration;

use super::{
    AccountState, Exchange, ExchangeError, MarketData, OrderFill, OrderRequest, SymbolRules,
};
use crate::config::{ExchangeConfig, MAX_EXCHANGE_LEVERAGE};
use crate::feed::{normalize_candles, Candle, Interval};

type HmacSha256 = Hmac<Sha256>;

/// API key pair
#[derive(Clone)]
pub struct BinanceCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl BinanceCredentials {
    /// Read `BINANCE_API_KEY` and `BINANCE_API_SECRET`
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("BINANCE_API_KEY").ok().filter(|k| !k.is_empty())?;
        let api_secret = std::env::var("BINANCE_API_SECRET")
            .ok()
            .filter(|s| !s.is_empty())?;
        Some(Self {
            api_key,
            api_secret,
        })
    }
}

impl std::fmt::Debug for BinanceCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceCredentials")
            .field("api_key", &"<redacted>")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    code: i64,
    msg: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    total_wallet_balance: Decimal,
    available_balance: Decimal,
    can_trade: bool,
    #[serde(default)]
    positions: Vec<AccountPosition>,
}

#[derive(Debug, Deserialize)]
struct AccountPosition {
    symbol: String,
    #[serde(default)]
    leverage: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ExchangeInfo {
    symbols: Vec<SymbolInfo>,
}

#[derive(Debug, Deserialize)]
struct SymbolInfo {
    symbol: String,
    filters: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct LeverageBracket {
    brackets: Vec<Bracket>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Bracket {
    initial_leverage: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    order_id: i64,
    avg_price: Decimal,
    executed_qty: Decimal,
    #[serde(default)]
    update_time: Option<i64>,
}

fn decimal_at(row: &[Value], idx: usize) -> Result<Decimal, ExchangeError> {
    let raw = row
        .get(idx)
        .ok_or_else(|| ExchangeError::Decode(format!("kline missing field {idx}")))?;
    match raw {
        Value::String(s) => Decimal::from_str(s).map_err(|e| ExchangeError::Decode(e.to_string())),
        Value::Number(n) => {
            Decimal::from_str(&n.to_string()).map_err(|e| ExchangeError::Decode(e.to_string()))
        }
        other => Err(ExchangeError::Decode(format!("unexpected kline value {other}"))),
    }
}

/// Parse a klines payload: arrays of `[openTime, open, high, low, close, volume, ...]`
fn parse_klines(rows: Vec<Vec<Value>>) -> Result<Vec<Candle>, ExchangeError> {
    let candles = rows
        .iter()
        .map(|row| {
            let open_ms = row
                .first()
                .and_then(Value::as_i64)
                .ok_or_else(|| ExchangeError::Decode("kline missing open time".into()))?;
            let timestamp = DateTime::from_timestamp_millis(open_ms)
                .ok_or_else(|| ExchangeError::Decode(format!("bad open time {open_ms}")))?;
            Ok(Candle::new(
                timestamp,
                decimal_at(row, 1)?,
                decimal_at(row, 2)?,
                decimal_at(row, 3)?,
                decimal_at(row, 4)?,
                decimal_at(row, 5)?,
            ))
        })
        .collect::<Result<Vec<_>, ExchangeError>>()?;
    Ok(normalize_candles(candles))
}

/// Extract lot and notional rules from an exchangeInfo symbol entry
fn parse_rules(info: &SymbolInfo, max_leverage: u32) -> SymbolRules {
    let mut rules = SymbolRules::fallback(&info.symbol);
    rules.max_leverage = max_leverage;

    let field = |filter: &Value, key: &str| {
        filter
            .get(key)
            .and_then(Value::as_str)
            .and_then(|s| Decimal::from_str(s).ok())
    };
    for filter in &info.filters {
        match filter.get("filterType").and_then(Value::as_str) {
            Some("LOT_SIZE") => {
                if let Some(step) = field(filter, "stepSize") {
                    rules.step_size = step.normalize();
                }
                if let Some(min_qty) = field(filter, "minQty") {
                    rules.min_qty = min_qty.normalize();
                }
            }
            Some("MIN_NOTIONAL") => {
                if let Some(notional) = field(filter, "notional") {
                    rules.min_notional = notional;
                }
            }
            _ => {}
        }
    }
    rules
}

/// REST client for Binance USDⓈ-M futures
pub struct BinanceFuturesClient {
    base_url: String,
    recv_window_ms: u64,
    credentials: Option<BinanceCredentials>,
    http: Client,
}

impl BinanceFuturesClient {
    pub fn new(
        config: &ExchangeConfig,
        credentials: Option<BinanceCredentials>,
    ) -> Result<Self, ExchangeError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            recv_window_ms: config.recv_window_ms,
            credentials,
            http,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<&BinanceCredentials, ExchangeError> {
        self.credentials.as_ref().ok_or_else(|| ExchangeError::Permission {
            code: 0,
            message: "API credentials not configured".to_string(),
        })
    }

    /// Append timestamp and recvWindow, then the HMAC-SHA256 signature
    fn sign(&self, mut params: Vec<(&str, String)>) -> Result<String, ExchangeError> {
        let creds = self.credentials()?;
        params.push(("timestamp", Utc::now().timestamp_millis().to_string()));
        params.push(("recvWindow", self.recv_window_ms.to_string()));

        let query = serde_urlencoded::to_string(&params)
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        let mut mac = HmacSha256::new_from_slice(creds.api_secret.as_bytes())
            .map_err(|e| ExchangeError::Decode(e.to_string()))?;
        mac.update(query.as_bytes());
        let signature = hex::encode(mac.finalize().into_bytes());
        Ok(format!("{query}&signature={signature}"))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ExchangeError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if let Ok(api) = serde_json::from_str::<ApiErrorBody>(&body) {
                return Err(ExchangeError::from_api(api.code, api.msg));
            }
            if status.as_u16() == 429 || status.as_u16() == 418 {
                return Err(ExchangeError::RateLimited {
                    code: status.as_u16() as i64,
                    message: body,
                });
            }
            return Err(ExchangeError::Rejected {
                code: status.as_u16() as i64,
                message: body,
            });
        }

        Ok(serde_json::from_str(&body)?)
    }

    async fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::trace!(%url, "GET");
        let response = self.http.get(&url).query(params).send().await?;
        Self::decode(response).await
    }

    async fn signed<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: Vec<(&str, String)>,
    ) -> Result<T, ExchangeError> {
        let query = self.sign(params)?;
        let url = format!("{}{}?{}", self.base_url, path, query);
        let api_key = &self.credentials()?.api_key;

        let response = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", api_key)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn max_leverage(&self, symbol: &str) -> Result<u32, ExchangeError> {
        if !self.has_credentials() {
            return Ok(MAX_EXCHANGE_LEVERAGE);
        }
        let brackets: Vec<LeverageBracket> = self
            .signed(
                Method::GET,
                "/fapi/v1/leverageBracket",
                vec![("symbol", symbol.to_string())],
            )
            .await?;
        Ok(brackets
            .first()
            .and_then(|b| b.brackets.iter().map(|x| x.initial_leverage).max())
            .unwrap_or(MAX_EXCHANGE_LEVERAGE))
    }
}

#[async_trait]
impl MarketData for BinanceFuturesClient {
    async fn get_candles(
        &self,
        symbol: &str,
        interval: Interval,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let rows: Vec<Vec<Value>> = self
            .public_get(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        parse_klines(rows)
    }

    async fn get_candles_between(
        &self,
        symbol: &str,
        interval: Interval,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: u32,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let rows: Vec<Vec<Value>> = self
            .public_get(
                "/fapi/v1/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.as_str().to_string()),
                    ("startTime", start.timestamp_millis().to_string()),
                    ("endTime", end.timestamp_millis().to_string()),
                    ("limit", limit.to_string()),
                ],
            )
            .await?;
        parse_klines(rows)
    }

    async fn symbol_rules(&self, symbol: &str) -> Result<SymbolRules, ExchangeError> {
        let info: ExchangeInfo = self.public_get("/fapi/v1/exchangeInfo", &[]).await?;
        let entry = info
            .symbols
            .iter()
            .find(|s| s.symbol == symbol)
            .ok_or_else(|| ExchangeError::UnknownSymbol(symbol.to_string()))?;
        let max_leverage = self.max_leverage(symbol).await?;
        Ok(parse_rules(entry, max_leverage))
    }
}

#[async_trait]
impl Exchange for BinanceFuturesClient {
    async fn get_account(&self) -> Result<AccountState, ExchangeError> {
        let account: AccountResponse = self.signed(Method::GET, "/fapi/v2/account", vec![]).await?;

        let mut state = AccountState::new(account.total_wallet_balance, account.available_balance);
        state.can_trade = account.can_trade;
        for p in account.positions {
            if let Some(lev) = p.leverage.and_then(|l| l.parse::<u32>().ok()) {
                state.leverage_by_symbol.insert(p.symbol, lev);
            }
        }
        Ok(state)
    }

    async fn set_leverage(&self, symbol: &str, leverage: u32) -> Result<(), ExchangeError> {
        let _: Value = self
            .signed(
                Method::POST,
                "/fapi/v1/leverage",
                vec![
                    ("symbol", symbol.to_string()),
                    ("leverage", leverage.to_string()),
                ],
            )
            .await?;
        tracing::info!(symbol, leverage, "Leverage updated");
        Ok(())
    }

    async fn place_market_order(&self, order: OrderRequest) -> Result<OrderFill, ExchangeError> {
        let mut params = vec![
            ("symbol", order.symbol.clone()),
            ("side", order.side.as_str().to_string()),
            ("type", "MARKET".to_string()),
            ("quantity", order.quantity.normalize().to_string()),
            ("newOrderRespType", "RESULT".to_string()),
        ];
        if order.reduce_only {
            params.push(("reduceOnly", "true".to_string()));
        }

        let response: OrderResponse = self.signed(Method::POST, "/fapi/v1/order", params).await?;
        let timestamp = response
            .update_time
            .and_then(DateTime::from_timestamp_millis)
            .unwrap_or_else(Utc::now);

        tracing::info!(
            symbol = %order.symbol,
            side = %order.side,
            order_id = response.order_id,
            avg_price = %response.avg_price,
            quantity = %response.executed_qty,
            "Market order filled"
        );

        Ok(OrderFill {
            order_id: response.order_id.to_string(),
            symbol: order.symbol,
            side: order.side,
            quantity: response.executed_qty,
            price: response.avg_price,
            timestamp,
        })
    }
}
