//! Bitget USDT-margined perpetual futures adapter (REST v2 "mix" API).
//!
//! Private requests are signed with HMAC-SHA256 over
//! `timestamp + METHOD + path[?query] + body`, base64-encoded, and sent with
//! the account passphrase. Every response is wrapped in a
//! `{code, msg, data}` envelope where `"00000"` means success.

use super::{Exchange, ExchangeError};
use crate::domain::{
    Balance, Candle, Instrument, MarginMode, OrderAck, OrderInstruction, OrderKind, Pair, Position,
    Timeframe,
};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::DateTime;
use hmac::{Hmac, Mac};
use reqwest::blocking::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sha2::Sha256;
use std::collections::HashMap;
use std::fmt;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, info};

type HmacSha256 = Hmac<Sha256>;

const SUCCESS: &str = "00000";
/// "No order to cancel": cancelling an already-empty book.
const NOTHING_TO_CANCEL: &str = "22001";

/// API credentials. Passed explicitly; never read from process state here.
#[derive(Clone)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
    pub passphrase: String,
}

impl Credentials {
    pub fn new(
        api_key: impl Into<String>,
        api_secret: impl Into<String>,
        passphrase: impl Into<String>,
    ) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
            passphrase: passphrase.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &"<redacted>")
            .field("api_secret", &"<redacted>")
            .field("passphrase", &"<redacted>")
            .finish()
    }
}

/// Which price a plan order watches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerPriceType {
    Mark,
    Fill,
}

impl TriggerPriceType {
    fn as_venue_str(&self) -> &'static str {
        match self {
            TriggerPriceType::Mark => "mark_price",
            TriggerPriceType::Fill => "fill_price",
        }
    }
}

/// Venue connection settings (`[venue]` table of the bot config).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct VenueConfig {
    pub base_url: String,
    pub product_type: String,
    pub margin_coin: String,
    pub trigger_price_type: TriggerPriceType,
    pub timeout_secs: u64,
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.bitget.com".into(),
            product_type: "USDT-FUTURES".into(),
            margin_coin: "USDT".into(),
            trigger_price_type: TriggerPriceType::Mark,
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    msg: String,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContractInfo {
    symbol: String,
    base_coin: String,
    quote_coin: String,
    price_place: String,
    volume_place: String,
    min_trade_num: String,
    #[serde(default)]
    size_multiplier: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionInfo {
    symbol: String,
    total: String,
    hold_side: String,
    #[serde(default)]
    open_price_avg: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountInfo {
    margin_coin: String,
    account_equity: String,
    available: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResult {
    order_id: String,
    #[serde(default)]
    client_oid: Option<String>,
}

pub struct BitgetExchange {
    client: Client,
    config: VenueConfig,
    credentials: Credentials,
    instruments: HashMap<Pair, Instrument>,
    closed: bool,
}

impl BitgetExchange {
    pub fn new(credentials: Credentials, config: VenueConfig) -> Result<Self, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ExchangeError::Network(format!("build HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            credentials,
            instruments: HashMap::new(),
            closed: false,
        })
    }

    fn ensure_open(&self) -> Result<(), ExchangeError> {
        if self.closed {
            Err(ExchangeError::Closed)
        } else {
            Ok(())
        }
    }

    fn public_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        self.ensure_open()?;
        let request_path = with_query(path, query);
        let url = format!("{}{}", self.config.base_url, request_path);
        debug!(%request_path, "bitget GET");
        let resp = self.client.get(url).send()?;
        decode(resp)
    }

    fn private_get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ExchangeError> {
        self.ensure_open()?;
        let request_path = with_query(path, query);
        let url = format!("{}{}", self.config.base_url, request_path);
        let timestamp = timestamp_ms()?;
        let signature = sign(
            &self.credentials.api_secret,
            &prehash(&timestamp, "GET", &request_path, ""),
        )?;
        debug!(%request_path, "bitget signed GET");
        let resp = self
            .client
            .get(url)
            .header("ACCESS-KEY", &self.credentials.api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", timestamp)
            .header("ACCESS-PASSPHRASE", &self.credentials.passphrase)
            .header("locale", "en-US")
            .send()?;
        decode(resp)
    }

    fn private_post<T: DeserializeOwned>(&self, path: &str, body: &Value) -> Result<T, ExchangeError> {
        self.ensure_open()?;
        let url = format!("{}{}", self.config.base_url, path);
        let body = serde_json::to_string(body)?;
        let timestamp = timestamp_ms()?;
        let signature = sign(
            &self.credentials.api_secret,
            &prehash(&timestamp, "POST", path, &body),
        )?;
        debug!(path, "bitget signed POST");
        let resp = self
            .client
            .post(url)
            .header("ACCESS-KEY", &self.credentials.api_key)
            .header("ACCESS-SIGN", signature)
            .header("ACCESS-TIMESTAMP", timestamp)
            .header("ACCESS-PASSPHRASE", &self.credentials.passphrase)
            .header("Content-Type", "application/json")
            .header("locale", "en-US")
            .body(body)
            .send()?;
        decode(resp)
    }

    /// POST whose "nothing to cancel" reply counts as success.
    fn cancel_post(&self, path: &str, body: &Value) -> Result<(), ExchangeError> {
        match self.private_post::<Value>(path, body) {
            Ok(_) => Ok(()),
            Err(ExchangeError::Api { code, .. }) if code == NOTHING_TO_CANCEL => Ok(()),
            Err(err) => Err(err),
        }
    }

    fn order_body(
        &self,
        pair: &Pair,
        order: &OrderInstruction,
        margin_mode: MarginMode,
    ) -> Result<serde_json::Map<String, Value>, ExchangeError> {
        let instrument = self.instrument(pair)?;
        let mut body = serde_json::Map::new();
        body.insert("symbol".into(), json!(pair.venue_symbol()));
        body.insert("productType".into(), json!(self.config.product_type));
        body.insert("marginMode".into(), json!(margin_mode_str(margin_mode)));
        body.insert("marginCoin".into(), json!(self.config.margin_coin));
        body.insert("size".into(), json!(instrument.format_size(order.size)));
        body.insert("side".into(), json!(order.side.as_str()));
        body.insert("orderType".into(), json!(order.kind.as_str()));
        body.insert(
            "reduceOnly".into(),
            json!(if order.reduce_only { "YES" } else { "NO" }),
        );
        body.insert("clientOid".into(), json!(order.client_order_id.as_str()));
        if let (OrderKind::Limit, Some(price)) = (order.kind, order.price) {
            body.insert("price".into(), json!(instrument.format_price(price)));
        }
        Ok(body)
    }
}

fn margin_mode_str(mode: MarginMode) -> &'static str {
    match mode {
        MarginMode::Isolated => "isolated",
        MarginMode::Cross => "crossed",
    }
}

fn granularity(timeframe: Timeframe) -> &'static str {
    match timeframe {
        Timeframe::M1 => "1m",
        Timeframe::M3 => "3m",
        Timeframe::M5 => "5m",
        Timeframe::M15 => "15m",
        Timeframe::M30 => "30m",
        Timeframe::H1 => "1H",
        Timeframe::H4 => "4H",
        Timeframe::D1 => "1D",
    }
}

fn with_query(path: &str, query: &[(&str, String)]) -> String {
    if query.is_empty() {
        return path.to_string();
    }
    let qs = query
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join("&");
    format!("{path}?{qs}")
}

fn timestamp_ms() -> Result<String, ExchangeError> {
    let ms = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| ExchangeError::Auth(format!("system clock before epoch: {e}")))?
        .as_millis();
    Ok(ms.to_string())
}

fn prehash(timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
    format!("{timestamp}{method}{request_path}{body}")
}

fn sign(secret: &str, prehash: &str) -> Result<String, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::Auth(format!("invalid API secret: {e}")))?;
    mac.update(prehash.as_bytes());
    Ok(BASE64.encode(mac.finalize().into_bytes()))
}

fn decode<T: DeserializeOwned>(resp: reqwest::blocking::Response) -> Result<T, ExchangeError> {
    let status = resp.status();
    let text = resp.text()?;
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(ExchangeError::Auth(format!("HTTP {status}: {text}")));
    }
    let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
        ExchangeError::Decode(format!("HTTP {status}: {e}: {}", truncate(&text, 200)))
    })?;
    open_envelope(envelope)
}

fn open_envelope<T>(envelope: Envelope<T>) -> Result<T, ExchangeError> {
    if envelope.code != SUCCESS {
        return Err(ExchangeError::Api {
            code: envelope.code,
            msg: envelope.msg,
        });
    }
    envelope
        .data
        .ok_or_else(|| ExchangeError::Decode("success response without data".into()))
}

fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

fn parse_num(field: &str, raw: &str) -> Result<f64, ExchangeError> {
    raw.trim()
        .parse::<f64>()
        .map_err(|e| ExchangeError::Decode(format!("{field} '{raw}': {e}")))
}

/// Candle rows are `[ts_ms, open, high, low, close, base_volume, quote_volume]`.
fn parse_candle_row(row: &[String]) -> Result<Candle, ExchangeError> {
    if row.len() < 6 {
        return Err(ExchangeError::Decode(format!(
            "candle row has {} fields, expected at least 6",
            row.len()
        )));
    }
    let ts = row[0]
        .parse::<i64>()
        .map_err(|e| ExchangeError::Decode(format!("candle timestamp '{}': {e}", row[0])))?;
    let open_time = DateTime::from_timestamp_millis(ts)
        .ok_or_else(|| ExchangeError::Decode(format!("candle timestamp {ts} out of range")))?;
    Ok(Candle {
        open_time,
        open: parse_num("open", &row[1])?,
        high: parse_num("high", &row[2])?,
        low: parse_num("low", &row[3])?,
        close: parse_num("close", &row[4])?,
        volume: parse_num("volume", &row[5])?,
    })
}

fn parse_contract(info: &ContractInfo) -> Result<Instrument, ExchangeError> {
    let pair = Pair::new(format!("{}/{}", info.base_coin, info.quote_coin))
        .map_err(|e| ExchangeError::MarketLoad(e.to_string()))?;
    let price_places = info
        .price_place
        .parse::<u32>()
        .map_err(|e| ExchangeError::MarketLoad(format!("{} pricePlace: {e}", info.symbol)))?;
    let size_places = info
        .volume_place
        .parse::<u32>()
        .map_err(|e| ExchangeError::MarketLoad(format!("{} volumePlace: {e}", info.symbol)))?;
    let min_size = parse_num("minTradeNum", &info.min_trade_num)
        .map_err(|e| ExchangeError::MarketLoad(e.to_string()))?;
    let base = Instrument::from_places(pair.clone(), price_places, size_places, min_size)
        .map_err(|e| ExchangeError::MarketLoad(e.to_string()))?;
    match info.size_multiplier.as_deref().map(|m| m.parse::<f64>()) {
        Some(Ok(lot)) if lot > 0.0 => Instrument::new(pair, base.tick_size, lot, min_size)
            .map_err(|e| ExchangeError::MarketLoad(e.to_string())),
        _ => Ok(base),
    }
}

fn reject_on_api(err: ExchangeError) -> ExchangeError {
    match err {
        ExchangeError::Api { code, msg } => ExchangeError::OrderRejected {
            reason: format!("{code}: {msg}"),
        },
        other => other,
    }
}

impl Exchange for BitgetExchange {
    fn name(&self) -> &str {
        "bitget"
    }

    fn load_market_metadata(&mut self) -> Result<(), ExchangeError> {
        let contracts: Vec<ContractInfo> = self
            .public_get(
                "/api/v2/mix/market/contracts",
                &[("productType", self.config.product_type.clone())],
            )
            .map_err(|e| match e {
                ExchangeError::MarketLoad(_) | ExchangeError::Closed => e,
                other => ExchangeError::MarketLoad(other.to_string()),
            })?;
        let mut instruments = HashMap::with_capacity(contracts.len());
        for info in &contracts {
            let instrument = parse_contract(info)?;
            instruments.insert(instrument.pair.clone(), instrument);
        }
        info!(contracts = instruments.len(), "bitget markets loaded");
        self.instruments = instruments;
        Ok(())
    }

    fn instrument(&self, pair: &Pair) -> Result<Instrument, ExchangeError> {
        self.instruments
            .get(pair)
            .cloned()
            .ok_or_else(|| ExchangeError::UnknownPair(pair.to_string()))
    }

    fn configure_margin(
        &mut self,
        pair: &Pair,
        mode: MarginMode,
        leverage: u32,
    ) -> Result<(), ExchangeError> {
        let symbol = pair.venue_symbol();
        let _: Value = self.private_post(
            "/api/v2/mix/account/set-margin-mode",
            &json!({
                "symbol": symbol,
                "productType": self.config.product_type,
                "marginCoin": self.config.margin_coin,
                "marginMode": margin_mode_str(mode),
            }),
        )?;
        let _: Value = self.private_post(
            "/api/v2/mix/account/set-leverage",
            &json!({
                "symbol": symbol,
                "productType": self.config.product_type,
                "marginCoin": self.config.margin_coin,
                "leverage": leverage.to_string(),
            }),
        )?;
        info!(%pair, %mode, leverage, "margin configured");
        Ok(())
    }

    fn fetch_ohlcv(
        &mut self,
        pair: &Pair,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Candle>, ExchangeError> {
        let rows: Vec<Vec<String>> = self.public_get(
            "/api/v2/mix/market/candles",
            &[
                ("symbol", pair.venue_symbol()),
                ("productType", self.config.product_type.clone()),
                ("granularity", granularity(timeframe).to_string()),
                ("limit", limit.to_string()),
            ],
        )?;
        let mut candles = rows
            .iter()
            .map(|row| parse_candle_row(row))
            .collect::<Result<Vec<_>, _>>()?;
        if let Some(bad) = candles.iter().find(|c| !c.is_sane()) {
            return Err(ExchangeError::Decode(format!(
                "inconsistent candle at {}",
                bad.open_time
            )));
        }
        candles.sort_by_key(|c| c.open_time);
        candles.dedup_by_key(|c| c.open_time);
        let excess = candles.len().saturating_sub(limit);
        candles.drain(..excess);
        Ok(candles)
    }

    fn cancel_conditional_orders(&mut self, pair: &Pair) -> Result<(), ExchangeError> {
        self.cancel_post(
            "/api/v2/mix/order/cancel-plan-order",
            &json!({
                "symbol": pair.venue_symbol(),
                "productType": self.config.product_type,
                "marginCoin": self.config.margin_coin,
                "planType": "normal_plan",
            }),
        )
    }

    fn cancel_open_orders(&mut self, pair: &Pair) -> Result<(), ExchangeError> {
        self.cancel_post(
            "/api/v2/mix/order/cancel-all-orders",
            &json!({
                "symbol": pair.venue_symbol(),
                "productType": self.config.product_type,
                "marginCoin": self.config.margin_coin,
            }),
        )
    }

    fn fetch_open_positions(&mut self, pairs: &[Pair]) -> Result<Vec<Position>, ExchangeError> {
        let rows: Vec<PositionInfo> = self.private_get(
            "/api/v2/mix/position/all-position",
            &[
                ("productType", self.config.product_type.clone()),
                ("marginCoin", self.config.margin_coin.clone()),
            ],
        )?;
        let mut positions = Vec::new();
        for row in &rows {
            let Some(pair) = pairs.iter().find(|p| p.venue_symbol() == row.symbol) else {
                continue;
            };
            let total = parse_num("total", &row.total)?;
            if total == 0.0 {
                continue;
            }
            let size = if row.hold_side == "short" { -total } else { total };
            let entry_price = match row.open_price_avg.as_deref() {
                Some(raw) => parse_num("openPriceAvg", raw)?,
                None => f64::NAN,
            };
            positions.push(Position {
                pair: pair.clone(),
                size,
                entry_price,
            });
        }
        Ok(positions)
    }

    fn fetch_balance(&mut self) -> Result<Balance, ExchangeError> {
        let accounts: Vec<AccountInfo> = self.private_get(
            "/api/v2/mix/account/accounts",
            &[("productType", self.config.product_type.clone())],
        )?;
        let account = accounts
            .iter()
            .find(|a| a.margin_coin.eq_ignore_ascii_case(&self.config.margin_coin))
            .ok_or_else(|| {
                ExchangeError::Decode(format!("no {} futures account", self.config.margin_coin))
            })?;
        Ok(Balance {
            total: parse_num("accountEquity", &account.account_equity)?,
            available: parse_num("available", &account.available)?,
        })
    }

    fn submit_order(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
        margin_mode: MarginMode,
    ) -> Result<OrderAck, ExchangeError> {
        let mut body = self.order_body(pair, order, margin_mode)?;
        body.insert("force".into(), json!("gtc"));
        let result: OrderResult = self
            .private_post("/api/v2/mix/order/place-order", &Value::Object(body))
            .map_err(reject_on_api)?;
        Ok(OrderAck {
            order_id: result.order_id,
            client_order_id: result.client_oid,
        })
    }

    fn submit_trigger_order(
        &mut self,
        pair: &Pair,
        order: &OrderInstruction,
        margin_mode: MarginMode,
    ) -> Result<OrderAck, ExchangeError> {
        let trigger = order.trigger_price.ok_or_else(|| ExchangeError::OrderRejected {
            reason: "trigger order without trigger price".into(),
        })?;
        let instrument = self.instrument(pair)?;
        let mut body = self.order_body(pair, order, margin_mode)?;
        body.insert("planType".into(), json!("normal_plan"));
        body.insert("triggerPrice".into(), json!(instrument.format_price(trigger)));
        body.insert(
            "triggerType".into(),
            json!(self.config.trigger_price_type.as_venue_str()),
        );
        let result: OrderResult = self
            .private_post("/api/v2/mix/order/place-plan-order", &Value::Object(body))
            .map_err(reject_on_api)?;
        Ok(OrderAck {
            order_id: result.order_id,
            client_order_id: result.client_oid,
        })
    }

    fn close(&mut self) -> Result<(), ExchangeError> {
        self.closed = true;
        self.instruments.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{ClientOrderId, OrderRole, Side};

    #[test]
    fn signature_matches_reference_vector() {
        let pre = prehash(
            "1700000000000",
            "GET",
            "/api/v2/mix/account/accounts?productType=USDT-FUTURES",
            "",
        );
        assert_eq!(
            sign("secret", &pre).unwrap(),
            "n3kHTP7IOoneFzjsuyF3xwNNR4yjiwprgGfqZHfwLJ4="
        );
        let pre = prehash(
            "1700000000000",
            "POST",
            "/api/v2/mix/order/place-order",
            r#"{"symbol":"BTCUSDT"}"#,
        );
        assert_eq!(
            sign("secret", &pre).unwrap(),
            "C/vSpmkAdkJHFrpOiYGEkV5HK8LKTTJ44CrlBsnfknQ="
        );
    }

    #[test]
    fn query_string_is_joined_in_order() {
        let path = with_query(
            "/api/v2/mix/market/candles",
            &[("symbol", "BTCUSDT".into()), ("limit", "50".into())],
        );
        assert_eq!(path, "/api/v2/mix/market/candles?symbol=BTCUSDT&limit=50");
        assert_eq!(with_query("/x", &[]), "/x");
    }

    #[test]
    fn candle_row_parses() {
        let row: Vec<String> = ["1704067200000", "42000.5", "42100", "41950", "42050.1", "12.3", "517000"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let candle = parse_candle_row(&row).unwrap();
        assert_eq!(candle.open_time.timestamp_millis(), 1_704_067_200_000);
        assert_eq!(candle.close, 42050.1);
        assert_eq!(candle.volume, 12.3);
    }

    #[test]
    fn short_candle_row_is_decode_error() {
        let row = vec!["1704067200000".to_string(), "1".to_string()];
        assert!(matches!(parse_candle_row(&row), Err(ExchangeError::Decode(_))));
    }

    #[test]
    fn envelope_error_maps_to_api_error() {
        let env: Envelope<Value> =
            serde_json::from_str(r#"{"code":"40762","msg":"balance not enough","data":null}"#)
                .unwrap();
        let err = open_envelope(env).unwrap_err();
        assert_eq!(
            err,
            ExchangeError::Api {
                code: "40762".into(),
                msg: "balance not enough".into()
            }
        );
        assert!(matches!(reject_on_api(err), ExchangeError::OrderRejected { .. }));
    }

    #[test]
    fn contract_maps_to_instrument() {
        let info: ContractInfo = serde_json::from_str(
            r#"{"symbol":"BTCUSDT","baseCoin":"BTC","quoteCoin":"USDT","pricePlace":"1",
                "volumePlace":"4","minTradeNum":"0.0001","sizeMultiplier":"0.0001"}"#,
        )
        .unwrap();
        let inst = parse_contract(&info).unwrap();
        assert_eq!(inst.pair, Pair::new("BTC/USDT").unwrap());
        assert_eq!(inst.tick_size, 0.1);
        assert_eq!(inst.lot_size, 0.0001);
        assert_eq!(inst.min_size, 0.0001);
    }

    #[test]
    fn granularity_uses_venue_casing() {
        assert_eq!(granularity(Timeframe::M5), "5m");
        assert_eq!(granularity(Timeframe::H4), "4H");
        assert_eq!(granularity(Timeframe::D1), "1D");
    }

    #[test]
    fn order_body_formats_limit_trigger_leg() {
        let mut ex = BitgetExchange::new(Credentials::new("k", "s", "p"), VenueConfig::default())
            .unwrap();
        let pair = Pair::new("BTC/USDT").unwrap();
        ex.instruments.insert(
            pair.clone(),
            Instrument::new(pair.clone(), 0.1, 0.001, 0.001).unwrap(),
        );
        let order = OrderInstruction {
            role: OrderRole::TakeProfit,
            side: Side::Sell,
            kind: OrderKind::Limit,
            price: Some(43210.04),
            trigger_price: Some(43210.04),
            size: 0.1234,
            reduce_only: true,
            client_order_id: ClientOrderId("abc".into()),
        };
        let body = ex.order_body(&pair, &order, MarginMode::Isolated).unwrap();
        assert_eq!(body["symbol"], "BTCUSDT");
        assert_eq!(body["marginMode"], "isolated");
        assert_eq!(body["size"], "0.123");
        assert_eq!(body["price"], "43210.0");
        assert_eq!(body["reduceOnly"], "YES");
        assert_eq!(body["side"], "sell");
        assert_eq!(body["orderType"], "limit");
        assert_eq!(body["clientOid"], "abc");
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let creds = Credentials::new("key-123", "secret-456", "pass-789");
        let dbg = format!("{creds:?}");
        assert!(!dbg.contains("key-123"));
        assert!(!dbg.contains("secret-456"));
        assert!(!dbg.contains("pass-789"));
    }

    #[test]
    fn calls_fail_after_close() {
        let mut ex = BitgetExchange::new(Credentials::new("k", "s", "p"), VenueConfig::default())
            .unwrap();
        ex.close().unwrap();
        assert_eq!(ex.fetch_balance().unwrap_err(), ExchangeError::Closed);
    }
}
