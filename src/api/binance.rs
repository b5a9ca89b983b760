use super::{ExchangeError, MarketGateway};
use crate::config::BinanceSettings;
use crate::models::{
    Balance, Candle, ExchangeOrder, LimitOrderRequest, OrderScope, OrderSide, OrderStatus,
    TickerPrice,
};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use governor::{Quota, RateLimiter};
use hmac::{Hmac, Mac};
use reqwest::{Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use sha2::Sha256;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const EXCHANGE_NAME: &str = "binance";

type HmacSha256 = Hmac<Sha256>;

type BinanceRateLimiter = RateLimiter<
    governor::state::direct::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// Binance spot REST client
///
/// Cloneable so every loop can own a handle; clones share the rate limiter.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    api_key: String,
    secret_key: String,
    recv_window_ms: u64,
    rate_limiter: Arc<BinanceRateLimiter>,
}

#[derive(Debug, Deserialize)]
struct PriceResponse {
    symbol: String,
    price: String,
}

#[derive(Debug, Deserialize)]
struct AccountResponse {
    balances: Vec<BalanceResponse>,
}

#[derive(Debug, Deserialize)]
struct BalanceResponse {
    asset: String,
    free: String,
    locked: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderResponse {
    symbol: String,
    order_id: i64,
    price: String,
    orig_qty: String,
    executed_qty: String,
    status: String,
    side: String,
    #[serde(default)]
    time: Option<i64>,
    #[serde(default)]
    transact_time: Option<i64>,
}

impl OrderResponse {
    fn into_order(self) -> std::result::Result<ExchangeOrder, ExchangeError> {
        let side = OrderSide::parse(&self.side).ok_or_else(|| {
            ExchangeError::Malformed(format!("order {} has unknown side {}", self.order_id, self.side))
        })?;

        Ok(ExchangeOrder {
            order_id: self.order_id,
            symbol: self.symbol,
            side,
            status: OrderStatus::parse(&self.status),
            price: self.price,
            orig_qty: self.orig_qty,
            executed_qty: self.executed_qty,
            time_ms: self.time.or(self.transact_time).unwrap_or(0),
        })
    }
}

impl BinanceClient {
    pub fn new(settings: &BinanceSettings) -> Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        let per_minute = NonZeroU32::new(settings.requests_per_minute)
            .ok_or("binance.requests_per_minute must be greater than zero")?;
        let rate_limiter = Arc::new(RateLimiter::direct(Quota::per_minute(per_minute)));

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            secret_key: settings.secret_key.clone(),
            recv_window_ms: settings.recv_window_ms,
            rate_limiter,
        })
    }

    /// Hex-encoded HMAC-SHA256 of `payload` keyed with the secret
    fn sign(&self, payload: &str) -> Result<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret_key.as_bytes())
            .map_err(|e| format!("Invalid signing key: {}", e))?;
        mac.update(payload.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn build_url(&self, path: &str, params: &[(&str, String)], signed: bool) -> Result<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))?;

        {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
            if signed {
                pairs.append_pair("recvWindow", &self.recv_window_ms.to_string());
                pairs.append_pair("timestamp", &Utc::now().timestamp_millis().to_string());
            }
        }

        if signed {
            // The signature covers the query exactly as it goes on the wire
            let payload = url.query().unwrap_or_default().to_string();
            let signature = self.sign(&payload)?;
            url.query_pairs_mut().append_pair("signature", &signature);
        } else if params.is_empty() {
            url.set_query(None);
        }

        Ok(url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
        signed: bool,
    ) -> Result<T> {
        self.rate_limiter.until_ready().await;

        let url = self.build_url(path, params, signed)?;
        tracing::debug!(method = %method, path = %path, "Binance request");

        let mut request = self.client.request(method, url);
        if signed {
            request = request.header("X-MBX-APIKEY", &self.api_key);
        }

        let response = request.send().await.map_err(ExchangeError::from)?;
        let status = response.status();
        let body = response.text().await.map_err(ExchangeError::from)?;

        if !status.is_success() {
            return Err(ExchangeError::from_response(status.as_u16(), &body).into());
        }

        serde_json::from_str(&body)
            .map_err(|e| ExchangeError::Malformed(format!("{}: {}", path, e)).into())
    }

    fn convert_orders(orders: Vec<OrderResponse>) -> Vec<ExchangeOrder> {
        orders
            .into_iter()
            .filter_map(|o| match o.into_order() {
                Ok(order) => Some(order),
                Err(e) => {
                    tracing::warn!("Skipping unreadable order: {}", e);
                    None
                }
            })
            .collect()
    }
}

fn kline_str(row: &[serde_json::Value], idx: usize) -> std::result::Result<String, ExchangeError> {
    row.get(idx)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| ExchangeError::Malformed(format!("kline field {} is not a string", idx)))
}

fn parse_kline(row: &[serde_json::Value]) -> std::result::Result<Candle, ExchangeError> {
    let open_time_ms = row
        .first()
        .and_then(|v| v.as_i64())
        .ok_or_else(|| ExchangeError::Malformed("kline open time missing".to_string()))?;

    Ok(Candle {
        open_time_ms,
        open: kline_str(row, 1)?,
        high: kline_str(row, 2)?,
        low: kline_str(row, 3)?,
        close: kline_str(row, 4)?,
        volume: kline_str(row, 5)?,
    })
}

#[async_trait]
impl MarketGateway for BinanceClient {
    fn exchange(&self) -> &str {
        EXCHANGE_NAME
    }

    async fn list_prices(&self, symbols: &[String]) -> Result<Vec<TickerPrice>> {
        let symbols_json = serde_json::to_string(symbols)?;
        let prices: Vec<PriceResponse> = self
            .request(
                Method::GET,
                "/api/v3/ticker/price",
                &[("symbols", symbols_json)],
                false,
            )
            .await?;

        Ok(prices
            .into_iter()
            .map(|p| TickerPrice {
                symbol: p.symbol,
                price: p.price,
            })
            .collect())
    }

    async fn get_account(&self) -> Result<Vec<Balance>> {
        let account: AccountResponse = self
            .request(Method::GET, "/api/v3/account", &[], true)
            .await?;

        Ok(account
            .balances
            .into_iter()
            .map(|b| Balance {
                asset: b.asset,
                free: b.free,
                locked: b.locked,
            })
            .collect())
    }

    async fn list_candles(&self, symbol: &str, interval: &str, limit: u32) -> Result<Vec<Candle>> {
        let rows: Vec<Vec<serde_json::Value>> = self
            .request(
                Method::GET,
                "/api/v3/klines",
                &[
                    ("symbol", symbol.to_string()),
                    ("interval", interval.to_string()),
                    ("limit", limit.to_string()),
                ],
                false,
            )
            .await?;

        let mut candles = Vec::with_capacity(rows.len());
        for row in &rows {
            candles.push(parse_kline(row)?);
        }

        Ok(candles)
    }

    async fn list_orders(&self, scope: OrderScope<'_>) -> Result<Vec<ExchangeOrder>> {
        let orders: Vec<OrderResponse> = match scope {
            OrderScope::Symbol(symbol) => {
                self.request(
                    Method::GET,
                    "/api/v3/allOrders",
                    &[("symbol", symbol.to_string())],
                    true,
                )
                .await?
            }
            OrderScope::AllOpen => {
                self.request(Method::GET, "/api/v3/openOrders", &[], true)
                    .await?
            }
        };

        Ok(Self::convert_orders(orders))
    }

    async fn place_limit_order(&self, request: &LimitOrderRequest) -> Result<ExchangeOrder> {
        let client_order_id = uuid::Uuid::new_v4().simple().to_string();

        tracing::info!(
            symbol = %request.symbol,
            side = %request.side,
            quantity = %request.quantity,
            price = %request.price,
            client_order_id = %client_order_id,
            "Placing limit order"
        );

        let response: OrderResponse = self
            .request(
                Method::POST,
                "/api/v3/order",
                &[
                    ("symbol", request.symbol.clone()),
                    ("side", request.side.as_exchange_str().to_string()),
                    ("type", "LIMIT".to_string()),
                    ("timeInForce", "GTC".to_string()),
                    ("quantity", request.quantity.clone()),
                    ("price", request.price.clone()),
                    ("newClientOrderId", client_order_id),
                    ("newOrderRespType", "RESULT".to_string()),
                ],
                true,
            )
            .await?;

        Ok(response.into_order()?)
    }

    async fn cancel_order(&self, symbol: &str, order_id: i64) -> Result<()> {
        let _: serde_json::Value = self
            .request(
                Method::DELETE,
                "/api/v3/order",
                &[
                    ("symbol", symbol.to_string()),
                    ("orderId", order_id.to_string()),
                ],
                true,
            )
            .await?;

        tracing::info!("Cancelled order {} on {}", order_id, symbol);
        Ok(())
    }
}

impl std::fmt::Debug for BinanceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("recv_window_ms", &self.recv_window_ms)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn settings(base_url: &str) -> BinanceSettings {
        BinanceSettings {
            api_key: "test-key".to_string(),
            secret_key: "test-secret".to_string(),
            base_url: base_url.to_string(),
            recv_window_ms: 5000,
            requests_per_minute: 1200,
        }
    }

    #[test]
    fn test_signature_matches_documented_example() {
        // Example request from the Binance API documentation
        let mut s = settings("https://api.binance.com");
        s.secret_key =
            "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j".to_string();
        let client = BinanceClient::new(&s).unwrap();

        let signature = client
            .sign("symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559")
            .unwrap();

        assert_eq!(
            signature,
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_signed_url_carries_timestamp_and_signature() {
        let client = BinanceClient::new(&settings("https://api.binance.com/")).unwrap();
        let url = client
            .build_url("/api/v3/account", &[], true)
            .unwrap();

        let query = url.query().unwrap();
        assert!(query.starts_with("recvWindow=5000&timestamp="));
        let (payload, signature) = query.split_once("&signature=").unwrap();
        assert_eq!(signature, client.sign(payload).unwrap());
        assert_eq!(url.path(), "/api/v3/account");
    }

    #[test]
    fn test_debug_redacts_credentials() {
        let client = BinanceClient::new(&settings("https://api.binance.com")).unwrap();
        let printed = format!("{:?}", client);

        assert!(printed.contains("<redacted>"));
        assert!(!printed.contains("test-key"));
        assert!(!printed.contains("test-secret"));
    }

    #[test]
    fn test_zero_rate_limit_rejected() {
        let mut s = settings("https://api.binance.com");
        s.requests_per_minute = 0;
        assert!(BinanceClient::new(&s).is_err());
    }

    #[test]
    fn test_parse_kline_row() {
        let row: Vec<serde_json::Value> = serde_json::from_str(
            r#"[1499040000000,"0.01634790","0.80000000","0.01575800","0.01577100","148976.11427815",1499644799999,"2434.19055334",308,"1756.87402397","28.46694368","0"]"#,
        )
        .unwrap();

        let candle = parse_kline(&row).unwrap();
        assert_eq!(candle.open_time_ms, 1499040000000);
        assert_eq!(candle.high, "0.80000000");
        assert_eq!(candle.low, "0.01575800");

        assert!(parse_kline(&row[..3]).is_err());
    }

    #[tokio::test]
    async fn test_list_prices() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/ticker/price")
            .match_query(Matcher::UrlEncoded(
                "symbols".into(),
                r#"["BTCUSDT","ETHUSDT"]"#.into(),
            ))
            .with_status(200)
            .with_body(r#"[{"symbol":"BTCUSDT","price":"64000.01000000"},{"symbol":"ETHUSDT","price":"3100.50000000"}]"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&settings(&server.url())).unwrap();
        let prices = client
            .list_prices(&["BTCUSDT".to_string(), "ETHUSDT".to_string()])
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(prices.len(), 2);
        assert_eq!(prices[0].symbol, "BTCUSDT");
        assert_eq!(prices[1].price, "3100.50000000");
    }

    #[tokio::test]
    async fn test_get_account_is_signed() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/account")
            .match_header("X-MBX-APIKEY", "test-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex("timestamp=".into()),
                Matcher::Regex("signature=[0-9a-f]{64}".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"makerCommission":15,"balances":[{"asset":"USDT","free":"1000.00000000","locked":"0.00000000"},{"asset":"BTC","free":"0.5","locked":"0.1"}]}"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&settings(&server.url())).unwrap();
        let balances = client.get_account().await.unwrap();

        mock.assert_async().await;
        assert_eq!(balances.len(), 2);
        assert_eq!(balances[0].asset, "USDT");
        assert_eq!(balances[0].free, "1000.00000000");
    }

    #[tokio::test]
    async fn test_place_limit_order() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()),
                Matcher::UrlEncoded("side".into(), "BUY".into()),
                Matcher::UrlEncoded("type".into(), "LIMIT".into()),
                Matcher::UrlEncoded("timeInForce".into(), "GTC".into()),
                Matcher::UrlEncoded("quantity".into(), "1.0417".into()),
                Matcher::UrlEncoded("price".into(), "96".into()),
            ]))
            .with_status(200)
            .with_body(r#"{"symbol":"BTCUSDT","orderId":28,"orderListId":-1,"clientOrderId":"abc","transactTime":1507725176595,"price":"96.00000000","origQty":"1.04170000","executedQty":"0.00000000","cummulativeQuoteQty":"0.00000000","status":"NEW","timeInForce":"GTC","type":"LIMIT","side":"BUY"}"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&settings(&server.url())).unwrap();
        let order = client
            .place_limit_order(&LimitOrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                quantity: "1.0417".to_string(),
                price: "96".to_string(),
            })
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(order.order_id, 28);
        assert_eq!(order.side, OrderSide::Buy);
        assert_eq!(order.status, OrderStatus::New);
        assert_eq!(order.time_ms, 1507725176595);
    }

    #[tokio::test]
    async fn test_api_error_is_classified() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/v3/order")
            .match_query(Matcher::Any)
            .with_status(400)
            .with_body(r#"{"code":-2010,"msg":"Account has insufficient balance for requested action."}"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&settings(&server.url())).unwrap();
        let err = client
            .place_limit_order(&LimitOrderRequest {
                symbol: "BTCUSDT".to_string(),
                side: OrderSide::Buy,
                quantity: "1".to_string(),
                price: "96".to_string(),
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Insufficient balance"));
    }

    #[tokio::test]
    async fn test_list_orders_skips_unknown_side() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/allOrders")
            .match_query(Matcher::UrlEncoded("symbol".into(), "BTCUSDT".into()))
            .with_status(200)
            .with_body(r#"[
                {"symbol":"BTCUSDT","orderId":1,"price":"100.0","origQty":"2.0","executedQty":"2.0","status":"FILLED","side":"BUY","time":1700000000000},
                {"symbol":"BTCUSDT","orderId":2,"price":"101.0","origQty":"1.0","executedQty":"0.0","status":"NEW","side":"???","time":1700000000001}
            ]"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&settings(&server.url())).unwrap();
        let orders = client
            .list_orders(OrderScope::Symbol("BTCUSDT"))
            .await
            .unwrap();

        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order_id, 1);
        assert!(orders[0].status.is_fill());
        assert_eq!(orders[0].executed_qty, "2.0");
    }

    #[tokio::test]
    async fn test_list_open_orders_is_signed_and_unscoped() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v3/openOrders")
            .match_header("X-MBX-APIKEY", "test-key")
            .match_query(Matcher::AllOf(vec![
                Matcher::Regex("^recvWindow=5000&timestamp=".into()),
                Matcher::Regex("signature=[0-9a-f]{64}".into()),
            ]))
            .with_status(200)
            .with_body(r#"[
                {"symbol":"BTCUSDT","orderId":5,"price":"90.0","origQty":"1.0","executedQty":"0.0","status":"NEW","side":"BUY","time":1700000000000},
                {"symbol":"DOGEUSDT","orderId":6,"price":"0.09","origQty":"100.0","executedQty":"40.0","status":"PARTIALLY_FILLED","side":"SELL","time":1700000000001}
            ]"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&settings(&server.url())).unwrap();
        let orders = client.list_orders(OrderScope::AllOpen).await.unwrap();

        mock.assert_async().await;
        assert_eq!(orders.len(), 2);
        assert!(orders.iter().all(|o| o.status.is_open()));
        assert_eq!(orders[1].symbol, "DOGEUSDT");
        assert_eq!(orders[1].side, OrderSide::Sell);
        assert_eq!(orders[1].executed_qty, "40.0");
    }

    #[tokio::test]
    async fn test_list_candles() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/v3/klines")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("symbol".into(), "ETHUSDT".into()),
                Matcher::UrlEncoded("interval".into(), "8h".into()),
                Matcher::UrlEncoded("limit".into(), "1".into()),
            ]))
            .with_status(200)
            .with_body(r#"[[1700000000000,"100.0","110.0","90.0","95.0","12.5",1700028799999,"1200.0",10,"6.0","600.0","0"]]"#)
            .create_async()
            .await;

        let client = BinanceClient::new(&settings(&server.url())).unwrap();
        let candles = client.list_candles("ETHUSDT", "8h", 1).await.unwrap();

        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].high, "110.0");
        assert_eq!(candles[0].low, "90.0");
    }
}
