//! Signed REST client for a Delta-style derivatives exchange.
//!
//! Every call goes through [`DeltaClient::request`]: build the query
//! string, sign `method + timestamp + path + query + body` with a fresh
//! timestamp, send, and retry transport failures and 5xx responses a
//! bounded number of times with a fixed delay. 4xx responses are terminal
//! and come back immediately with the status and raw body preserved.

use async_trait::async_trait;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::sign::RequestSigner;
use super::types::{OrderRequest, OrderSnapshot, PlacedOrder, PositionSnapshot};
use super::ExchangeApi;
use crate::config::ExchangeConfig;
use crate::domain::{OrderId, OrderStatus};
use crate::error::{FlareError, Result};

const API_PREFIX: &str = "/v2";

#[derive(Clone)]
pub struct DeltaClient {
    http: Client,
    base_url: String,
    signer: RequestSigner,
    product_id: i64,
    symbol: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl DeltaClient {
    pub fn new(config: &ExchangeConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent("flare-trading-bot/0.1")
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| FlareError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            signer: RequestSigner::new(config.api_key.clone(), config.api_secret.clone()),
            product_id: config.product_id,
            symbol: config.symbol.clone(),
            max_retries: config.max_retries,
            retry_delay: Duration::from_millis(config.retry_delay_ms),
        })
    }

    pub fn product_id(&self) -> i64 {
        self.product_id
    }

    /// Build the query string with its leading `?`. The same string goes
    /// into the URL and the signature payload.
    fn query_string(query: &[(&str, String)]) -> String {
        if query.is_empty() {
            return String::new();
        }
        let joined: Vec<String> = query
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect();
        format!("?{}", joined.join("&"))
    }

    /// Execute one signed request against the exchange and unwrap the
    /// `{success, result}` envelope.
    pub async fn request(
        &self,
        method: Method,
        endpoint: &str,
        body: Option<String>,
        query: &[(&str, String)],
    ) -> Result<Value> {
        let path = format!("{}{}", API_PREFIX, endpoint);
        let query_string = Self::query_string(query);
        let url = format!("{}{}{}", self.base_url, path, query_string);
        let body_text = body.unwrap_or_default();

        let mut attempt = 0u32;
        loop {
            // Re-sign on every attempt: the exchange rejects stale timestamps.
            let headers = self.signer.build_headers(
                method.as_str(),
                &path,
                &query_string,
                &body_text,
            )?;

            debug!(%method, %url, attempt, "exchange request");

            let mut builder = self.http.request(method.clone(), &url).headers(headers);
            if !body_text.is_empty() {
                builder = builder
                    .header(reqwest::header::CONTENT_TYPE, "application/json")
                    .body(body_text.clone());
            }

            let response = match builder.send().await {
                Ok(response) => response,
                Err(e) => {
                    if attempt < self.max_retries {
                        warn!(error = %e, attempt, "transport error, retrying");
                        attempt += 1;
                        tokio::time::sleep(self.retry_delay).await;
                        continue;
                    }
                    return Err(FlareError::Http(e));
                }
            };

            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if !status.is_success() {
                let err = FlareError::Exchange {
                    status: status.as_u16(),
                    body: text,
                };
                if err.is_retryable() && attempt < self.max_retries {
                    warn!(%status, attempt, "server error, retrying");
                    attempt += 1;
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
                return Err(err);
            }

            let value: Value = serde_json::from_str(&text).map_err(|_| FlareError::Exchange {
                status: status.as_u16(),
                body: text.clone(),
            })?;

            if value.get("success").and_then(Value::as_bool) == Some(false) {
                return Err(FlareError::Exchange {
                    status: status.as_u16(),
                    body: text,
                });
            }

            return Ok(value.get("result").cloned().unwrap_or(Value::Null));
        }
    }

    fn parse_order(result: &Value) -> Result<OrderSnapshot> {
        let id = result
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| FlareError::Internal("order response missing id".to_string()))?;

        let state = result.get("state").and_then(Value::as_str).unwrap_or("");

        Ok(OrderSnapshot {
            id,
            status: OrderStatus::from_exchange_state(state),
            filled_size: result
                .get("size_filled")
                .and_then(Value::as_i64)
                .unwrap_or(0),
            size: result.get("size").and_then(Value::as_i64).unwrap_or(0),
        })
    }

    /// Exchange numerics arrive as strings or JSON numbers depending on
    /// the endpoint; accept both.
    fn decimal_field(value: &Value) -> Option<rust_decimal::Decimal> {
        match value {
            Value::String(s) => s.trim().parse().ok(),
            Value::Number(n) => n.to_string().parse().ok(),
            _ => None,
        }
    }

    fn parse_position(value: &Value) -> Option<PositionSnapshot> {
        let size = value.get("size").and_then(Value::as_i64).unwrap_or(0);
        if size == 0 {
            return None;
        }

        let entry_price = value.get("entry_price").and_then(Self::decimal_field);

        Some(PositionSnapshot {
            size,
            entry_price,
            symbol: value
                .get("product_symbol")
                .and_then(Value::as_str)
                .map(ToString::to_string),
        })
    }

    fn matches_product(&self, value: &Value) -> bool {
        value.get("product_symbol").and_then(Value::as_str) == Some(self.symbol.as_str())
            || value.get("product_id").and_then(Value::as_i64) == Some(self.product_id)
    }
}

#[async_trait]
impl ExchangeApi for DeltaClient {
    async fn place_order(&self, request: &OrderRequest) -> Result<PlacedOrder> {
        let body = serde_json::to_string(request)?;
        let result = self
            .request(Method::POST, "/orders", Some(body), &[])
            .await?;

        let snapshot = Self::parse_order(&result)?;
        Ok(PlacedOrder {
            id: snapshot.id,
            status: snapshot.status,
        })
    }

    async fn order_status(&self, order_id: OrderId) -> Result<OrderSnapshot> {
        let result = self
            .request(Method::GET, &format!("/orders/{}", order_id), None, &[])
            .await?;
        Self::parse_order(&result)
    }

    async fn cancel_order(&self, order_id: OrderId) -> Result<bool> {
        match self
            .request(Method::DELETE, &format!("/orders/{}", order_id), None, &[])
            .await
        {
            Ok(_) => Ok(true),
            // The exchange answered but refused: the order is already in a
            // terminal state. Real transport/auth failures still propagate.
            Err(FlareError::Exchange { status, body }) if status == 200 => {
                debug!(order_id, %body, "cancel refused by exchange");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn open_orders(&self) -> Result<Vec<OrderSnapshot>> {
        let query = [
            ("product_ids", self.product_id.to_string()),
            ("states", "open".to_string()),
        ];
        let result = self.request(Method::GET, "/orders", None, &query).await?;

        let orders = result.as_array().cloned().unwrap_or_default();
        orders.iter().map(Self::parse_order).collect()
    }

    async fn position(&self) -> Result<Option<PositionSnapshot>> {
        // Preferred lookup: /positions/margined needs no parameters.
        match self
            .request(Method::GET, "/positions/margined", None, &[])
            .await
        {
            Ok(result) => {
                if let Some(positions) = result.as_array() {
                    for position in positions {
                        if self.matches_product(position) {
                            if let Some(snapshot) = Self::parse_position(position) {
                                return Ok(Some(snapshot));
                            }
                        }
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "margined position lookup failed, falling back");
            }
        }

        // Fallback: /positions with the required product_id parameter.
        let query = [("product_id", self.product_id.to_string())];
        let result = self.request(Method::GET, "/positions", None, &query).await?;

        Ok(Self::parse_position(&result))
    }
}
