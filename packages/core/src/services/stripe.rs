use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;

use crate::monitor::types::{BalanceEntry, BalanceSnapshot, EventRecord};
use crate::services::error::ProviderError;
use crate::services::provider::{AccountProvider, ProviderResult};

pub const DEFAULT_API_URL: &str = "https://api.stripe.com";
pub const DEFAULT_EVENT_LIMIT: u32 = 10;

#[derive(Clone)]
pub struct StripeClient {
    base_url: String,
    api_key: String,
    event_limit: u32,
    http: Client,
}

impl StripeClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            event_limit: DEFAULT_EVENT_LIMIT,
            http: Client::new(),
        }
    }

    pub fn with_event_limit(mut self, limit: u32) -> Self {
        self.event_limit = limit;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("base_url", &self.base_url)
            .field("event_limit", &self.event_limit)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct StripeBalance {
    #[serde(default)]
    available: Vec<StripeBalanceAmount>,
}

#[derive(Debug, Deserialize)]
struct StripeBalanceAmount {
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct StripeList {
    data: Vec<Value>,
}

impl StripeClient {
    async fn send(&self, request: RequestBuilder) -> ProviderResult<Response> {
        let response = request
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|err| ProviderError::network(err.to_string()))?;

        match response.status() {
            status if status.is_success() => Ok(response),
            status @ (StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) => {
                Err(ProviderError::auth(format!(
                    "upstream rejected the API key (HTTP {})",
                    status.as_u16()
                )))
            }
            StatusCode::TOO_MANY_REQUESTS => Err(ProviderError::RateLimitExceeded),
            status => Err(ProviderError::StatusError {
                status: status.as_u16(),
            }),
        }
    }
}

#[async_trait]
impl AccountProvider for StripeClient {
    async fn fetch_balances(&self) -> ProviderResult<BalanceSnapshot> {
        let url = format!("{}/v1/balance", self.base_url);
        let balance = self
            .send(self.http.get(&url))
            .await?
            .json::<StripeBalance>()
            .await
            .map_err(|err| ProviderError::format(format!("invalid balance body: {}", err)))?;

        Ok(BalanceSnapshot::new(
            balance
                .available
                .into_iter()
                .map(|item| BalanceEntry::new(item.amount, item.currency))
                .collect(),
        ))
    }

    async fn fetch_recent_events(&self) -> ProviderResult<Vec<EventRecord>> {
        let url = format!("{}/v1/events", self.base_url);
        let list = self
            .send(
                self.http
                    .get(&url)
                    .query(&[("limit", self.event_limit.to_string())]),
            )
            .await?
            .json::<StripeList>()
            .await
            .map_err(|err| ProviderError::format(format!("invalid event list body: {}", err)))?;

        list.data.into_iter().map(into_event_record).collect()
    }

    fn provider_name(&self) -> &str {
        "Stripe"
    }
}

fn into_event_record(payload: Value) -> ProviderResult<EventRecord> {
    let id = payload
        .get("id")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| ProviderError::format("event without a string `id` field"))?;

    Ok(EventRecord::new(id, payload))
}
