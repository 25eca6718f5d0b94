//! REST implementation of the Relay backend gateway
//!
//! Endpoints, relative to the configured base URL:
//!
//! | call | request | response |
//! |------|---------|----------|
//! | record | `POST /transactions` | `{"backend_id": ..}` or `{"id": ..}` |
//! | history | `GET /modules/{module}/transactions?limit=N` | array of transactions, or `{"transactions": [..]}` |
//! | analytics | `GET /modules/{module}/analytics?period=P` | any JSON document |

use async_trait::async_trait;
use relay_core::{
    AnalyticsPeriod, AnalyticsSnapshot, BackendGateway, BackendReceipt, GatewayError, ModuleId,
    Payload, Transaction,
};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error};

/// Default request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Body sent when recording a transaction
#[derive(Debug, Serialize)]
struct RecordRequest<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    transaction_type: &'a str,
    source: &'a ModuleId,
    targets: &'a [ModuleId],
    payload: &'a Payload,
    timestamp: String,
}

impl<'a> From<&'a Transaction> for RecordRequest<'a> {
    fn from(tx: &'a Transaction) -> Self {
        Self {
            id: tx.id().as_str(),
            transaction_type: tx.transaction_type(),
            source: tx.source(),
            targets: tx.targets(),
            payload: tx.payload(),
            timestamp: tx.timestamp().to_rfc3339(),
        }
    }
}

/// Record acknowledgement; backends answer with either key
#[derive(Debug, Deserialize)]
struct RecordResponse {
    #[serde(default)]
    backend_id: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

impl RecordResponse {
    fn into_receipt(self) -> Result<BackendReceipt, GatewayError> {
        let id = self.backend_id.or(self.id).ok_or_else(|| {
            GatewayError::Decode("response carries neither backend_id nor id".to_string())
        })?;

        match id {
            Value::String(id) => Ok(BackendReceipt::new(id)),
            Value::Number(id) => Ok(BackendReceipt::new(id.to_string())),
            other => Err(GatewayError::Decode(format!(
                "unexpected correlation id: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HistoryResponse {
    Bare(Vec<Transaction>),
    Wrapped { transactions: Vec<Transaction> },
}

impl HistoryResponse {
    fn into_vec(self) -> Vec<Transaction> {
        match self {
            HistoryResponse::Bare(transactions) => transactions,
            HistoryResponse::Wrapped { transactions } => transactions,
        }
    }
}

/// Backend gateway speaking JSON over HTTP
#[derive(Debug, Clone)]
pub struct HttpBackendGateway {
    /// Base URL, without trailing slash
    base_url: String,

    /// Optional bearer token
    api_token: Option<String>,

    /// HTTP client
    client: Client,
}

impl HttpBackendGateway {
    /// Create a gateway for the base URL
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_token: None,
            client,
        })
    }

    /// Send `Authorization: Bearer <token>` with every request
    pub fn with_api_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    /// Base URL requests are made against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn transactions_endpoint(&self) -> String {
        format!("{}/transactions", self.base_url)
    }

    /// `{base}/modules/{module}/{resource}`, with the module id percent-encoded as one segment
    fn module_endpoint(&self, module: &ModuleId, resource: &str) -> Result<Url, GatewayError> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            GatewayError::Transport(format!("invalid base URL {}: {}", self.base_url, e))
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                GatewayError::Transport(format!("base URL {} cannot take a path", self.base_url))
            })?
            .pop_if_empty()
            .extend(["modules", module.as_str(), resource]);
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response, GatewayError> {
        let response = self
            .authorize(request)
            .send()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), message = %message, "Backend rejected request");
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, GatewayError> {
        let body = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Transport(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[async_trait]
impl BackendGateway for HttpBackendGateway {
    async fn record_transaction(
        &self,
        transaction: &Transaction,
    ) -> Result<BackendReceipt, GatewayError> {
        debug!(transaction_id = %transaction.id(), "Recording transaction");

        let request = self
            .client
            .post(self.transactions_endpoint())
            .json(&RecordRequest::from(transaction));
        let response = self.send(request).await?;

        Self::decode::<RecordResponse>(response).await?.into_receipt()
    }

    async fn list_module_transactions(
        &self,
        module: &ModuleId,
        limit: usize,
    ) -> Result<Vec<Transaction>, GatewayError> {
        debug!(module = %module, limit, "Listing module transactions");

        let request = self
            .client
            .get(self.module_endpoint(module, "transactions")?)
            .query(&[("limit", limit.to_string())]);
        let response = self.send(request).await?;

        Ok(Self::decode::<HistoryResponse>(response).await?.into_vec())
    }

    async fn get_module_analytics(
        &self,
        module: &ModuleId,
        period: AnalyticsPeriod,
    ) -> Result<AnalyticsSnapshot, GatewayError> {
        debug!(module = %module, period = %period, "Fetching module analytics");

        let request = self
            .client
            .get(self.module_endpoint(module, "analytics")?)
            .query(&[("period", period.as_str())]);
        let response = self.send(request).await?;

        Ok(AnalyticsSnapshot::new(Self::decode::<Value>(response).await?))
    }
}
