use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::config::Config;
use crate::logger::{RequestObserver, RequestRecord, redact};
use crate::models::{ClaimBody, RedeemBody};

/// Transport error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced an HTTP response
    #[error("connection error: {0}")]
    Transport(String),

    /// The request body could not be serialized
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Transport(err.to_string())
    }
}

/// Result type for transport operations
pub type ApiResult<T> = Result<T, ApiError>;

/// Transport-level reply from the promotions API.
///
/// The body is kept both as raw text and, when it parses, as JSON; a
/// non-JSON body is retained as text for diagnostics.
#[derive(Debug, Clone)]
pub struct ApiReply {
    pub status: u16,
    pub text: String,
    pub json: Option<Value>,
}

impl ApiReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Server-provided message: the body's `message` field, else `error`,
    /// else the non-empty raw body text
    pub fn server_message(&self) -> Option<String> {
        let from_json = self.json.as_ref().and_then(|json| {
            json.get("message")
                .and_then(Value::as_str)
                .or_else(|| json.get("error").and_then(Value::as_str))
                .map(str::to_string)
        });

        from_json.or_else(|| {
            let text = self.text.trim();
            (!text.is_empty()).then(|| text.to_string())
        })
    }
}

/// The three promotions API operations used by the redemption flow
#[async_trait]
pub trait PromoApi: Send + Sync {
    async fn info(&self, code: &str) -> ApiResult<ApiReply>;
    async fn claim(&self, code: &str, body: &ClaimBody) -> ApiResult<ApiReply>;
    async fn redeem(&self, code: &str, body: &RedeemBody) -> ApiResult<ApiReply>;
}

/// HTTP transport against the configured promotions API
pub struct HttpPromoApi {
    config: Config,
    http_client: Client,
    observer: Arc<dyn RequestObserver>,
}

impl HttpPromoApi {
    pub fn new(config: Config, observer: Arc<dyn RequestObserver>) -> anyhow::Result<Self> {
        let http_client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.http_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            config,
            http_client,
            observer,
        })
    }

    fn qr_url(&self, code: &str, suffix: &str) -> String {
        format!(
            "{}/api/v1/promotions/qrs/{}{}",
            self.config.api_base,
            urlencoding::encode(code),
            suffix
        )
    }

    async fn execute(
        &self,
        method: Method,
        url: String,
        body: Option<Value>,
    ) -> ApiResult<ApiReply> {
        let started = Instant::now();

        let mut request = self
            .http_client
            .request(method.clone(), &url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header(reqwest::header::ACCEPT, "application/json");

        if let Some(ref json) = body {
            request = request.json(json);
        }

        let result = async {
            let response = request.send().await?;
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            let json = serde_json::from_str::<Value>(&text).ok();

            Ok::<ApiReply, ApiError>(ApiReply { status, text, json })
        }
        .await;

        let record = RequestRecord {
            ts: chrono::Utc::now().to_rfc3339(),
            method: method.to_string(),
            url,
            request_body: body.as_ref().map(redact),
            status: result.as_ref().ok().map(|reply| reply.status),
            response_text: result.as_ref().ok().map(|reply| reply.text.clone()),
            response_json: result.as_ref().ok().and_then(|reply| reply.json.clone()),
            error: result.as_ref().err().map(|err| err.to_string()),
            duration_ms: started.elapsed().as_millis() as u64,
        };
        self.observer.record(&record);

        result
    }
}

#[async_trait]
impl PromoApi for HttpPromoApi {
    async fn info(&self, code: &str) -> ApiResult<ApiReply> {
        self.execute(Method::GET, self.qr_url(code, ""), None).await
    }

    async fn claim(&self, code: &str, body: &ClaimBody) -> ApiResult<ApiReply> {
        let body = serde_json::to_value(body)?;
        self.execute(Method::POST, self.qr_url(code, "/claim"), Some(body))
            .await
    }

    async fn redeem(&self, code: &str, body: &RedeemBody) -> ApiResult<ApiReply> {
        let body = serde_json::to_value(body)?;
        self.execute(Method::POST, self.qr_url(code, "/redeem"), Some(body))
            .await
    }
}
