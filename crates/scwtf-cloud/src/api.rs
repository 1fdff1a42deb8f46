//! JSON API client
//!
//! Thin client over [`HttpTransport`] for the cloud's REST API. Authentication
//! uses the `X-Auth-Token` header carrying the secret key. Error bodies of the
//! form `{"type": "...", "message": "...", "resource": "..."}` are decoded into
//! [`ApiError`] so the classifier can see the typed discriminator.

use crate::error::{ApiError, CloudError, Result};
use crate::http::{HttpRequest, HttpResponse, HttpTransport};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

pub const DEFAULT_API_URL: &str = "https://api.scaleway.com";

const AUTH_HEADER: &str = "x-auth-token";

/// Client for one callback
#[derive(Debug, Clone)]
pub struct ScwClient {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    secret_key: String,
    user_agent: String,
    cancel: CancellationToken,
}

impl ScwClient {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: impl Into<String>,
        secret_key: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            user_agent: user_agent.into(),
            cancel: CancellationToken::new(),
        }
    }

    /// Race every request against `cancel`
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let resp = self.execute("GET", path, &[], None).await?;
        decode(&resp)
    }

    pub async fn get_with_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let resp = self.execute("GET", path, query, None).await?;
        decode(&resp)
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .execute("POST", path, &[], Some(serde_json::to_string(body)?))
            .await?;
        decode(&resp)
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .execute("PATCH", path, &[], Some(serde_json::to_string(body)?))
            .await?;
        decode(&resp)
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let resp = self
            .execute("PUT", path, &[], Some(serde_json::to_string(body)?))
            .await?;
        decode(&resp)
    }

    pub async fn delete(&self, path: &str) -> Result<()> {
        self.execute("DELETE", path, &[], None).await.map(|_| ())
    }

    pub async fn delete_with_query(&self, path: &str, query: &[(&str, String)]) -> Result<()> {
        self.execute("DELETE", path, query, None).await.map(|_| ())
    }

    async fn execute(
        &self,
        method: &str,
        path: &str,
        query: &[(&str, String)],
        body: Option<String>,
    ) -> Result<HttpResponse> {
        let url = self.url(path, query)?;
        let mut request = HttpRequest::new(method, url)
            .with_header(AUTH_HEADER, self.secret_key.clone())
            .with_header("user-agent", self.user_agent.clone());
        if let Some(body) = body {
            request = request.with_json_body(body);
        }

        debug!(method, url = %request.url, "API request");
        let response = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => return Err(CloudError::Cancelled),
            res = self.transport.send(request) => res?,
        };
        debug!(method, path, status = response.status, "API response");

        if response.is_success() {
            Ok(response)
        } else {
            Err(CloudError::Api(parse_error(&response)))
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let mut url = url::Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|e| CloudError::Transport(format!("invalid URL for {path}: {e}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        Ok(url.into())
    }
}

fn decode<T: DeserializeOwned>(resp: &HttpResponse) -> Result<T> {
    if resp.body.trim().is_empty() {
        return Ok(serde_json::from_value(serde_json::Value::Null)?);
    }
    Ok(serde_json::from_str(&resp.body)?)
}

/// Decode a non-2xx response into an [`ApiError`]
pub fn parse_error(resp: &HttpResponse) -> ApiError {
    let body: Option<ErrorBody> = serde_json::from_str(&resp.body).ok();
    let message = body
        .as_ref()
        .and_then(|b| b.message.clone())
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| resp.body.trim().to_string());

    let mut err = ApiError::new(resp.status, message);
    if let Some(body) = body {
        if let Some(t) = body.error_type {
            err = err.with_type(t);
        }
        if let Some(r) = body.resource {
            err = err.with_resource(r);
        }
    }
    if let Some(secs) = resp
        .header("retry-after")
        .and_then(|v| v.trim().parse::<u64>().ok())
    {
        err = err.with_retry_after(Duration::from_secs(secs));
    }
    err
}

// ============ API Types ============

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "type")]
    error_type: Option<String>,
    #[serde(default)]
    resource: Option<String>,
}
