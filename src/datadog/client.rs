use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::str::FromStr;
use std::time::Duration;

use super::models::*;
use super::retry::RetryPolicy;
use crate::config::{Config, Credentials};
use crate::error::{DeployGuardError, Result};
use crate::utils::mask_secret;

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Which credentials to attach to a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// No authentication headers
    None,
    /// `DD-API-KEY` only
    ApiKey,
    /// `DD-API-KEY` + `DD-APPLICATION-KEY`
    AppKeys,
    /// HTTP basic auth with username/password
    Basic,
    /// Application keys and basic auth together
    Both,
}

impl AuthStyle {
    pub fn label(&self) -> &'static str {
        match self {
            AuthStyle::None => "none",
            AuthStyle::ApiKey => "api-key",
            AuthStyle::AppKeys => "app-keys",
            AuthStyle::Basic => "basic",
            AuthStyle::Both => "app-keys+basic",
        }
    }
}

impl FromStr for AuthStyle {
    type Err = DeployGuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(AuthStyle::None),
            "api-key" | "apikey" => Ok(AuthStyle::ApiKey),
            "app-keys" | "appkeys" | "headers" => Ok(AuthStyle::AppKeys),
            "basic" => Ok(AuthStyle::Basic),
            "both" | "app-keys+basic" => Ok(AuthStyle::Both),
            other => Err(DeployGuardError::InvalidInput(format!(
                "Unknown auth style '{}'. Use none, api-key, app-keys, basic or both",
                other
            ))),
        }
    }
}

/// Status and body of a single un-retried request.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Option<serde_json::Value> {
        serde_json::from_str(&self.body).ok()
    }
}

pub struct DatadogClient {
    client: Client,
    credentials: Credentials,
    api_base_url: String,
    mcp_server_url: String,
    retry: RetryPolicy,
}

impl DatadogClient {
    pub fn new(credentials: Credentials, site: Option<String>, mcp_server_url: String) -> Result<Self> {
        let site = site.unwrap_or_else(|| crate::config::DEFAULT_SITE.to_string());
        Self::with_endpoints(credentials, format!("https://api.{}", site), mcp_server_url)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::with_endpoints(
            config.credentials.clone(),
            config.api_base_url(),
            config.mcp_server_url.clone(),
        )
    }

    pub fn with_endpoints(
        credentials: Credentials,
        api_base_url: String,
        mcp_server_url: String,
    ) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(DeployGuardError::NetworkError)?;

        Ok(Self {
            client,
            credentials,
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            mcp_server_url,
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    pub fn mcp_server_url(&self) -> &str {
        &self.mcp_server_url
    }

    fn authorize(&self, mut request: RequestBuilder, auth: AuthStyle) -> RequestBuilder {
        let with_api_key = matches!(
            auth,
            AuthStyle::ApiKey | AuthStyle::AppKeys | AuthStyle::Both
        );
        let with_app_key = matches!(auth, AuthStyle::AppKeys | AuthStyle::Both);
        let with_basic = matches!(auth, AuthStyle::Basic | AuthStyle::Both);

        if with_api_key && let Some(ref key) = self.credentials.api_key {
            request = request.header("DD-API-KEY", key);
        }
        if with_app_key && let Some(ref key) = self.credentials.app_key {
            request = request.header("DD-APPLICATION-KEY", key);
        }
        if with_basic && let Some((user, pass)) = self.credentials.basic_auth() {
            request = request.basic_auth(user, Some(pass));
        }
        request
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        endpoint: &str,
        query: Option<Vec<(&str, String)>>,
        body: Option<impl Serialize>,
    ) -> Result<T> {
        let url = format!("{}{}", self.api_base_url, endpoint);

        let mut retries = 0;
        loop {
            let mut request = self
                .authorize(self.client.request(method.clone(), &url), AuthStyle::AppKeys)
                .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
                .header("Content-Type", "application/json")
                .header("Accept", "application/json");

            if let Some(ref params) = query {
                request = request.query(params);
            }

            if let Some(ref data) = body {
                request = request.json(data);
            }

            let outcome = match request.send().await {
                Ok(response) => self.handle_response(response).await,
                Err(e) => Err(DeployGuardError::NetworkError(e)),
            };

            match outcome {
                Ok(data) => return Ok(data),
                Err(e) => {
                    if !Self::may_retry(&method, &e) || !self.retry.should_retry(retries) {
                        return Err(e);
                    }

                    retries += 1;
                    log::debug!("Retrying {} {} ({}): {}", method, endpoint, retries, e);
                    tokio::time::sleep(self.retry.backoff(retries)).await;
                }
            }
        }
    }

    /// A POST that may have reached Datadog is never sent twice; only a
    /// failed connect or an error status from the server allows a retry.
    fn may_retry(method: &Method, error: &DeployGuardError) -> bool {
        match error {
            DeployGuardError::NetworkError(e) if !method.is_idempotent() => e.is_connect(),
            e => e.is_retryable(),
        }
    }

    async fn handle_response<T: DeserializeOwned>(&self, response: Response) -> Result<T> {
        let status = response.status();

        if status.is_success() {
            // an undecodable 2xx body is a JsonError, which is never retried
            let text = response.text().await?;
            Ok(serde_json::from_str(&text)?)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            Err(Self::status_error(status, error_text))
        }
    }

    fn status_error(status: StatusCode, error_text: String) -> DeployGuardError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                DeployGuardError::AuthError(error_text)
            }
            StatusCode::TOO_MANY_REQUESTS => DeployGuardError::RateLimitError,
            StatusCode::REQUEST_TIMEOUT => DeployGuardError::TimeoutError,
            _ => DeployGuardError::ApiError(format!("HTTP {}: {}", status, error_text)),
        }
    }

    // ============= MCP Server =============

    /// Open a connection to the MCP server with the application keys.
    pub async fn connect_mcp(&self) -> Result<McpHandshake> {
        log::info!(
            "Connecting to Datadog MCP server at {} (api key {})",
            self.mcp_server_url,
            self.credentials
                .api_key
                .as_deref()
                .map(mask_secret)
                .unwrap_or_else(|| "<none>".to_string())
        );

        let response = self
            .raw(Method::GET, &self.mcp_server_url, AuthStyle::AppKeys, None)
            .await?;

        if !response.is_success() {
            let status = StatusCode::from_u16(response.status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Err(Self::status_error(status, response.body));
        }

        let handshake = McpHandshake::from_body(&response.body);
        if let McpHandshake::Text(_) = handshake {
            log::info!("MCP server answered with a non-JSON body");
        }
        log::debug!("MCP handshake: {}", handshake.preview(100));
        Ok(handshake)
    }

    // ============= Keys / Dashboards =============

    /// Check the API key alone against `/api/v1/validate`.
    pub async fn validate_api_key(&self) -> Result<ValidateResponse> {
        let url = format!("{}/api/v1/validate", self.api_base_url);
        let response = self.raw(Method::GET, &url, AuthStyle::ApiKey, None).await?;

        if !response.is_success() {
            let status = StatusCode::from_u16(response.status)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            return Err(Self::status_error(status, response.body));
        }
        Ok(serde_json::from_str(&response.body)?)
    }

    pub async fn list_dashboards(&self) -> Result<DashboardsResponse> {
        self.request(Method::GET, "/api/v1/dashboard", None, None::<()>)
            .await
    }

    // ============= Monitors =============

    pub async fn list_monitors(&self) -> Result<Vec<Monitor>> {
        self.request(Method::GET, "/api/v1/monitor", None, None::<()>)
            .await
    }

    pub async fn create_monitor(&self, monitor: &MonitorRequest) -> Result<Monitor> {
        self.request(Method::POST, "/api/v1/monitor", None, Some(monitor))
            .await
    }

    // ============= Metrics =============

    pub async fn query_metrics(&self, query: &str, from: i64, to: i64) -> Result<MetricsResponse> {
        let params = vec![
            ("query", query.to_string()),
            ("from", from.to_string()),
            ("to", to.to_string()),
        ];

        self.request(Method::GET, "/api/v1/query", Some(params), None::<()>)
            .await
    }

    // ============= Unretried requests =============

    /// Send exactly one request to an absolute URL and report whatever came back.
    pub async fn raw(
        &self,
        method: Method,
        url: &str,
        auth: AuthStyle,
        body: Option<serde_json::Value>,
    ) -> Result<RawResponse> {
        self.raw_with_headers(method, url, auth, body, &[]).await
    }

    pub async fn raw_with_headers(
        &self,
        method: Method,
        url: &str,
        auth: AuthStyle,
        body: Option<serde_json::Value>,
        headers: &[(&str, &str)],
    ) -> Result<RawResponse> {
        let mut request = self
            .authorize(self.client.request(method, url), auth)
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .header("Content-Type", "application/json")
            .header("Accept", "application/json");

        for &(name, value) in headers {
            request = request.header(name, value);
        }

        if let Some(ref data) = body {
            request = request.json(data);
        }

        let response = request.send().await?;
        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);
        let body = response.text().await.unwrap_or_default();

        Ok(RawResponse {
            status,
            content_type,
            body,
        })
    }

    /// Open a long-lived `text/event-stream` GET. No overall timeout applies.
    pub async fn open_event_stream(&self, url: &str, auth: AuthStyle) -> Result<Response> {
        let response = self
            .authorize(self.client.get(url), auth)
            .header("Accept", "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Self::status_error(status, text));
        }
        Ok(response)
    }
}
