use reqwest::Method;
use serde::Serialize;
use serde_json::{Value, json};
use std::str::FromStr;
use std::sync::Arc;

use super::targets::{candidate_endpoints, mcp_base};
use crate::config::Config;
use crate::datadog::models::Monitor;
use crate::datadog::{AuthStyle, DatadogClient};
use crate::error::{DeployGuardError, Result};
use crate::utils::preview;

const PREVIEW_CHARS: usize = 500;

pub const SESSION_CLIENT_ID: &str = "deployguard-probe";
pub const SESSION_HEADER: &str = "X-MCP-Session-ID";

/// Monitors whose name or message mentions one of these look MCP related.
const RELATED_MONITOR_TERMS: [&str; 2] = ["mcp", "model"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMethod {
    Get,
    Post,
    Put,
}

impl ProbeMethod {
    pub const ALL: [ProbeMethod; 3] = [ProbeMethod::Get, ProbeMethod::Post, ProbeMethod::Put];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Get => "GET",
            ProbeMethod::Post => "POST",
            ProbeMethod::Put => "PUT",
        }
    }

    fn method(&self) -> Method {
        match self {
            ProbeMethod::Get => Method::GET,
            ProbeMethod::Post => Method::POST,
            ProbeMethod::Put => Method::PUT,
        }
    }

    /// Requests with a body send an empty JSON object.
    fn body(&self) -> Option<Value> {
        match self {
            ProbeMethod::Get => None,
            ProbeMethod::Post | ProbeMethod::Put => Some(json!({})),
        }
    }
}

impl FromStr for ProbeMethod {
    type Err = DeployGuardError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(ProbeMethod::Get),
            "POST" => Ok(ProbeMethod::Post),
            "PUT" => Ok(ProbeMethod::Put),
            other => Err(DeployGuardError::InvalidInput(format!(
                "Unsupported probe method '{}'",
                other
            ))),
        }
    }
}

/// Which permutations of endpoint, method and auth to try.
#[derive(Debug, Clone)]
pub struct ProbePlan {
    pub endpoints: Vec<String>,
    pub methods: Vec<ProbeMethod>,
    pub auth_styles: Vec<AuthStyle>,
    pub stop_on_success: bool,
    /// MCP base URL to open a session on when no permutation succeeds.
    pub session_base: Option<String>,
}

impl ProbePlan {
    pub fn for_config(config: &Config) -> Self {
        Self {
            endpoints: candidate_endpoints(&config.mcp_server_url, &config.site),
            methods: ProbeMethod::ALL.to_vec(),
            auth_styles: vec![AuthStyle::AppKeys, AuthStyle::Basic, AuthStyle::Both],
            stop_on_success: false,
            session_base: Some(mcp_base(&config.mcp_server_url).to_string()),
        }
    }

    pub fn len(&self) -> usize {
        self.endpoints.len() * self.methods.len() * self.auth_styles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ProbeOutcome {
    pub endpoint: String,
    pub method: &'static str,
    pub auth: &'static str,
    pub status: Option<u16>,
    pub is_json: bool,
    pub preview: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip)]
    pub body: Option<Value>,
}

impl ProbeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct KeyCheck {
    pub api_key_valid: Option<bool>,
    pub dashboards: Option<usize>,
    pub monitors: Option<usize>,
    /// Names of monitors that mention MCP or a model
    pub related_monitors: Vec<String>,
    pub errors: Vec<String>,
}

fn is_related_monitor(monitor: &Monitor) -> bool {
    let name = monitor.name.to_lowercase();
    let message = monitor.message.as_deref().unwrap_or_default().to_lowercase();
    RELATED_MONITOR_TERMS
        .iter()
        .any(|term| name.contains(term) || message.contains(term))
}

/// Tries endpoint permutations one request at a time. Nothing is retried; a
/// probe reports exactly what one attempt returned.
pub struct Prober {
    client: Arc<DatadogClient>,
}

impl Prober {
    pub fn new(client: Arc<DatadogClient>) -> Self {
        Self { client }
    }

    pub async fn probe(&self, endpoint: &str, method: ProbeMethod, auth: AuthStyle) -> ProbeOutcome {
        self.send(endpoint, method, auth, method.body(), &[]).await
    }

    async fn send(
        &self,
        endpoint: &str,
        method: ProbeMethod,
        auth: AuthStyle,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> ProbeOutcome {
        log::info!("[Probe] {} {} ({})", method.as_str(), endpoint, auth.label());

        let mut outcome = ProbeOutcome {
            endpoint: endpoint.to_string(),
            method: method.as_str(),
            auth: auth.label(),
            status: None,
            is_json: false,
            preview: String::new(),
            error: None,
            body: None,
        };

        match self
            .client
            .raw_with_headers(method.method(), endpoint, auth, body, headers)
            .await
        {
            Ok(response) => {
                outcome.status = Some(response.status);
                outcome.body = response.json();
                outcome.is_json = outcome.body.is_some();
                outcome.preview = preview(&response.body, PREVIEW_CHARS);
                log::info!("[Probe] -> {}", response.status);
            }
            Err(e) => {
                log::warn!("[Probe] -> {}", e);
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }

    pub async fn run(&self, plan: &ProbePlan) -> Vec<ProbeOutcome> {
        let mut outcomes = Vec::with_capacity(plan.len());

        for endpoint in &plan.endpoints {
            for &method in &plan.methods {
                for &auth in &plan.auth_styles {
                    let outcome = self.probe(endpoint, method, auth).await;
                    let success = outcome.is_success();
                    outcomes.push(outcome);

                    if success && plan.stop_on_success {
                        log::info!("[Probe] Found a working endpoint: {}", endpoint);
                        return outcomes;
                    }
                }
            }
        }

        if let Some(base) = &plan.session_base
            && !outcomes.iter().any(ProbeOutcome::is_success)
        {
            log::info!("[Probe] Discovery failed, trying an MCP session");
            outcomes.extend(self.session_fallback(base).await);
        }
        outcomes
    }

    /// Open a session at `{base}/mcp/session` and, given a `session_id`,
    /// list `{base}/mcp/monitors` with it.
    pub async fn session_fallback(&self, base: &str) -> Vec<ProbeOutcome> {
        let base = base.trim_end_matches('/');
        let session = self
            .send(
                &format!("{}/mcp/session", base),
                ProbeMethod::Post,
                AuthStyle::AppKeys,
                Some(json!({"client_id": SESSION_CLIENT_ID})),
                &[],
            )
            .await;

        let session_id = session
            .body
            .as_ref()
            .filter(|_| session.is_success())
            .and_then(|body| body["session_id"].as_str())
            .map(String::from);

        let mut outcomes = vec![session];
        match session_id {
            Some(id) => {
                log::info!("[Probe] Using MCP session {}", id);
                let monitors = self
                    .send(
                        &format!("{}/mcp/monitors", base),
                        ProbeMethod::Get,
                        AuthStyle::AppKeys,
                        None,
                        &[(SESSION_HEADER, id.as_str())],
                    )
                    .await;
                outcomes.push(monitors);
            }
            None => log::warn!("[Probe] No MCP session was opened"),
        }
        outcomes
    }

    /// Validate the API key and count dashboards with the application key.
    pub async fn check_keys(&self) -> Result<KeyCheck> {
        let credentials = self.client.credentials();
        if credentials.api_key.is_none() {
            return Err(DeployGuardError::ConfigError(
                "DATADOG_API_KEY is not set".to_string(),
            ));
        }

        let mut check = KeyCheck::default();
        match self.client.validate_api_key().await {
            Ok(response) => check.api_key_valid = Some(response.valid),
            Err(e) => check.errors.push(format!("validate: {}", e)),
        }

        if credentials.has_app_keys() {
            match self.client.list_dashboards().await {
                Ok(response) => check.dashboards = Some(response.dashboards.len()),
                Err(e) => check.errors.push(format!("dashboards: {}", e)),
            }
        } else {
            check
                .errors
                .push("dashboards: DATADOG_APP_KEY is not set".to_string());
        }

        if credentials.has_app_keys() {
            match self.client.list_monitors().await {
                Ok(monitors) => {
                    check.monitors = Some(monitors.len());
                    check.related_monitors = monitors
                        .into_iter()
                        .filter(is_related_monitor)
                        .map(|monitor| monitor.name)
                        .collect();
                }
                Err(e) => check.errors.push(format!("monitors: {}", e)),
            }
        }
        Ok(check)
    }
}
