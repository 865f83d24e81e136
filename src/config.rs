use serde::Deserialize;
use std::collections::HashMap;
use std::env;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use crate::error::{DeployGuardError, Result};
use crate::utils::mask_secret;

pub const DEFAULT_MCP_SERVER_URL: &str = "https://mcp.datadoghq.com/api/unstable/mcp-server/mcp";
pub const DEFAULT_SITE: &str = "datadoghq.com";
pub const DEFAULT_MCP_CONFIG_PATH: &str = "mcp-config.json";
pub const DEFAULT_MODEL: &str = "CustomerChurn-v3";
pub const DEFAULT_POLICY: &str = "Internal Fairness Policy v2.1";
pub const DEFAULT_METRIC: &str = "fairness_score";
pub const DEFAULT_THRESHOLD: f64 = 0.8;
pub const DEFAULT_METRICS_WINDOW: &str = "1 hour ago";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Datadog credentials. Any of them may be absent.
#[derive(Clone, Default)]
pub struct Credentials {
    pub api_key: Option<String>,
    pub app_key: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, app_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            app_key: Some(app_key.into()),
            ..Default::default()
        }
    }

    /// Both the API key and the application key are present.
    pub fn has_app_keys(&self) -> bool {
        self.api_key.is_some() && self.app_key.is_some()
    }

    pub fn basic_auth(&self) -> Option<(&str, &str)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.as_str(), p.as_str())),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("api_key", &self.api_key.as_deref().map(mask_secret))
            .field("app_key", &self.app_key.as_deref().map(mask_secret))
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .finish()
    }
}

/// `mcp-config.json` layout: `{"mcpServers": {"datadog": {"type": "http", "url": "..."}}}`
#[derive(Debug, Deserialize)]
pub struct McpConfigFile {
    #[serde(rename = "mcpServers", default)]
    pub mcp_servers: HashMap<String, McpServerEntry>,
}

#[derive(Debug, Deserialize)]
pub struct McpServerEntry {
    #[serde(rename = "type")]
    pub transport: Option<String>,
    pub url: Option<String>,
}

impl McpConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn datadog_url(&self) -> Option<&str> {
        self.mcp_servers
            .get("datadog")
            .and_then(|entry| entry.url.as_deref())
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub credentials: Credentials,
    pub site: String,
    pub mcp_server_url: String,
    pub model_name: String,
    pub policy_document: String,
    pub blocked_models: Vec<String>,
    pub metric: String,
    pub threshold: f64,
    pub metrics_window: String,
    pub pacing_scale: f64,
    pub bind: SocketAddr,
}

impl Config {
    /// Build the configuration from the process environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_any = |keys: &[&str]| keys.iter().find_map(|&k| get(k));

        let credentials = Credentials {
            api_key: get_any(&["DATADOG_API_KEY", "DD_API_KEY"]),
            app_key: get_any(&["DATADOG_APP_KEY", "DD_APP_KEY"]),
            username: get("DATADOG_USERNAME"),
            password: get("DATADOG_PASSWORD"),
        };

        let config_path = get("DEPLOYGUARD_MCP_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_MCP_CONFIG_PATH));
        let mcp_server_url = match get("DATADOG_MCP_SERVER_URL") {
            Some(url) => url,
            None => Self::mcp_url_from_file(&config_path)
                .unwrap_or_else(|| DEFAULT_MCP_SERVER_URL.to_string()),
        };

        let threshold = match get("DEPLOYGUARD_THRESHOLD") {
            Some(raw) => parse_number(&raw, "DEPLOYGUARD_THRESHOLD")?,
            None => DEFAULT_THRESHOLD,
        };

        let pacing_scale = match get("DEPLOYGUARD_PACING_SCALE") {
            Some(raw) => parse_number(&raw, "DEPLOYGUARD_PACING_SCALE")?,
            None => 1.0,
        };
        if pacing_scale < 0.0 {
            return Err(DeployGuardError::ConfigError(
                "DEPLOYGUARD_PACING_SCALE must not be negative".to_string(),
            ));
        }

        let bind_raw = get("DEPLOYGUARD_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string());
        let bind = bind_raw.parse::<SocketAddr>().map_err(|e| {
            DeployGuardError::ConfigError(format!("invalid bind address {}: {}", bind_raw, e))
        })?;

        Ok(Self {
            credentials,
            site: get("DD_SITE").unwrap_or_else(|| DEFAULT_SITE.to_string()),
            mcp_server_url,
            model_name: get("DEPLOYGUARD_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            policy_document: get("DEPLOYGUARD_POLICY")
                .unwrap_or_else(|| DEFAULT_POLICY.to_string()),
            blocked_models: get("DEPLOYGUARD_BLOCKED_MODELS")
                .map(|raw| {
                    raw.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
            metric: get("DEPLOYGUARD_METRIC").unwrap_or_else(|| DEFAULT_METRIC.to_string()),
            threshold,
            metrics_window: get("DEPLOYGUARD_METRICS_WINDOW")
                .unwrap_or_else(|| DEFAULT_METRICS_WINDOW.to_string()),
            pacing_scale,
            bind,
        })
    }

    fn mcp_url_from_file(path: &Path) -> Option<String> {
        if !path.exists() {
            return None;
        }
        match McpConfigFile::load(path) {
            Ok(file) => file.datadog_url().map(String::from),
            Err(e) => {
                log::warn!("Ignoring unreadable MCP config {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Base URL of the Datadog REST API for the configured site.
    pub fn api_base_url(&self) -> String {
        format!("https://api.{}", self.site)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            credentials: Credentials::default(),
            site: DEFAULT_SITE.to_string(),
            mcp_server_url: DEFAULT_MCP_SERVER_URL.to_string(),
            model_name: DEFAULT_MODEL.to_string(),
            policy_document: DEFAULT_POLICY.to_string(),
            blocked_models: Vec::new(),
            metric: DEFAULT_METRIC.to_string(),
            threshold: DEFAULT_THRESHOLD,
            metrics_window: DEFAULT_METRICS_WINDOW.to_string(),
            pacing_scale: 1.0,
            bind: SocketAddr::from(([127, 0, 0, 1], 3000)),
        }
    }
}

/// Finite numbers only; `NaN` would never compare below a threshold.
fn parse_number(raw: &str, key: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| {
            DeployGuardError::ConfigError(format!("{} is not a number: '{}'", key, raw))
        })
}
