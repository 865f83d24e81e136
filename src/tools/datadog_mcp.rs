use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::sync::RwLock;

use super::Tool;
use super::common::{Pacing, ParamReader};
use crate::datadog::DatadogClient;
use crate::datadog::models::{MetricPoint, MonitorRequest};
use crate::error::Result;
use crate::utils::{now_millis, parse_time};

pub const CONNECT_TOOL: &str = "connectToDatadogMCP";
pub const CREATE_MONITOR_TOOL: &str = "datadog_create_monitor";
pub const GET_METRICS_TOOL: &str = "datadog_get_metrics";

const MOCK_DASHBOARD_URL: &str = "https://app.datadoghq.com/dashboard/mock";
const PREVIEW_CHARS: usize = 100;

/// Baseline fairness scores reported when no real data is available.
const BASELINE_SCORES: [f64; 4] = [0.95, 0.92, 0.90, 0.88];
const BASELINE_SPACING_MS: i64 = 20 * 60 * 1000;

/// Why the Datadog tools are answering with simulated data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReason {
    MissingCredentials,
    Unreachable(String),
}

impl MockReason {
    fn describe(&self) -> &'static str {
        match self {
            MockReason::MissingCredentials => "missing credentials",
            MockReason::Unreachable(_) => "Datadog unreachable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionMode {
    Disconnected,
    Live,
    Mock(MockReason),
}

impl ConnectionMode {
    pub fn label(&self) -> &'static str {
        match self {
            ConnectionMode::Disconnected => "disconnected",
            ConnectionMode::Live => "live",
            ConnectionMode::Mock(_) => "mock",
        }
    }
}

/// Shared connection to the Datadog MCP server.
///
/// The connect tool decides whether the monitor and metrics tools talk to
/// Datadog or fall back to simulated results.
pub struct DatadogMcp {
    client: Arc<DatadogClient>,
    mode: RwLock<ConnectionMode>,
    metrics_window: String,
    pacing: Pacing,
}

impl DatadogMcp {
    pub fn new(client: Arc<DatadogClient>, metrics_window: String, pacing: Pacing) -> Self {
        Self {
            client,
            mode: RwLock::new(ConnectionMode::Disconnected),
            metrics_window,
            pacing,
        }
    }

    pub async fn mode(&self) -> ConnectionMode {
        self.mode.read().await.clone()
    }

    pub async fn connect(&self) -> Value {
        let server_url = self.client.mcp_server_url().to_string();

        if !self.client.credentials().has_app_keys() {
            log::error!("[MCP] Missing Datadog MCP credentials. Using simulated tools.");
            *self.mode.write().await = ConnectionMode::Mock(MockReason::MissingCredentials);
            return json!({
                "status": "mock",
                "mode": "mock",
                "server_url": server_url,
                "message": "Simulated MCP tools (missing credentials)"
            });
        }

        match self.client.connect_mcp().await {
            Ok(handshake) => {
                log::info!("[MCP] Successfully connected to Datadog MCP server");
                *self.mode.write().await = ConnectionMode::Live;
                json!({
                    "status": "connected",
                    "mode": "live",
                    "server_url": server_url,
                    "message": "Connected to Datadog MCP server.",
                    "preview": handshake.preview(PREVIEW_CHARS)
                })
            }
            Err(e) => {
                log::error!("[MCP] Connection error: {}", e);
                log::warn!("[MCP] Falling back to simulated MCP tools");
                *self.mode.write().await =
                    ConnectionMode::Mock(MockReason::Unreachable(e.to_string()));
                json!({
                    "status": "mock",
                    "mode": "mock",
                    "server_url": server_url,
                    "message": "Simulated MCP tools (Datadog unreachable)",
                    "error": e.to_string()
                })
            }
        }
    }

    async fn ensure_connected(&self) -> ConnectionMode {
        if self.mode().await == ConnectionMode::Disconnected {
            self.connect().await;
        }
        self.mode().await
    }

    pub async fn create_monitor(&self, deployment_id: &str, metric: &str, threshold: f64) -> Value {
        log::info!(
            "[Datadog MCP] Creating monitor for {} tracking metric: {}",
            deployment_id,
            metric
        );
        self.pacing.wait(self.pacing.monitor()).await;

        let reason = match self.ensure_connected().await {
            ConnectionMode::Live => {
                let request = MonitorRequest::metric_below(deployment_id, metric, threshold);
                match self.client.create_monitor(&request).await {
                    Ok(monitor) => {
                        return json!({
                            "status": "success",
                            "monitor_id": monitor.id.to_string(),
                            "dashboard_url": self.monitor_url(monitor.id),
                            "message": format!(
                                "Successfully created monitor for {} on deployment {}",
                                metric, deployment_id
                            )
                        });
                    }
                    Err(e) => {
                        log::warn!("[Datadog MCP] Monitor creation failed, simulating: {}", e);
                        format!("monitor creation failed: {}", e)
                    }
                }
            }
            ConnectionMode::Mock(reason) => reason.describe().to_string(),
            ConnectionMode::Disconnected => "not connected".to_string(),
        };

        json!({
            "status": "mock",
            "monitor_id": format!("mock_mon_{}", deployment_id.trim_start_matches("deploy-")),
            "dashboard_url": MOCK_DASHBOARD_URL,
            "message": format!("Simulated monitor creation ({})", reason)
        })
    }

    pub async fn get_metrics(
        &self,
        deployment_id: &str,
        metric: &str,
        from: Option<&str>,
        to: Option<&str>,
    ) -> Result<Value> {
        log::info!("[Datadog MCP] Getting metrics for {}: {}", deployment_id, metric);
        let from_ts = parse_time(from.unwrap_or(&self.metrics_window))?;
        let to_ts = parse_time(to.unwrap_or("now"))?;
        self.pacing.wait(self.pacing.metrics()).await;

        let reason = match self.ensure_connected().await {
            ConnectionMode::Live => {
                let query = format!("avg:{}{{deployment_id:{}}}", metric, deployment_id);
                match self.client.query_metrics(&query, from_ts, to_ts).await {
                    Ok(response) if response.status == "ok" && !response.points().is_empty() => {
                        return Ok(json!({
                            "status": "success",
                            "metric": metric,
                            "query": query,
                            "data": response.points()
                        }));
                    }
                    Ok(response) => match response.error {
                        Some(err) => format!("query error: {}", err),
                        None => "no datapoints yet".to_string(),
                    },
                    Err(e) => {
                        log::warn!("[Datadog MCP] Metrics query failed, simulating: {}", e);
                        format!("metrics query failed: {}", e)
                    }
                }
            }
            ConnectionMode::Mock(reason) => reason.describe().to_string(),
            ConnectionMode::Disconnected => "not connected".to_string(),
        };

        Ok(json!({
            "status": "mock",
            "metric": metric,
            "data": baseline_series(to.map(|_| to_ts * 1000).unwrap_or_else(now_millis)),
            "message": format!("Simulated metrics ({})", reason)
        }))
    }

    fn monitor_url(&self, monitor_id: i64) -> String {
        let app_base = self.client.api_base_url().replacen("://api.", "://app.", 1);
        format!("{}/monitors/{}", app_base, monitor_id)
    }
}

/// Four evenly spaced baseline points ending at `end_ms`.
pub fn baseline_series(end_ms: i64) -> Vec<MetricPoint> {
    let last = BASELINE_SCORES.len() as i64 - 1;
    BASELINE_SCORES
        .iter()
        .enumerate()
        .map(|(i, &value)| MetricPoint {
            timestamp: end_ms - (last - i as i64) * BASELINE_SPACING_MS,
            value,
        })
        .collect()
}

pub struct ConnectToDatadogMcp {
    backend: Arc<DatadogMcp>,
}

impl ConnectToDatadogMcp {
    pub fn new(backend: Arc<DatadogMcp>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for ConnectToDatadogMcp {
    fn name(&self) -> &'static str {
        CONNECT_TOOL
    }

    fn description(&self) -> &'static str {
        "Connects to the Datadog MCP server to discover available monitoring and observability tools."
    }

    async fn call(&self, _params: &Value) -> Result<Value> {
        Ok(self.backend.connect().await)
    }
}

pub struct DatadogCreateMonitor {
    backend: Arc<DatadogMcp>,
}

impl ParamReader for DatadogCreateMonitor {}

impl DatadogCreateMonitor {
    pub fn new(backend: Arc<DatadogMcp>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for DatadogCreateMonitor {
    fn name(&self) -> &'static str {
        CREATE_MONITOR_TOOL
    }

    fn description(&self) -> &'static str {
        "Creates a new monitor in Datadog to track a metric."
    }

    async fn call(&self, params: &Value) -> Result<Value> {
        let deployment_id = self.required_str(params, "deploymentId")?;
        let metric = self.required_str(params, "metric")?;
        let threshold = self
            .optional_f64(params, "threshold")?
            .unwrap_or(crate::config::DEFAULT_THRESHOLD);

        Ok(self
            .backend
            .create_monitor(deployment_id, metric, threshold)
            .await)
    }
}

pub struct DatadogGetMetrics {
    backend: Arc<DatadogMcp>,
}

impl ParamReader for DatadogGetMetrics {}

impl DatadogGetMetrics {
    pub fn new(backend: Arc<DatadogMcp>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl Tool for DatadogGetMetrics {
    fn name(&self) -> &'static str {
        GET_METRICS_TOOL
    }

    fn description(&self) -> &'static str {
        "Gets metrics data from Datadog for a specific deployment."
    }

    async fn call(&self, params: &Value) -> Result<Value> {
        let deployment_id = self.required_str(params, "deploymentId")?;
        let metric = self.required_str(params, "metric")?;
        let from = self.optional_str(params, "from");
        let to = self.optional_str(params, "to");

        self.backend
            .get_metrics(deployment_id, metric, from, to)
            .await
    }
}
