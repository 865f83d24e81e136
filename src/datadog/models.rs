use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============= Metrics Models =============

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricsResponse {
    pub status: String,
    #[serde(default)]
    pub series: Vec<MetricSeries>,
    #[serde(default)]
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MetricSeries {
    pub metric: String,
    #[serde(default)]
    pub scope: String,
    pub pointlist: Option<Vec<Vec<Option<f64>>>>,
    pub aggr: Option<String>,
    pub interval: Option<i64>,
}

impl MetricsResponse {
    /// Flatten every series' point list into `(timestamp_ms, value)` points,
    /// skipping null values.
    pub fn points(&self) -> Vec<MetricPoint> {
        let mut points: Vec<MetricPoint> = self
            .series
            .iter()
            .filter_map(|s| s.pointlist.as_ref())
            .flatten()
            .filter_map(|p| match (p.first().copied().flatten(), p.get(1).copied().flatten()) {
                (Some(ts), Some(value)) => Some(MetricPoint {
                    timestamp: ts as i64,
                    value,
                }),
                _ => None,
            })
            .collect();
        points.sort_by_key(|p| p.timestamp);
        points
    }
}

/// One sample of a tracked metric, timestamp in epoch milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricPoint {
    pub timestamp: i64,
    pub value: f64,
}

// ============= Monitors Models =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub query: String,
    pub message: String,
    pub tags: Vec<String>,
    pub options: MonitorOptions,
}

impl MonitorRequest {
    /// A metric alert that fires when the deployment's average metric drops
    /// below `threshold` over the last five minutes.
    pub fn metric_below(deployment_id: &str, metric: &str, threshold: f64) -> Self {
        Self {
            name: format!("[DeployGuard] {} on {}", metric, deployment_id),
            monitor_type: "metric alert".to_string(),
            query: format!(
                "avg(last_5m):avg:{}{{deployment_id:{}}} < {}",
                metric, deployment_id, threshold
            ),
            message: format!(
                "{} dropped below {} for deployment {}. @slack-devops",
                metric, threshold, deployment_id
            ),
            tags: vec![
                "source:deployguard".to_string(),
                format!("deployment_id:{}", deployment_id),
            ],
            options: MonitorOptions {
                thresholds: Some(MonitorThresholds {
                    critical: Some(threshold),
                    warning: None,
                    ok: None,
                }),
                notify_no_data: Some(false),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Monitor {
    pub id: i64,
    pub name: String,
    #[serde(rename = "type")]
    pub monitor_type: String,
    pub query: String,
    pub message: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub overall_state: Option<String>,
    pub options: Option<MonitorOptions>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thresholds: Option<MonitorThresholds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notify_no_data: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorThresholds {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub critical: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ok: Option<f64>,
}

// ============= Key / Dashboard Models =============

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateResponse {
    pub valid: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DashboardsResponse {
    #[serde(default)]
    pub dashboards: Vec<DashboardSummary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub id: String,
    pub title: Option<String>,
    pub url: Option<String>,
}

// ============= MCP Models =============

/// What the MCP server answered to a connection attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum McpHandshake {
    Json(Value),
    Text(String),
}

impl McpHandshake {
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(json) => McpHandshake::Json(json),
            Err(_) => McpHandshake::Text(body.to_string()),
        }
    }

    /// Short, single-line rendering for logs and tool results.
    pub fn preview(&self, max_chars: usize) -> String {
        match self {
            McpHandshake::Json(json) => crate::utils::preview(&json.to_string(), max_chars),
            McpHandshake::Text(text) => crate::utils::preview(text, max_chars),
        }
    }
}
