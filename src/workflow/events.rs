use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::datadog::models::MetricPoint;
use crate::error::{DeployGuardError, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunContext {
    #[serde(rename = "modelName")]
    pub model_name: String,
    #[serde(rename = "deploymentId", skip_serializing_if = "Option::is_none")]
    pub deployment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<RunContext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRef {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
}

impl StepRef {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            result: None,
        }
    }

    pub fn finished(name: &str, result: Value) -> Self {
        Self {
            name: name.to_string(),
            result: Some(result),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NameRef {
    pub name: String,
}

impl NameRef {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

/// Everything the UI is told about a run, one JSON object per SSE frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WorkflowEvent {
    #[serde(rename = "workflow:start")]
    WorkflowStart { run: RunInfo },

    #[serde(rename = "step:start")]
    StepStart { step: StepRef },

    #[serde(rename = "tool:start")]
    ToolStart { agent: NameRef, tool: NameRef },

    #[serde(rename = "tool:finish")]
    ToolFinish {
        agent: NameRef,
        tool: NameRef,
        result: Value,
    },

    #[serde(rename = "step:finish")]
    StepFinish { step: StepRef },

    #[serde(rename = "metrics:sample")]
    MetricsSample {
        metric: String,
        #[serde(rename = "deploymentId")]
        deployment_id: String,
        point: MetricPoint,
        threshold: f64,
        breached: bool,
    },

    #[serde(rename = "workflow:finish")]
    WorkflowFinish { run: RunInfo, result: Value },

    #[serde(rename = "breach:detected")]
    BreachDetected {
        metric: String,
        value: f64,
        threshold: f64,
        message: String,
    },

    #[serde(rename = "remediation:start")]
    RemediationStart { step: StepRef },

    #[serde(rename = "remediation:finish")]
    RemediationFinish { step: StepRef },

    #[serde(rename = "remediation:complete")]
    RemediationComplete {
        #[serde(rename = "deploymentId")]
        deployment_id: String,
    },

    #[serde(rename = "error")]
    Error { error: String },
}

impl WorkflowEvent {
    /// The `type` tag as it appears on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkflowEvent::WorkflowStart { .. } => "workflow:start",
            WorkflowEvent::StepStart { .. } => "step:start",
            WorkflowEvent::ToolStart { .. } => "tool:start",
            WorkflowEvent::ToolFinish { .. } => "tool:finish",
            WorkflowEvent::StepFinish { .. } => "step:finish",
            WorkflowEvent::MetricsSample { .. } => "metrics:sample",
            WorkflowEvent::WorkflowFinish { .. } => "workflow:finish",
            WorkflowEvent::BreachDetected { .. } => "breach:detected",
            WorkflowEvent::RemediationStart { .. } => "remediation:start",
            WorkflowEvent::RemediationFinish { .. } => "remediation:finish",
            WorkflowEvent::RemediationComplete { .. } => "remediation:complete",
            WorkflowEvent::Error { .. } => "error",
        }
    }

    /// Whether this event ends a stream.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowEvent::WorkflowFinish { .. }
                | WorkflowEvent::RemediationComplete { .. }
                | WorkflowEvent::Error { .. }
        )
    }

    pub fn error(message: impl Into<String>) -> Self {
        WorkflowEvent::Error {
            error: message.into(),
        }
    }
}

/// Sending half of a run's event stream.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::Sender<WorkflowEvent>,
}

impl EventSink {
    pub fn new(tx: mpsc::Sender<WorkflowEvent>) -> Self {
        Self { tx }
    }

    /// Bounded channel pair; the receiver is what gets streamed out.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<WorkflowEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self::new(tx), rx)
    }

    /// Fails with `ChannelClosed` once nobody is listening any more.
    pub async fn emit(&self, event: WorkflowEvent) -> Result<()> {
        log::debug!("event {}", event.kind());
        self.tx
            .send(event)
            .await
            .map_err(|_| DeployGuardError::ChannelClosed)
    }
}
