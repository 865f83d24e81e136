use serde::Serialize;
use serde_json::{Value, json};
use std::sync::Arc;

use super::agent::{compliance_agent, validator_agent};
use super::events::{EventSink, RunContext, RunInfo, StepRef, WorkflowEvent};
use crate::config::Config;
use crate::datadog::DatadogClient;
use crate::datadog::models::MetricPoint;
use crate::error::{DeployGuardError, Result};
use crate::tools::datadog_mcp::{CONNECT_TOOL, CREATE_MONITOR_TOOL, GET_METRICS_TOOL};
use crate::tools::validator::VALIDATOR_TOOL;
use crate::tools::{DatadogMcp, Pacing};
use crate::utils::now_millis;

pub const VALIDATION_STEP: &str = "Pre-Deployment Validation";
pub const DEPLOY_STEP: &str = "Deploy to Production";
pub const MONITORING_STEP: &str = "Initiate Continuous Monitoring";

/// The knobs a run needs, detached from the rest of the process config.
#[derive(Debug, Clone)]
pub struct WorkflowSettings {
    pub model_name: String,
    pub policy_document: String,
    pub blocked_models: Vec<String>,
    pub metric: String,
    pub threshold: f64,
    pub metrics_window: String,
    pub pacing: Pacing,
}

impl WorkflowSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            model_name: config.model_name.clone(),
            policy_document: config.policy_document.clone(),
            blocked_models: config.blocked_models.clone(),
            metric: config.metric.clone(),
            threshold: config.threshold,
            metrics_window: config.metrics_window.clone(),
            pacing: Pacing::scaled(config.pacing_scale),
        }
    }
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// What a finished run leaves behind for the breach scenario.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Deployment {
    pub run_id: String,
    pub deployment_id: String,
    pub model_name: String,
    pub monitor_id: String,
    pub dashboard_url: String,
    pub mode: String,
    pub last_value: Option<f64>,
}

/// Validate, deploy, then start monitoring. Strictly sequential; the first
/// failure ends the run.
pub struct DeployGuardWorkflow {
    settings: WorkflowSettings,
    client: Arc<DatadogClient>,
}

impl DeployGuardWorkflow {
    pub fn new(settings: WorkflowSettings, client: Arc<DatadogClient>) -> Self {
        Self { settings, client }
    }

    pub fn settings(&self) -> &WorkflowSettings {
        &self.settings
    }

    pub fn client(&self) -> &Arc<DatadogClient> {
        &self.client
    }

    /// Runs to completion, streaming progress into `sink`. Failures are
    /// reported as an `error` event as well as returned.
    pub async fn run(&self, sink: &EventSink) -> Result<Deployment> {
        let run_id = format!("run-{}", now_millis());
        log::info!("[Workflow] Starting run {} for {}", run_id, self.settings.model_name);

        match self.execute(&run_id, sink).await {
            Ok(deployment) => {
                log::info!(
                    "[Workflow] Run {} finished, {} is monitored ({})",
                    run_id,
                    deployment.deployment_id,
                    deployment.mode
                );
                Ok(deployment)
            }
            Err(DeployGuardError::ChannelClosed) => {
                log::warn!("[Workflow] Run {} abandoned, event stream closed", run_id);
                Err(DeployGuardError::ChannelClosed)
            }
            Err(e) => {
                log::error!("[Workflow] Run {} failed: {}", run_id, e);
                // best effort; the listener may already be gone
                let _ = sink.emit(WorkflowEvent::error(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, run_id: &str, sink: &EventSink) -> Result<Deployment> {
        let settings = &self.settings;

        sink.emit(WorkflowEvent::WorkflowStart {
            run: RunInfo {
                id: run_id.to_string(),
                context: Some(RunContext {
                    model_name: settings.model_name.clone(),
                    deployment_id: None,
                }),
            },
        })
        .await?;

        self.validate(sink).await?;
        let deployment_id = self.deploy(sink).await?;
        let monitoring = self.monitor(sink, &deployment_id).await?;

        let deployment = Deployment {
            run_id: run_id.to_string(),
            deployment_id: deployment_id.clone(),
            model_name: settings.model_name.clone(),
            monitor_id: monitoring.monitor_id,
            dashboard_url: monitoring.dashboard_url,
            mode: monitoring.mode,
            last_value: monitoring.points.last().map(|p| p.value),
        };

        sink.emit(WorkflowEvent::WorkflowFinish {
            run: RunInfo {
                id: run_id.to_string(),
                context: Some(RunContext {
                    model_name: settings.model_name.clone(),
                    deployment_id: Some(deployment_id),
                }),
            },
            result: json!({
                "status": "success",
                "deploymentId": deployment.deployment_id,
                "monitor_id": deployment.monitor_id,
                "dashboard_url": deployment.dashboard_url,
                "mode": deployment.mode
            }),
        })
        .await?;

        Ok(deployment)
    }

    async fn validate(&self, sink: &EventSink) -> Result<()> {
        let settings = &self.settings;
        sink.emit(WorkflowEvent::StepStart {
            step: StepRef::named(VALIDATION_STEP),
        })
        .await?;

        let agent = validator_agent(settings.blocked_models.clone(), settings.pacing);
        let result = agent
            .invoke(
                sink,
                VALIDATOR_TOOL,
                &json!({
                    "modelName": settings.model_name,
                    "policyDocument": settings.policy_document
                }),
            )
            .await?;

        if result["status"] != "success" {
            let reason = result["reason"]
                .as_str()
                .unwrap_or("model rejected by policy")
                .to_string();
            return Err(DeployGuardError::ValidationFailed(reason));
        }

        sink.emit(WorkflowEvent::StepFinish {
            step: StepRef::finished(VALIDATION_STEP, result),
        })
        .await
    }

    async fn deploy(&self, sink: &EventSink) -> Result<String> {
        sink.emit(WorkflowEvent::StepStart {
            step: StepRef::named(DEPLOY_STEP),
        })
        .await?;

        let pacing = self.settings.pacing;
        pacing.wait(pacing.deploy()).await;
        let deployment_id = format!("deploy-{}", now_millis());
        log::info!("[Deploy] Deployed {} as {}", self.settings.model_name, deployment_id);

        sink.emit(WorkflowEvent::StepFinish {
            step: StepRef::finished(
                DEPLOY_STEP,
                json!({"status": "deployed", "deploymentId": deployment_id}),
            ),
        })
        .await?;

        Ok(deployment_id)
    }

    async fn monitor(&self, sink: &EventSink, deployment_id: &str) -> Result<Monitoring> {
        let settings = &self.settings;
        sink.emit(WorkflowEvent::StepStart {
            step: StepRef::named(MONITORING_STEP),
        })
        .await?;

        let backend = Arc::new(DatadogMcp::new(
            self.client.clone(),
            settings.metrics_window.clone(),
            settings.pacing,
        ));
        let agent = compliance_agent(backend.clone());

        let target = json!({"deploymentId": deployment_id, "metric": settings.metric});
        let mut monitor_params = target.clone();
        monitor_params["threshold"] = json!(settings.threshold);

        let results = agent
            .run(
                sink,
                &[
                    (CONNECT_TOOL, json!({})),
                    (CREATE_MONITOR_TOOL, monitor_params),
                    (GET_METRICS_TOOL, target),
                ],
            )
            .await?;
        let (monitor, metrics) = (&results[1], &results[2]);

        let points: Vec<MetricPoint> = serde_json::from_value(metrics["data"].clone())?;
        for point in &points {
            sink.emit(WorkflowEvent::MetricsSample {
                metric: settings.metric.clone(),
                deployment_id: deployment_id.to_string(),
                point: *point,
                threshold: settings.threshold,
                breached: point.value < settings.threshold,
            })
            .await?;
            settings.pacing.wait(settings.pacing.sample_interval()).await;
        }

        let monitoring = Monitoring {
            monitor_id: string_field(monitor, "monitor_id"),
            dashboard_url: string_field(monitor, "dashboard_url"),
            mode: backend.mode().await.label().to_string(),
            points,
        };

        sink.emit(WorkflowEvent::StepFinish {
            step: StepRef::finished(
                MONITORING_STEP,
                json!({
                    "result": {
                        "monitoring_status": "active",
                        "monitor_id": monitoring.monitor_id,
                        "dashboard_url": monitoring.dashboard_url,
                        "mode": monitoring.mode
                    }
                }),
            ),
        })
        .await?;

        Ok(monitoring)
    }
}

struct Monitoring {
    monitor_id: String,
    dashboard_url: String,
    mode: String,
    points: Vec<MetricPoint>,
}

fn string_field(value: &Value, key: &str) -> String {
    value[key].as_str().unwrap_or_default().to_string()
}
