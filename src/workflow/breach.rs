//! Injected compliance breach and the remediation it triggers.

use serde::Serialize;
use serde_json::{Value, json};

use super::agent::remediation_agent;
use super::events::{EventSink, StepRef, WorkflowEvent};
use super::pipeline::{Deployment, WorkflowSettings};
use crate::datadog::models::MetricPoint;
use crate::error::{DeployGuardError, Result};
use crate::tools::remediation::{JIRA_TICKET_TOOL, ROLLBACK_TOOL, SLACK_ALERT_TOOL};
use crate::utils::now_millis;

/// Offsets from the threshold for the degraded samples: one still healthy,
/// then a sharp drop.
const DEGRADATION: [f64; 3] = [0.04, -0.18, -0.39];
const DEGRADED_SPACING_MS: i64 = 60 * 1000;

pub const REMEDIATION_PLAN: [(&str, &str); 3] = [
    ("Send Alert", SLACK_ALERT_TOOL),
    ("Create Ticket", JIRA_TICKET_TOOL),
    ("Rollback", ROLLBACK_TOOL),
];

#[derive(Debug, Clone, Serialize)]
pub struct BreachReport {
    pub deployment_id: String,
    pub metric: String,
    pub value: f64,
    pub threshold: f64,
    pub actions: Vec<Value>,
}

pub struct BreachScenario {
    settings: WorkflowSettings,
}

impl BreachScenario {
    pub fn new(settings: WorkflowSettings) -> Self {
        Self { settings }
    }

    /// Samples after the deployment went bad, starting now.
    pub fn degraded_series(&self, start_ms: i64) -> Vec<MetricPoint> {
        DEGRADATION
            .iter()
            .enumerate()
            .map(|(i, offset)| MetricPoint {
                timestamp: start_ms + i as i64 * DEGRADED_SPACING_MS,
                value: ((self.settings.threshold + offset).max(0.0) * 100.0).round() / 100.0,
            })
            .collect()
    }

    pub async fn run(&self, deployment: &Deployment, sink: &EventSink) -> Result<BreachReport> {
        log::warn!("[Breach] Simulating compliance breach on {}", deployment.deployment_id);

        match self.execute(deployment, sink).await {
            Ok(report) => Ok(report),
            Err(DeployGuardError::ChannelClosed) => Err(DeployGuardError::ChannelClosed),
            Err(e) => {
                log::error!("[Breach] Remediation failed: {}", e);
                let _ = sink.emit(WorkflowEvent::error(e.to_string())).await;
                Err(e)
            }
        }
    }

    async fn execute(&self, deployment: &Deployment, sink: &EventSink) -> Result<BreachReport> {
        let settings = &self.settings;
        let pacing = settings.pacing;

        let mut breach = None;
        for point in self.degraded_series(now_millis()) {
            let breached = point.value < settings.threshold;
            sink.emit(WorkflowEvent::MetricsSample {
                metric: settings.metric.clone(),
                deployment_id: deployment.deployment_id.clone(),
                point,
                threshold: settings.threshold,
                breached,
            })
            .await?;
            pacing.wait(pacing.sample_interval()).await;

            if breached {
                breach = Some(point.value);
                break;
            }
        }

        let value = breach.ok_or_else(|| {
            DeployGuardError::InvalidState(format!(
                "{} never dropped below {}",
                settings.metric, settings.threshold
            ))
        })?;

        let message = format!(
            "{} dropped to {:.2}, below threshold {}",
            settings.metric, value, settings.threshold
        );
        log::warn!("[Compliance] ALERT: {}", message);
        sink.emit(WorkflowEvent::BreachDetected {
            metric: settings.metric.clone(),
            value,
            threshold: settings.threshold,
            message: message.clone(),
        })
        .await?;

        let agent = remediation_agent(pacing);
        let params = json!({
            "deploymentId": deployment.deployment_id,
            "modelName": deployment.model_name,
            "message": message
        });

        let mut actions = Vec::with_capacity(REMEDIATION_PLAN.len());
        for (step, tool) in REMEDIATION_PLAN {
            sink.emit(WorkflowEvent::RemediationStart {
                step: StepRef::named(step),
            })
            .await?;
            let result = agent.invoke(sink, tool, &params).await?;
            sink.emit(WorkflowEvent::RemediationFinish {
                step: StepRef::finished(step, result.clone()),
            })
            .await?;
            actions.push(result);
        }

        sink.emit(WorkflowEvent::RemediationComplete {
            deployment_id: deployment.deployment_id.clone(),
        })
        .await?;
        log::info!("[Breach] Remediation of {} complete", deployment.deployment_id);

        Ok(BreachReport {
            deployment_id: deployment.deployment_id.clone(),
            metric: settings.metric.clone(),
            value,
            threshold: settings.threshold,
            actions,
        })
    }
}
