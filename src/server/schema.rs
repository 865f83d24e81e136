use serde_json::{Value, json};
use std::sync::Arc;

use crate::tools::DatadogMcp;
use crate::workflow::DeployGuardWorkflow;
use crate::workflow::agent::{compliance_agent, remediation_agent, validator_agent};
use crate::workflow::pipeline::{DEPLOY_STEP, MONITORING_STEP, VALIDATION_STEP};

/// Agents, their tools and the step layout, for the UI.
pub fn tool_catalog(workflow: &DeployGuardWorkflow) -> Value {
    let settings = workflow.settings();
    let backend = Arc::new(DatadogMcp::new(
        workflow.client().clone(),
        settings.metrics_window.clone(),
        settings.pacing,
    ));

    let agents = [
        validator_agent(settings.blocked_models.clone(), settings.pacing),
        compliance_agent(backend),
        remediation_agent(settings.pacing),
    ];

    json!({
        "model": settings.model_name,
        "policy": settings.policy_document,
        "metric": settings.metric,
        "threshold": settings.threshold,
        "steps": [VALIDATION_STEP, DEPLOY_STEP, MONITORING_STEP],
        "agents": agents.iter().map(|a| a.describe()).collect::<Vec<_>>()
    })
}
