//! Remediation actions run after a compliance breach. All three are simulated.

use async_trait::async_trait;
use serde_json::{Value, json};

use super::Tool;
use super::common::{Pacing, ParamReader};
use crate::error::Result;

pub const SLACK_ALERT_TOOL: &str = "slackAlert";
pub const JIRA_TICKET_TOOL: &str = "jiraTicket";
pub const ROLLBACK_TOOL: &str = "rollbackDeployment";

const ALERT_CHANNEL: &str = "#devops";

pub struct SlackAlert {
    pacing: Pacing,
}

impl ParamReader for SlackAlert {}

impl SlackAlert {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }
}

#[async_trait]
impl Tool for SlackAlert {
    fn name(&self) -> &'static str {
        SLACK_ALERT_TOOL
    }

    fn description(&self) -> &'static str {
        "Sends a high-priority alert to the on-call Slack channel."
    }

    async fn call(&self, params: &Value) -> Result<Value> {
        let deployment_id = self.required_str(params, "deploymentId")?;
        let message = self
            .optional_str(params, "message")
            .unwrap_or("Compliance breach detected");

        log::info!("[Remediation] Alerting {} about {}", ALERT_CHANNEL, deployment_id);
        self.pacing.wait(self.pacing.remediation()).await;

        Ok(json!({
            "status": "sent",
            "channel": ALERT_CHANNEL,
            "priority": "high",
            "text": format!("{} ({})", message, deployment_id),
            "message": format!("Sent high-priority alert to {} on Slack.", ALERT_CHANNEL)
        }))
    }
}

pub struct JiraTicket {
    pacing: Pacing,
}

impl ParamReader for JiraTicket {}

impl JiraTicket {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }
}

#[async_trait]
impl Tool for JiraTicket {
    fn name(&self) -> &'static str {
        JIRA_TICKET_TOOL
    }

    fn description(&self) -> &'static str {
        "Opens a P0 incident ticket for the breached deployment."
    }

    async fn call(&self, params: &Value) -> Result<Value> {
        let deployment_id = self.required_str(params, "deploymentId")?;
        let summary = self
            .optional_str(params, "message")
            .unwrap_or("Compliance breach detected");

        log::info!("[Remediation] Opening incident for {}", deployment_id);
        self.pacing.wait(self.pacing.remediation()).await;

        let suffix = deployment_id
            .rsplit('-')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or(deployment_id);
        let short: String = suffix
            .chars()
            .rev()
            .take(4)
            .collect::<Vec<_>>()
            .into_iter()
            .rev()
            .collect();

        Ok(json!({
            "status": "created",
            "ticket_id": format!("INC-{}", short),
            "priority": "P0",
            "summary": format!("{}: {}", deployment_id, summary),
            "message": "Created P0 incident ticket in Jira."
        }))
    }
}

pub struct RollbackDeployment {
    pacing: Pacing,
}

impl ParamReader for RollbackDeployment {}

impl RollbackDeployment {
    pub fn new(pacing: Pacing) -> Self {
        Self { pacing }
    }
}

#[async_trait]
impl Tool for RollbackDeployment {
    fn name(&self) -> &'static str {
        ROLLBACK_TOOL
    }

    fn description(&self) -> &'static str {
        "Rolls the deployment back to the previously approved release."
    }

    async fn call(&self, params: &Value) -> Result<Value> {
        let deployment_id = self.required_str(params, "deploymentId")?;
        let model_name = self.optional_str(params, "modelName").unwrap_or("model");

        log::info!("[Remediation] Rolling back {}", deployment_id);
        self.pacing.wait(self.pacing.remediation()).await;

        Ok(json!({
            "status": "rolled_back",
            "deploymentId": deployment_id,
            "rolled_back_to": format!("{}@previous", model_name),
            "message": "Initiated automated rollback of the deployment."
        }))
    }
}
