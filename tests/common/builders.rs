// Builders for workflow settings and app state used by the integration tests

use deployguard::config::Credentials;
use deployguard::datadog::{DatadogClient, RetryPolicy};
use deployguard::server::AppState;
use deployguard::tools::Pacing;
use deployguard::workflow::{DeployGuardWorkflow, WorkflowSettings};
use std::sync::Arc;

/// Nothing listens here; connections are refused immediately.
pub const UNREACHABLE: &str = "http://127.0.0.1:9";

pub struct StateBuilder {
    settings: WorkflowSettings,
    credentials: Credentials,
    api_base_url: String,
    mcp_server_url: String,
}

impl StateBuilder {
    /// No credentials, no pacing: every Datadog tool answers from mocks.
    pub fn offline() -> Self {
        Self {
            settings: WorkflowSettings {
                pacing: Pacing::none(),
                ..WorkflowSettings::default()
            },
            credentials: Credentials::default(),
            api_base_url: UNREACHABLE.to_string(),
            mcp_server_url: format!("{}/mcp", UNREACHABLE),
        }
    }

    /// Talk to a fake Datadog at `base` with both keys set.
    pub fn live(base: &str) -> Self {
        Self {
            credentials: Credentials::new("test-api-key", "test-app-key"),
            api_base_url: base.to_string(),
            mcp_server_url: format!("{}/mcp", base),
            ..Self::offline()
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.settings.pacing = pacing;
        self
    }

    pub fn with_blocked_model(mut self, model: &str) -> Self {
        self.settings.blocked_models.push(model.to_string());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.settings.threshold = threshold;
        self
    }

    pub fn client(&self) -> Arc<DatadogClient> {
        let client = DatadogClient::with_endpoints(
            self.credentials.clone(),
            self.api_base_url.clone(),
            self.mcp_server_url.clone(),
        )
        .expect("client")
        .with_retry_policy(RetryPolicy::none());
        Arc::new(client)
    }

    pub fn settings(&self) -> WorkflowSettings {
        self.settings.clone()
    }

    pub fn workflow(&self) -> DeployGuardWorkflow {
        DeployGuardWorkflow::new(self.settings(), self.client())
    }

    pub fn build(self) -> AppState {
        AppState::new(self.workflow())
    }
}
