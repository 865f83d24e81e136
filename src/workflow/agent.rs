use serde_json::{Value, json};
use std::sync::Arc;

use super::events::{EventSink, NameRef, WorkflowEvent};
use crate::error::{DeployGuardError, Result};
use crate::tools::datadog_mcp::{ConnectToDatadogMcp, DatadogCreateMonitor, DatadogGetMetrics};
use crate::tools::remediation::{JiraTicket, RollbackDeployment, SlackAlert};
use crate::tools::validator::LlamaIndexValidator;
use crate::tools::{DatadogMcp, Pacing, Tool};

pub const VALIDATOR_AGENT: &str = "ValidatorAgent";
pub const COMPLIANCE_AGENT: &str = "ComplianceAgent";
pub const REMEDIATION_AGENT: &str = "RemediationAgent";

/// A named owner of a set of tools. Every tool call is announced on the
/// event stream before it starts and after it returns.
pub struct Agent {
    name: &'static str,
    instructions: &'static str,
    tools: Vec<Arc<dyn Tool>>,
}

impl Agent {
    pub fn new(name: &'static str, instructions: &'static str, tools: Vec<Arc<dyn Tool>>) -> Self {
        Self {
            name,
            instructions,
            tools,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn instructions(&self) -> &'static str {
        self.instructions
    }

    pub fn tool_names(&self) -> Vec<&'static str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    /// Name, instructions and tool list, as shown to the UI.
    pub fn describe(&self) -> Value {
        json!({
            "name": self.name,
            "instructions": self.instructions,
            "tools": self
                .tools
                .iter()
                .map(|t| json!({"name": t.name(), "description": t.description()}))
                .collect::<Vec<_>>()
        })
    }

    fn tool(&self, name: &str) -> Result<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name).ok_or_else(|| {
            DeployGuardError::InvalidInput(format!("{} has no tool named {}", self.name, name))
        })
    }

    pub async fn invoke(&self, sink: &EventSink, tool_name: &str, params: &Value) -> Result<Value> {
        let tool = self.tool(tool_name)?;

        sink.emit(WorkflowEvent::ToolStart {
            agent: NameRef::new(self.name),
            tool: NameRef::new(tool.name()),
        })
        .await?;

        log::info!("[{}] Calling tool: {}", self.name, tool.name());
        let result = tool.call(params).await?;

        sink.emit(WorkflowEvent::ToolFinish {
            agent: NameRef::new(self.name),
            tool: NameRef::new(tool.name()),
            result: result.clone(),
        })
        .await?;

        Ok(result)
    }

    /// Runs a tool plan in order, stopping at the first failing call.
    pub async fn run(&self, sink: &EventSink, plan: &[(&str, Value)]) -> Result<Vec<Value>> {
        let mut results = Vec::with_capacity(plan.len());
        for (tool_name, params) in plan {
            results.push(self.invoke(sink, tool_name, params).await?);
        }
        Ok(results)
    }
}

pub fn validator_agent(blocked_models: Vec<String>, pacing: Pacing) -> Agent {
    Agent::new(
        VALIDATOR_AGENT,
        "You are a pre-deployment validation agent. Use the LlamaIndex tool to ensure a model \
         is compliant before it is deployed.",
        vec![Arc::new(LlamaIndexValidator::new(blocked_models, pacing))],
    )
}

pub fn compliance_agent(backend: Arc<DatadogMcp>) -> Agent {
    Agent::new(
        COMPLIANCE_AGENT,
        "You are a post-deployment compliance agent. Connect to the Datadog MCP server, create \
         a monitor for the deployed model and read back its metrics.",
        vec![
            Arc::new(ConnectToDatadogMcp::new(backend.clone())),
            Arc::new(DatadogCreateMonitor::new(backend.clone())),
            Arc::new(DatadogGetMetrics::new(backend)),
        ],
    )
}

pub fn remediation_agent(pacing: Pacing) -> Agent {
    Agent::new(
        REMEDIATION_AGENT,
        "You respond to compliance breaches: alert the on-call channel, open an incident and \
         roll the deployment back.",
        vec![
            Arc::new(SlackAlert::new(pacing)),
            Arc::new(JiraTicket::new(pacing)),
            Arc::new(RollbackDeployment::new(pacing)),
        ],
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct Echo;

    #[async_trait]
    impl Tool for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }

        fn description(&self) -> &'static str {
            "Returns its parameters"
        }

        async fn call(&self, params: &Value) -> Result<Value> {
            if params.get("fail").is_some() {
                return Err(DeployGuardError::InvalidInput("asked to fail".to_string()));
            }
            Ok(params.clone())
        }
    }

    fn agent() -> Agent {
        Agent::new("EchoAgent", "Echo everything.", vec![Arc::new(Echo)])
    }

    #[tokio::test]
    async fn test_invoke_wraps_call_in_events() {
        let (sink, mut rx) = EventSink::channel(8);
        let result = agent()
            .invoke(&sink, "echo", &json!({"x": 1}))
            .await
            .unwrap();
        assert_eq!(result, json!({"x": 1}));

        assert_eq!(
            rx.recv().await.unwrap(),
            WorkflowEvent::ToolStart {
                agent: NameRef::new("EchoAgent"),
                tool: NameRef::new("echo"),
            }
        );
        match rx.recv().await.unwrap() {
            WorkflowEvent::ToolFinish { result, .. } => assert_eq!(result, json!({"x": 1})),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_failed_call_has_no_finish_event() {
        let (sink, mut rx) = EventSink::channel(8);
        let result = agent().invoke(&sink, "echo", &json!({"fail": true})).await;
        assert!(result.is_err());

        drop(sink);
        assert_eq!(rx.recv().await.unwrap().kind(), "tool:start");
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_run_plan_in_order() {
        let (sink, mut rx) = EventSink::channel(8);
        let results = agent()
            .run(&sink, &[("echo", json!({"n": 1})), ("echo", json!({"n": 2}))])
            .await
            .unwrap();
        assert_eq!(results, vec![json!({"n": 1}), json!({"n": 2})]);

        drop(sink);
        let mut kinds = Vec::new();
        while let Some(event) = rx.recv().await {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, ["tool:start", "tool:finish", "tool:start", "tool:finish"]);
    }

    #[test]
    fn test_builtin_agents() {
        let validator = validator_agent(Vec::new(), Pacing::none());
        assert_eq!(validator.name(), VALIDATOR_AGENT);
        assert_eq!(validator.tool_names(), vec!["llamaIndexValidator"]);

        let remediation = remediation_agent(Pacing::none());
        assert_eq!(
            remediation.tool_names(),
            vec!["slackAlert", "jiraTicket", "rollbackDeployment"]
        );
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let (sink, _rx) = EventSink::channel(8);
        let err = agent().invoke(&sink, "missing", &json!({})).await.unwrap_err();
        assert!(err.to_string().contains("EchoAgent has no tool named missing"));
        assert_eq!(agent().tool_names(), vec!["echo"]);
        assert_eq!(agent().describe()["tools"][0]["description"], "Returns its parameters");
    }
}
