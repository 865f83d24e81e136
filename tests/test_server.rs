mod common;

use common::builders::StateBuilder;
use common::{AssertionHelper, get_json, post_json, read_stream, spawn_server};
use deployguard::tools::Pacing;
use deployguard::workflow::WorkflowEvent;
use futures::StreamExt;

#[tokio::test]
async fn test_health_and_index() {
    let addr = spawn_server(StateBuilder::offline().build()).await;

    let health = reqwest::get(format!("http://{}/healthz", addr)).await.unwrap();
    assert_eq!(health.status(), 200);
    assert_eq!(health.text().await.unwrap(), "ok");

    let index = reqwest::get(format!("http://{}/", addr)).await.unwrap();
    assert_eq!(index.status(), 200);
    let html = index.text().await.unwrap();
    assert!(html.contains("EventSource"));
    assert!(html.contains("/api/deploy"));
}

#[tokio::test]
async fn test_initial_state_is_idle() {
    let addr = spawn_server(StateBuilder::offline().build()).await;

    let (status, state) = get_json(&format!("http://{}/api/state", addr)).await;
    assert_eq!(status, 200);
    assert_eq!(state["state"], "idle");
    assert!(state["deploymentId"].is_null());
}

#[tokio::test]
async fn test_deploy_streams_full_workflow() {
    let addr = spawn_server(StateBuilder::offline().build()).await;

    let response = read_stream(&format!("http://{}/api/deploy", addr)).await;
    assert_eq!(response.status, 200);
    assert_eq!(response.content_type.as_deref(), Some("text/event-stream"));
    assert_eq!(response.cache_control.as_deref(), Some("no-cache"));

    let kinds = response.kinds();
    assert_eq!(kinds.first(), Some(&"workflow:start"));
    assert_eq!(kinds.last(), Some(&"workflow:finish"));
    AssertionHelper::assert_in_order(
        &kinds,
        &[
            "workflow:start",
            "step:start",
            "tool:start",
            "tool:finish",
            "step:finish",
            "metrics:sample",
            "step:finish",
            "workflow:finish",
        ],
    );

    let steps: Vec<String> = response
        .events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::StepStart { step } => Some(step.name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(
        steps,
        [
            "Pre-Deployment Validation",
            "Deploy to Production",
            "Initiate Continuous Monitoring"
        ]
    );

    let (_, state) = get_json(&format!("http://{}/api/state", addr)).await;
    assert_eq!(state["state"], "finished");
    assert!(
        state["deploymentId"]
            .as_str()
            .unwrap()
            .starts_with("deploy-")
    );
    assert_eq!(state["deployment"]["mode"], "mock");
}

#[tokio::test]
async fn test_second_deploy_refused_while_running() {
    let state = StateBuilder::offline()
        .with_pacing(Pacing::scaled(0.2))
        .build();
    let addr = spawn_server(state).await;
    let url = format!("http://{}/api/deploy", addr);

    let first = reqwest::get(&url).await.unwrap();
    assert_eq!(first.status(), 200);

    let (status, body) = get_json(&url).await;
    assert_eq!(status, 409);
    assert!(body["error"].as_str().unwrap().contains("running"));

    // drain the first run so it can finish
    let mut stream = first.bytes_stream();
    while let Some(chunk) = stream.next().await {
        chunk.unwrap();
    }
    let (_, state) = get_json(&format!("http://{}/api/state", addr)).await;
    assert_eq!(state["state"], "finished");
}

#[tokio::test]
async fn test_blocked_model_ends_with_error() {
    let state = StateBuilder::offline()
        .with_blocked_model("CustomerChurn-v3")
        .build();
    let addr = spawn_server(state).await;

    let response = read_stream(&format!("http://{}/api/deploy", addr)).await;
    let kinds = response.kinds();
    assert_eq!(kinds.last(), Some(&"error"));
    assert!(!kinds.contains(&"workflow:finish"));

    let (_, state) = get_json(&format!("http://{}/api/state", addr)).await;
    assert_eq!(state["state"], "idle");
}

#[tokio::test]
async fn test_breach_requires_finished_deployment() {
    let addr = spawn_server(StateBuilder::offline().build()).await;

    let (status, body) = get_json(&format!("http://{}/api/breach", addr)).await;
    assert_eq!(status, 409);
    AssertionHelper::assert_json_has_field(&body, "error");
}

#[tokio::test]
async fn test_breach_after_deploy_remediates() {
    let addr = spawn_server(StateBuilder::offline().build()).await;
    read_stream(&format!("http://{}/api/deploy", addr)).await;

    let response = read_stream(&format!("http://{}/api/breach", addr)).await;
    assert_eq!(response.status, 200);
    let kinds = response.kinds();
    AssertionHelper::assert_in_order(
        &kinds,
        &[
            "metrics:sample",
            "breach:detected",
            "remediation:start",
            "remediation:finish",
            "remediation:start",
            "remediation:finish",
            "remediation:start",
            "remediation:finish",
            "remediation:complete",
        ],
    );

    let remediation_steps: Vec<String> = response
        .events
        .iter()
        .filter_map(|e| match e {
            WorkflowEvent::RemediationFinish { step } => Some(step.name.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(remediation_steps, ["Send Alert", "Create Ticket", "Rollback"]);

    let (_, state) = get_json(&format!("http://{}/api/state", addr)).await;
    assert_eq!(state["state"], "remediated");

    // a second breach on the same deployment is refused
    let (status, _) = get_json(&format!("http://{}/api/breach", addr)).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_reset_returns_to_idle() {
    let addr = spawn_server(StateBuilder::offline().build()).await;
    read_stream(&format!("http://{}/api/deploy", addr)).await;

    let (status, state) = post_json(&format!("http://{}/api/reset", addr)).await;
    assert_eq!(status, 200);
    assert_eq!(state["state"], "idle");
    assert!(state["deploymentId"].is_null());

    let (status, _) = get_json(&format!("http://{}/api/breach", addr)).await;
    assert_eq!(status, 409);
}

#[tokio::test]
async fn test_tool_catalog() {
    let addr = spawn_server(StateBuilder::offline().build()).await;

    let (status, catalog) = get_json(&format!("http://{}/api/tools", addr)).await;
    assert_eq!(status, 200);
    assert_eq!(catalog["model"], "CustomerChurn-v3");
    assert_eq!(catalog["agents"][0]["name"], "ValidatorAgent");
    assert_eq!(catalog["agents"][1]["tools"].as_array().unwrap().len(), 3);
}
