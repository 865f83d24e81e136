// Fake Datadog endpoints on a wiremock server

use super::fixtures::load_fixture;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Mount an MCP server that accepts the test keys.
pub async fn mount_mcp(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/mcp"))
        .and(header("DD-API-KEY", "test-api-key"))
        .and(header("DD-APPLICATION-KEY", "test-app-key"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("mcp_handshake")))
        .mount(server)
        .await;
}

pub async fn mount_create_monitor(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/api/v1/monitor"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("monitor_created")))
        .expect(1)
        .mount(server)
        .await;
}

pub async fn mount_metrics(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/v1/query"))
        .respond_with(ResponseTemplate::new(200).set_body_json(load_fixture("metrics_query")))
        .mount(server)
        .await;
}

/// Everything the monitoring step needs to stay live.
pub async fn mount_live_datadog(server: &MockServer) {
    mount_mcp(server).await;
    mount_create_monitor(server).await;
    mount_metrics(server).await;
}
