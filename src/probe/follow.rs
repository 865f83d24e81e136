use futures::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

use super::prober::ProbeOutcome;
use crate::datadog::{AuthStyle, DatadogClient};
use crate::error::Result;
use crate::sse::{SseDecoder, SseEvent};

/// Id of the first monitor listed in a discovery response, if any.
pub fn first_monitor_id(body: &Value) -> Option<String> {
    let id = &body["monitors"].as_array()?.first()?["id"];
    match id {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn monitor_events_url(server_url: &str, monitor_id: &str) -> String {
    format!(
        "{}/v1/monitors/{}/events",
        server_url.trim_end_matches('/'),
        monitor_id
    )
}

/// Reads an event stream until it ends or `limit` has passed.
pub async fn follow_stream(
    client: &DatadogClient,
    url: &str,
    auth: AuthStyle,
    limit: Duration,
) -> Result<Vec<SseEvent>> {
    log::info!("[Stream] Following {} for {:?}", url, limit);
    let deadline = Instant::now() + limit;

    let response = match timeout_at(deadline, client.open_event_stream(url, auth)).await {
        Ok(response) => response?,
        Err(_) => {
            log::warn!("[Stream] No response from {} within {:?}", url, limit);
            return Ok(Vec::new());
        }
    };

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();

    loop {
        match timeout_at(deadline, body.next()).await {
            Err(_) => {
                log::info!("[Stream] Closing {} after {:?}", url, limit);
                break;
            }
            Ok(None) => {
                events.extend(decoder.finish());
                break;
            }
            Ok(Some(chunk)) => {
                for event in decoder.feed(&chunk?) {
                    log::info!("[Stream] Event: {}", event.data);
                    events.push(event);
                }
            }
        }
    }
    Ok(events)
}

/// Follows the event stream of the first monitor a successful discovery
/// response listed. Returns the stream URL with what was read from it.
pub async fn follow_discovered(
    client: &DatadogClient,
    outcomes: &[ProbeOutcome],
    limit: Duration,
) -> Result<Option<(String, Vec<SseEvent>)>> {
    let discovered = outcomes
        .iter()
        .filter(|o| o.is_success())
        .find_map(|o| Some((o, first_monitor_id(o.body.as_ref()?)?)));

    let Some((outcome, monitor_id)) = discovered else {
        log::info!("[Stream] No monitors found in discovery data");
        return Ok(None);
    };

    let auth = outcome.auth.parse().unwrap_or(AuthStyle::AppKeys);
    let url = monitor_events_url(client.mcp_server_url(), &monitor_id);
    let events = follow_stream(client, &url, auth, limit).await?;
    Ok(Some((url, events)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;
    use crate::probe::prober::ProbeMethod;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> DatadogClient {
        DatadogClient::with_endpoints(
            Credentials::new("api", "app"),
            server.uri(),
            format!("{}/mcp", server.uri()),
        )
        .unwrap()
    }

    fn discovery_outcome(body: Value) -> ProbeOutcome {
        ProbeOutcome {
            endpoint: "http://localhost/discovery".to_string(),
            method: ProbeMethod::Get.as_str(),
            auth: AuthStyle::AppKeys.label(),
            status: Some(200),
            is_json: true,
            preview: body.to_string(),
            error: None,
            body: Some(body),
        }
    }

    #[test]
    fn test_first_monitor_id() {
        assert_eq!(
            first_monitor_id(&json!({"monitors": [{"id": 42}, {"id": 43}]})),
            Some("42".to_string())
        );
        assert_eq!(
            first_monitor_id(&json!({"monitors": [{"id": "mon-a"}]})),
            Some("mon-a".to_string())
        );
        assert_eq!(first_monitor_id(&json!({"monitors": []})), None);
        assert_eq!(first_monitor_id(&json!({"tools": []})), None);
    }

    #[test]
    fn test_monitor_events_url() {
        assert_eq!(
            monitor_events_url("https://mcp.example.com/mcp/", "7"),
            "https://mcp.example.com/mcp/v1/monitors/7/events"
        );
    }

    #[tokio::test]
    async fn test_follow_discovered_stream() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mcp/v1/monitors/42/events"))
            .and(header("DD-APPLICATION-KEY", "app"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string("data: {\"state\":\"OK\"}\n\n: ping\n\ndata: {\"state\":\"Alert\"}\n\n"),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let outcomes = vec![discovery_outcome(json!({"monitors": [{"id": 42}]}))];
        let (url, events) = follow_discovered(&client, &outcomes, Duration::from_secs(5))
            .await
            .unwrap()
            .unwrap();

        assert!(url.ends_with("/mcp/v1/monitors/42/events"));
        let data: Vec<&str> = events.iter().map(|e| e.data.as_str()).collect();
        assert_eq!(data, [r#"{"state":"OK"}"#, r#"{"state":"Alert"}"#]);
    }

    #[tokio::test]
    async fn test_follow_gives_up_after_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/slow"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("data: late\n\n")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        let events = follow_stream(
            &client,
            &format!("{}/slow", server.uri()),
            AuthStyle::AppKeys,
            Duration::from_millis(200),
        )
        .await
        .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_nothing_to_follow() {
        let server = MockServer::start().await;
        let outcomes = vec![discovery_outcome(json!({"tools": []}))];
        let followed = follow_discovered(&client(&server), &outcomes, Duration::from_secs(1))
            .await
            .unwrap();
        assert!(followed.is_none());
    }
}
