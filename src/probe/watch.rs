use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio::time::{Instant, timeout_at};

use crate::error::{DeployGuardError, Result};
use crate::sse::SseDecoder;
use crate::workflow::WorkflowEvent;

pub const DEFAULT_WATCH_URL: &str = "http://localhost:3000/api/deploy";
pub const DEFAULT_WATCH_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Clone, Serialize)]
pub struct WatchReport {
    pub events: Vec<WorkflowEvent>,
    /// Type of the event that ended the stream, if one did.
    pub ended_by: Option<&'static str>,
    pub timed_out: bool,
}

impl WatchReport {
    pub fn succeeded(&self) -> bool {
        matches!(self.ended_by, Some("workflow:finish" | "remediation:complete"))
    }
}

/// Connects to a running server's event stream and hands every event to
/// `on_event` until a terminal event arrives or `limit` passes.
pub async fn watch<F>(url: &str, limit: Duration, mut on_event: F) -> Result<WatchReport>
where
    F: FnMut(&WorkflowEvent),
{
    let deadline = Instant::now() + limit;
    let client = Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .build()?;

    let mut report = WatchReport {
        events: Vec::new(),
        ended_by: None,
        timed_out: false,
    };

    let request = client
        .get(url)
        .header("Accept", "text/event-stream")
        .send();
    let response = match timeout_at(deadline, request).await {
        Ok(response) => response?,
        Err(_) => {
            report.timed_out = true;
            return Ok(report);
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(DeployGuardError::ApiError(format!("HTTP {}: {}", status, body)));
    }
    log::info!("[Watch] Connected to {}", url);

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    loop {
        let (frames, ended) = match timeout_at(deadline, body.next()).await {
            Err(_) => {
                log::warn!("[Watch] Timeout reached, closing connection");
                report.timed_out = true;
                break;
            }
            Ok(None) => (decoder.finish().into_iter().collect::<Vec<_>>(), true),
            Ok(Some(chunk)) => (decoder.feed(&chunk?), false),
        };

        for frame in frames {
            let event: WorkflowEvent = match serde_json::from_str(&frame.data) {
                Ok(event) => event,
                Err(e) => {
                    log::warn!("[Watch] Skipping unparseable event: {}", e);
                    continue;
                }
            };

            on_event(&event);
            let terminal = event.is_terminal();
            let kind = event.kind();
            report.events.push(event);

            if terminal {
                report.ended_by = Some(kind);
                return Ok(report);
            }
        }

        if ended {
            break;
        }
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sse_body(frames: &[&str]) -> String {
        frames.iter().map(|f| format!("data: {}\n\n", f)).collect()
    }

    #[tokio::test]
    async fn test_watch_stops_on_workflow_finish() {
        let server = MockServer::start().await;
        let body = sse_body(&[
            r#"{"type":"step:start","step":{"name":"Deploy to Production"}}"#,
            "not json",
            r#"{"type":"workflow:finish","run":{"id":"run-1"},"result":{"status":"success"}}"#,
            r#"{"type":"error","error":"never read"}"#,
        ]);
        Mock::given(method("GET"))
            .and(path("/api/deploy"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/event-stream")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;

        let mut seen = Vec::new();
        let report = watch(
            &format!("{}/api/deploy", server.uri()),
            Duration::from_secs(5),
            |e| seen.push(e.kind()),
        )
        .await
        .unwrap();

        assert_eq!(seen, ["step:start", "workflow:finish"]);
        assert_eq!(report.ended_by, Some("workflow:finish"));
        assert!(report.succeeded());
        assert!(!report.timed_out);
    }

    #[tokio::test]
    async fn test_watch_reports_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/deploy"))
            .respond_with(ResponseTemplate::new(409).set_body_string(r#"{"error":"busy"}"#))
            .mount(&server)
            .await;

        let result = watch(
            &format!("{}/api/deploy", server.uri()),
            Duration::from_secs(5),
            |_| {},
        )
        .await;
        assert_matches!(result, Err(DeployGuardError::ApiError(msg)) if msg.contains("409"));
    }

    #[tokio::test]
    async fn test_watch_reads_unterminated_last_frame() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"type\":\"step:start\",\"step\":{\"name\":\"Deploy to Production\"}}\n\n",
            "data: {\"type\":\"error\",\"error\":\"model blocked\"}",
        );
        Mock::given(method("GET"))
            .and(path("/api/deploy"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let report = watch(
            &format!("{}/api/deploy", server.uri()),
            Duration::from_secs(5),
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(report.events.len(), 2);
        assert_eq!(report.ended_by, Some("error"));
        assert!(!report.succeeded());
    }

    #[tokio::test]
    async fn test_watch_stream_ending_early() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/deploy"))
            .respond_with(ResponseTemplate::new(200).set_body_string(sse_body(&[
                r#"{"type":"step:start","step":{"name":"Pre-Deployment Validation"}}"#,
            ])))
            .mount(&server)
            .await;

        let report = watch(
            &format!("{}/api/deploy", server.uri()),
            Duration::from_secs(5),
            |_| {},
        )
        .await
        .unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.ended_by, None);
        assert!(!report.succeeded());
    }
}
