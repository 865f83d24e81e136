// Common test utilities shared by the integration suites
// Servers run on an ephemeral port and are read back over real HTTP

#![allow(dead_code)]

pub mod builders;
pub mod fixtures;
pub mod mocks;

use deployguard::server::{AppState, build_router};
use deployguard::sse::SseDecoder;
use deployguard::workflow::WorkflowEvent;
use futures::StreamExt;
use serde_json::Value;
use std::net::SocketAddr;
use std::time::Duration;

/// Upper bound for reading one event stream in tests.
pub const STREAM_LIMIT: Duration = Duration::from_secs(30);

/// Serve `state` on 127.0.0.1 with an OS-assigned port.
pub async fn spawn_server(state: AppState) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    let app = build_router(state);
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

/// A streamed response: status, content type and every decoded event.
pub struct StreamedResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub cache_control: Option<String>,
    pub events: Vec<WorkflowEvent>,
}

impl StreamedResponse {
    pub fn kinds(&self) -> Vec<&'static str> {
        self.events.iter().map(|e| e.kind()).collect()
    }
}

/// GET an SSE endpoint and read it until the server closes it.
pub async fn read_stream(url: &str) -> StreamedResponse {
    let response = reqwest::get(url).await.expect("request stream");
    let header = |name: reqwest::header::HeaderName| {
        response
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(String::from)
    };
    let content_type = header(reqwest::header::CONTENT_TYPE);
    let cache_control = header(reqwest::header::CACHE_CONTROL);
    let status = response.status().as_u16();

    let mut body = response.bytes_stream();
    let mut decoder = SseDecoder::new();
    let mut events = Vec::new();

    let read = async {
        while let Some(chunk) = body.next().await {
            for frame in decoder.feed(&chunk.expect("stream chunk")) {
                events.push(serde_json::from_str(&frame.data).expect("workflow event"));
            }
        }
    };
    tokio::time::timeout(STREAM_LIMIT, read)
        .await
        .expect("stream did not end in time");

    StreamedResponse {
        status,
        content_type,
        cache_control,
        events,
    }
}

pub async fn get_json(url: &str) -> (u16, Value) {
    let response = reqwest::get(url).await.expect("request");
    let status = response.status().as_u16();
    (status, response.json().await.expect("json body"))
}

pub async fn post_json(url: &str) -> (u16, Value) {
    let response = reqwest::Client::new()
        .post(url)
        .send()
        .await
        .expect("request");
    let status = response.status().as_u16();
    (status, response.json().await.expect("json body"))
}

/// Assertion helpers for event streams
pub struct AssertionHelper;

impl AssertionHelper {
    /// Assert that `expected` appear in this relative order within `kinds`
    pub fn assert_in_order(kinds: &[&str], expected: &[&str]) {
        let mut rest = kinds.iter();
        for wanted in expected {
            assert!(
                rest.any(|k| k == wanted),
                "event '{}' missing or out of order in {:?}",
                wanted,
                kinds
            );
        }
    }

    pub fn assert_json_has_field(json: &Value, field: &str) {
        assert!(
            json.get(field).is_some(),
            "JSON does not contain required field '{}'",
            field
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_assert_in_order() {
        AssertionHelper::assert_in_order(&["a", "b", "c", "d"], &["a", "c", "d"]);
    }

    #[test]
    #[should_panic(expected = "out of order")]
    fn test_assert_in_order_rejects_swapped() {
        AssertionHelper::assert_in_order(&["a", "b", "c"], &["c", "a"]);
    }

    #[test]
    #[should_panic(expected = "JSON does not contain required field")]
    fn test_assertion_helper_missing_field() {
        AssertionHelper::assert_json_has_field(&json!({"other": "value"}), "state");
    }
}
