use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use serde_json::json;

use super::stream::event_stream;
use super::{AppState, EVENT_BUFFER, schema};
use crate::error::DeployGuardError;
use crate::workflow::{BreachScenario, EventSink, WorkflowEvent};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

fn error_response(status: StatusCode, error: DeployGuardError) -> Response {
    (status, Json(json!({"error": error.to_string()}))).into_response()
}

pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub async fn state(State(state): State<AppState>) -> Response {
    Json(state.session.read().await.snapshot()).into_response()
}

pub async fn reset(State(state): State<AppState>) -> Response {
    let mut session = state.session.write().await;
    session.reset();
    log::info!("Demo reset");
    Json(session.snapshot()).into_response()
}

pub async fn tools(State(state): State<AppState>) -> Response {
    Json(schema::tool_catalog(&state.workflow)).into_response()
}

pub async fn deploy(State(state): State<AppState>) -> Response {
    let generation = match state.session.write().await.begin_run() {
        Ok(generation) => generation,
        Err(e) => return error_response(StatusCode::CONFLICT, e),
    };

    let (sink, rx) = EventSink::channel(EVENT_BUFFER);
    let workflow = state.workflow.clone();
    let session = state.session.clone();
    tokio::spawn(async move {
        let outcome = workflow.run(&sink).await;
        session.write().await.finish_run(generation, outcome);
    });

    event_stream(rx).into_response()
}

pub async fn breach(State(state): State<AppState>) -> Response {
    let (generation, deployment) = match state.session.write().await.begin_breach() {
        Ok(started) => started,
        Err(e) => return error_response(StatusCode::CONFLICT, e),
    };

    let (sink, rx) = EventSink::channel(EVENT_BUFFER);
    let scenario = BreachScenario::new(state.workflow.settings().clone());
    let session = state.session.clone();
    tokio::spawn(async move {
        let (inner, mut inner_rx) = EventSink::channel(EVENT_BUFFER);
        let run = async move { scenario.run(&deployment, &inner).await };

        // the client's stream stays open until the session is updated
        let forward = async {
            while let Some(event) = inner_rx.recv().await {
                if matches!(event, WorkflowEvent::BreachDetected { .. }) {
                    session.write().await.begin_remediation(generation);
                }
                if sink.emit(event).await.is_err() {
                    break;
                }
            }
            drop(inner_rx);
        };

        let (outcome, ()) = tokio::join!(run, forward);
        session.write().await.finish_breach(generation, &outcome);
        drop(sink);
    });

    event_stream(rx).into_response()
}
