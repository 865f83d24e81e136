mod routes;
pub mod schema;
mod stream;

use axum::Router;
use axum::routing::{get, post};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::datadog::DatadogClient;
use crate::error::Result;
use crate::workflow::{DemoSession, DeployGuardWorkflow, WorkflowSettings};

/// Events buffered per stream before the workflow waits for the client.
pub const EVENT_BUFFER: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub workflow: Arc<DeployGuardWorkflow>,
    pub session: Arc<RwLock<DemoSession>>,
}

impl AppState {
    pub fn new(workflow: DeployGuardWorkflow) -> Self {
        Self {
            workflow: Arc::new(workflow),
            session: Arc::new(RwLock::new(DemoSession::new())),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = Arc::new(DatadogClient::from_config(config)?);
        Ok(Self::new(DeployGuardWorkflow::new(
            WorkflowSettings::from_config(config),
            client,
        )))
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/healthz", get(routes::healthz))
        .route("/api/deploy", get(routes::deploy))
        .route("/api/breach", get(routes::breach))
        .route("/api/reset", post(routes::reset))
        .route("/api/state", get(routes::state))
        .route("/api/tools", get(routes::tools))
        .with_state(state)
}

pub async fn serve(state: AppState, bind: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(bind).await?;
    log::info!("DeployGuard listening on http://{}", listener.local_addr()?);
    axum::serve(listener, build_router(state)).await?;
    Ok(())
}
