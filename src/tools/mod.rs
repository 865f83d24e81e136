pub mod common;
pub mod datadog_mcp;
pub mod remediation;
pub mod validator;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

pub use common::Pacing;
pub use datadog_mcp::{ConnectionMode, DatadogMcp};

/// A named capability an agent can invoke with JSON parameters.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    async fn call(&self, params: &Value) -> Result<Value>;
}
