use async_trait::async_trait;
use serde_json::{Value, json};

use super::Tool;
use super::common::{Pacing, ParamReader};
use crate::error::Result;

pub const VALIDATOR_TOOL: &str = "llamaIndexValidator";

/// Checks a model against the internal policy corpus.
///
/// The retrieval system itself is simulated: every model passes with a fixed
/// confidence unless the policy explicitly blocks it.
pub struct LlamaIndexValidator {
    blocked_models: Vec<String>,
    pacing: Pacing,
}

impl ParamReader for LlamaIndexValidator {}

impl LlamaIndexValidator {
    pub fn new(blocked_models: Vec<String>, pacing: Pacing) -> Self {
        Self {
            blocked_models,
            pacing,
        }
    }

    fn is_blocked(&self, model_name: &str) -> bool {
        self.blocked_models
            .iter()
            .any(|blocked| blocked.eq_ignore_ascii_case(model_name))
    }
}

#[async_trait]
impl Tool for LlamaIndexValidator {
    fn name(&self) -> &'static str {
        VALIDATOR_TOOL
    }

    fn description(&self) -> &'static str {
        "Validates a model against internal policies using a LlamaIndex RAG system."
    }

    async fn call(&self, params: &Value) -> Result<Value> {
        let model_name = self.required_str(params, "modelName")?;
        let policy = self.required_str(params, "policyDocument")?;

        log::info!("[Validator Tool] Checking {} against {}", model_name, policy);
        self.pacing.wait(self.pacing.validator()).await;

        if self.is_blocked(model_name) {
            log::warn!("[Validator Tool] {} is blocked by {}", model_name, policy);
            return Ok(json!({
                "status": "failure",
                "reason": format!("Model {} is not approved under {}.", model_name, policy),
                "confidence": 0.99
            }));
        }

        Ok(json!({
            "status": "success",
            "reason": "Model output aligns with fairness guidelines.",
            "confidence": 0.98
        }))
    }
}
