use crate::error::{DeployGuardError, Result};
use serde_json::Value;
use std::time::Duration;

/// Simulated latencies used to pace the demo, in milliseconds at scale 1.0.
const VALIDATOR_LATENCY_MS: u64 = 1500;
const DEPLOY_LATENCY_MS: u64 = 1000;
const MONITOR_LATENCY_MS: u64 = 1500;
const METRICS_LATENCY_MS: u64 = 1000;
const SAMPLE_INTERVAL_MS: u64 = 500;
const REMEDIATION_LATENCY_MS: u64 = 1000;

/// How long each simulated step takes. A scale of 0 disables all waiting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pacing {
    scale: f64,
}

impl Pacing {
    pub fn scaled(scale: f64) -> Self {
        Self {
            scale: scale.max(0.0),
        }
    }

    pub fn none() -> Self {
        Self::scaled(0.0)
    }

    fn of(&self, millis: u64) -> Duration {
        Duration::from_millis((millis as f64 * self.scale).round() as u64)
    }

    pub fn validator(&self) -> Duration {
        self.of(VALIDATOR_LATENCY_MS)
    }

    pub fn deploy(&self) -> Duration {
        self.of(DEPLOY_LATENCY_MS)
    }

    pub fn monitor(&self) -> Duration {
        self.of(MONITOR_LATENCY_MS)
    }

    pub fn metrics(&self) -> Duration {
        self.of(METRICS_LATENCY_MS)
    }

    pub fn sample_interval(&self) -> Duration {
        self.of(SAMPLE_INTERVAL_MS)
    }

    pub fn remediation(&self) -> Duration {
        self.of(REMEDIATION_LATENCY_MS)
    }

    pub async fn wait(&self, duration: Duration) {
        if !duration.is_zero() {
            tokio::time::sleep(duration).await;
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Self::scaled(1.0)
    }
}

pub trait ParamReader {
    /// Required non-empty string parameter
    fn required_str<'a>(&self, params: &'a Value, key: &str) -> Result<&'a str> {
        params[key]
            .as_str()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| DeployGuardError::InvalidInput(format!("Missing '{}' parameter", key)))
    }

    fn optional_str<'a>(&self, params: &'a Value, key: &str) -> Option<&'a str> {
        params[key].as_str().filter(|s| !s.trim().is_empty())
    }

    fn optional_f64(&self, params: &Value, key: &str) -> Result<Option<f64>> {
        match &params[key] {
            Value::Null => Ok(None),
            value => value.as_f64().map(Some).ok_or_else(|| {
                DeployGuardError::InvalidInput(format!("'{}' must be a number", key))
            }),
        }
    }
}
