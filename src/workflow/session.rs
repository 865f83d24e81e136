use serde::Serialize;

use super::pipeline::Deployment;
use crate::error::{DeployGuardError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DemoState {
    Idle,
    Running,
    Finished,
    Breached,
    Remediating,
    Remediated,
}

impl DemoState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DemoState::Idle => "idle",
            DemoState::Running => "running",
            DemoState::Finished => "finished",
            DemoState::Breached => "breached",
            DemoState::Remediating => "remediating",
            DemoState::Remediated => "remediated",
        }
    }

    fn is_busy(&self) -> bool {
        matches!(
            self,
            DemoState::Running | DemoState::Breached | DemoState::Remediating
        )
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: DemoState,
    #[serde(rename = "deploymentId")]
    pub deployment_id: Option<String>,
    pub deployment: Option<Deployment>,
}

/// State of the single demo the server hosts.
///
/// Every run or breach gets a generation number. Results reported with an
/// outdated generation (the session was reset meanwhile) are dropped.
#[derive(Debug)]
pub struct DemoSession {
    state: DemoState,
    deployment: Option<Deployment>,
    generation: u64,
}

impl DemoSession {
    pub fn new() -> Self {
        Self {
            state: DemoState::Idle,
            deployment: None,
            generation: 0,
        }
    }

    pub fn state(&self) -> DemoState {
        self.state
    }

    pub fn deployment(&self) -> Option<&Deployment> {
        self.deployment.as_ref()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            state: self.state,
            deployment_id: self.deployment.as_ref().map(|d| d.deployment_id.clone()),
            deployment: self.deployment.clone(),
        }
    }

    /// Starts a deployment run. Refused while another run or a breach is in
    /// flight.
    pub fn begin_run(&mut self) -> Result<u64> {
        if self.state.is_busy() {
            return Err(DeployGuardError::InvalidState(format!(
                "Cannot start a deployment while the demo is {}",
                self.state.as_str()
            )));
        }
        self.generation += 1;
        self.state = DemoState::Running;
        self.deployment = None;
        Ok(self.generation)
    }

    pub fn finish_run(&mut self, generation: u64, outcome: Result<Deployment>) {
        if generation != self.generation || self.state != DemoState::Running {
            log::debug!("Ignoring outcome of stale run {}", generation);
            return;
        }
        match outcome {
            Ok(deployment) => {
                self.state = DemoState::Finished;
                self.deployment = Some(deployment);
            }
            Err(e) => {
                log::warn!("Run {} ended without a deployment: {}", generation, e);
                self.state = DemoState::Idle;
            }
        }
    }

    /// Only a finished deployment can be broken.
    pub fn begin_breach(&mut self) -> Result<(u64, Deployment)> {
        let deployment = match (&self.state, &self.deployment) {
            (DemoState::Finished, Some(deployment)) => deployment.clone(),
            _ => {
                return Err(DeployGuardError::InvalidState(format!(
                    "A breach needs a finished deployment, the demo is {}",
                    self.state.as_str()
                )));
            }
        };
        self.generation += 1;
        self.state = DemoState::Breached;
        Ok((self.generation, deployment))
    }

    pub fn begin_remediation(&mut self, generation: u64) {
        if generation == self.generation && self.state == DemoState::Breached {
            self.state = DemoState::Remediating;
        }
    }

    pub fn finish_breach<T>(&mut self, generation: u64, outcome: &Result<T>) {
        if generation != self.generation || !self.state.is_busy() {
            return;
        }
        self.state = match outcome {
            Ok(_) => DemoState::Remediated,
            Err(_) => DemoState::Finished,
        };
    }

    pub fn reset(&mut self) {
        self.generation += 1;
        self.state = DemoState::Idle;
        self.deployment = None;
    }
}

impl Default for DemoSession {
    fn default() -> Self {
        Self::new()
    }
}
