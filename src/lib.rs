// Library interface for DeployGuard
// The binary is a thin CLI over these modules

pub mod config;
pub mod datadog;
pub mod error;
pub mod probe;
pub mod server;
pub mod sse;
pub mod tools;
pub mod utils;
pub mod workflow;

// Re-export commonly used types
pub use config::Config;
pub use datadog::DatadogClient;
pub use error::{DeployGuardError, Result};
pub use workflow::{DeployGuardWorkflow, WorkflowEvent};
