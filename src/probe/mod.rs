//! MCP endpoint discovery and stream watching.

pub mod follow;
pub mod prober;
pub mod targets;
pub mod watch;

pub use follow::{follow_discovered, follow_stream};
pub use prober::{KeyCheck, ProbeMethod, ProbeOutcome, ProbePlan, Prober};
pub use targets::{candidate_endpoints, mcp_base};
pub use watch::{WatchReport, watch};
