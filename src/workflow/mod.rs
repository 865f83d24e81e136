pub mod agent;
pub mod breach;
pub mod events;
pub mod pipeline;
pub mod session;

pub use agent::Agent;
pub use breach::{BreachReport, BreachScenario};
pub use events::{EventSink, WorkflowEvent};
pub use pipeline::{DeployGuardWorkflow, Deployment, WorkflowSettings};
pub use session::{DemoSession, DemoState, SessionSnapshot};
