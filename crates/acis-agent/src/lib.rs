pub mod agent_loop;
pub mod context;
pub mod extract;
pub mod session;
pub mod workflow;

pub use agent_loop::{AgentRuntime, RunOutcome, ToolInvocation};
pub use extract::StateExtractor;
pub use session::SessionLanes;
pub use workflow::OnboardingWorkflow;
