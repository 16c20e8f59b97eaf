//! The update workflow and the single agent run.
//!
//! [`UpdateOrchestrator`] sequences the collaborators of a `system-update` run through the
//! states of [`UpdateState`]. Once the service window is known to be open, the agent is
//! re-enabled on every path out of the workflow by an [`AgentCleanup`] guard.

mod agent_run;
mod cleanup;
mod orchestrator;
mod state;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use agent_run::*;
pub use cleanup::*;
pub use orchestrator::*;
pub use state::*;
