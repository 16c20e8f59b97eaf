use crate::agent::AgentController;

use super::UpdateState;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Re-enables the agent at most once, however the workflow ends.
///
/// The guard is armed once the service window is known to be open. [`run`](Self::run) must be
/// awaited on the way out; a guard dropped while still armed logs an error, since re-enabling
/// needs the async runtime.
pub struct AgentCleanup<'a> {
    agent: &'a dyn AgentController,
    pending: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<'a> AgentCleanup<'a> {
    /// A guard that will re-enable the agent.
    pub fn armed(agent: &'a dyn AgentController) -> Self {
        Self {
            agent,
            pending: true,
        }
    }

    /// A guard with nothing to do.
    pub fn disarmed(agent: &'a dyn AgentController) -> Self {
        Self {
            agent,
            pending: false,
        }
    }

    /// Re-enables the agent unless that already happened. Failures are logged only.
    pub async fn run(&mut self) {
        if !self.pending {
            return;
        }
        self.pending = false;

        tracing::info!(state = %UpdateState::Cleanup, "entering state");
        if let Err(e) = self.agent.enable().await {
            tracing::error!(error = %e, "failed to re-enable agent");
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Drop for AgentCleanup<'_> {
    fn drop(&mut self) {
        if self.pending {
            tracing::error!("agent was left disabled, re-enable it with `puppet agent --enable`");
        }
    }
}
