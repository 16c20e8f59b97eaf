use linuxaid_utils::load_env_file_if_exists;

use crate::{
    agent::{AgentController, AgentRunOutcome, AgentVerdict},
    api::{ControlPlane, LastRunReport},
    config::OrchestratorContext,
};

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Runs the agent once in no-op mode and uploads its report.
///
/// Telemetry is best effort; only the agent's exit code is returned.
pub async fn run_agent_once(
    context: &OrchestratorContext,
    control_plane: &dyn ControlPlane,
    agent: &dyn AgentController,
) -> AgentRunOutcome {
    match load_env_file_if_exists(context.get_agent_env_file()) {
        Ok(true) => tracing::debug!("loaded agent environment file"),
        Ok(false) => {}
        Err(e) => tracing::warn!(error = %e, "failed to load agent environment file"),
    }

    if let Err(e) = control_plane.ping().await {
        tracing::warn!(error = %e, "failed to ping control plane");
    }

    let outcome = agent.run(true).await;
    match outcome.verdict() {
        verdict @ AgentVerdict::Continue { .. } => {
            tracing::info!(exit_code = outcome.exit_code(), %verdict, "agent run completed")
        }
        verdict @ AgentVerdict::RunFailed => {
            tracing::error!(exit_code = outcome.exit_code(), %verdict, "agent run failed")
        }
        verdict => {
            tracing::warn!(exit_code = outcome.exit_code(), %verdict, "agent run completed with failures")
        }
    }

    match LastRunReport::load(context.get_last_run_report_file()) {
        Ok(report) => {
            if let Err(e) = control_plane.report_agent_run_outcome(&report).await {
                tracing::warn!(error = %e, status_code = e.status_code(), "failed to upload agent run report");
            }
        }
        Err(e) => tracing::warn!(error = %e, "failed to read agent run report"),
    }

    outcome
}
