use crate::{
    agent::AgentController,
    api::{ControlPlane, SecurityExporter, ServiceWindow},
    config::{defaults::AGENT_DISABLE_MESSAGE, OrchestratorContext},
    host::HostControl,
    packages::{should_reboot, PackageManager},
    ErrorKind, LinuxaidError,
};

use super::{AgentCleanup, UpdateOutcome, UpdateState};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Runs the `system-update` workflow against its four collaborators.
pub struct UpdateOrchestrator {
    context: OrchestratorContext,
    control_plane: Box<dyn ControlPlane>,
    agent: Box<dyn AgentController>,
    packages: Box<dyn PackageManager>,
    host: Box<dyn HostControl>,
    security_exporter: Option<SecurityExporter>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl UpdateOrchestrator {
    /// Creates an orchestrator.
    pub fn new(
        context: OrchestratorContext,
        control_plane: Box<dyn ControlPlane>,
        agent: Box<dyn AgentController>,
        packages: Box<dyn PackageManager>,
        host: Box<dyn HostControl>,
    ) -> Self {
        Self {
            context,
            control_plane,
            agent,
            packages,
            host,
            security_exporter: None,
        }
    }

    /// Queries the security exporter for remaining updates after upgrading.
    pub fn with_security_exporter(mut self, exporter: SecurityExporter) -> Self {
        self.security_exporter = Some(exporter);
        self
    }

    /// Runs the workflow to the end and reports how it ended.
    ///
    /// The agent is re-enabled on every path once the service window was found open, except
    /// when the agent steps are skipped.
    pub async fn run(&self) -> UpdateOutcome {
        enter(UpdateState::Init);
        enter(UpdateState::Precheck);
        let distribution = match self.host.preflight().await {
            Ok(distribution) => distribution,
            Err(e) => return fail(UpdateState::Precheck, e),
        };

        if self.host.agent_disabled_by_operator().await {
            tracing::info!("agent has been disabled by an operator, nothing to do");
            return UpdateOutcome::AgentDisabled;
        }

        enter(UpdateState::AwaitWindow);
        let window = match self.control_plane.fetch_service_window_status().await {
            Ok(window) => window,
            Err(e) => return fail(UpdateState::AwaitWindow, e),
        };

        if !window.is_open() {
            tracing::info!("service window is not active, nothing to do");
            return UpdateOutcome::WindowInactive;
        }
        tracing::info!(
            window_type = %window.get_window_type(),
            timezone = %window.get_timezone(),
            "service window is active"
        );

        let mut cleanup = if self.context.get_skip_agent() {
            AgentCleanup::disarmed(&*self.agent)
        } else {
            AgentCleanup::armed(&*self.agent)
        };

        let outcome = self.maintain(&distribution, &window, &mut cleanup).await;
        cleanup.run().await;

        outcome
    }

    async fn maintain(
        &self,
        distribution: &str,
        window: &ServiceWindow,
        cleanup: &mut AgentCleanup<'_>,
    ) -> UpdateOutcome {
        enter(UpdateState::PrepareHost);
        if let Err(e) = self.packages.ensure_ca_certificates(distribution).await {
            return fail(UpdateState::PrepareHost, e);
        }

        if self.context.get_skip_agent() {
            tracing::info!("skipping configuration agent steps");
        } else {
            enter(UpdateState::AwaitAgentIdle);
            self.agent
                .wait_until_idle(*self.context.get_agent_wait_timeout())
                .await;
            if self.agent.is_running().await {
                tracing::warn!("agent is still running, aborting");
                return UpdateOutcome::AgentBusy;
            }

            enter(UpdateState::RunAgentDryRun);
            let run = self.agent.run(true).await;
            let verdict = run.verdict();
            if !verdict.should_continue() {
                tracing::warn!(exit_code = run.exit_code(), %verdict, "agent is not ready, aborting");
                return UpdateOutcome::AgentNotReady {
                    exit_code: run.exit_code(),
                    verdict,
                };
            }
            tracing::info!(exit_code = run.exit_code(), %verdict, "agent dry run is clean");

            enter(UpdateState::DisableAgent);
            if let Err(e) = self.agent.disable(AGENT_DISABLE_MESSAGE).await {
                return fail(UpdateState::DisableAgent, e);
            }
        }

        enter(UpdateState::Upgrade);
        if let Err(e) = self.packages.upgrade_packages(distribution).await {
            return fail(UpdateState::Upgrade, e);
        }
        self.log_pending_updates().await;

        enter(UpdateState::CloseWindow);
        if let Err(e) = self
            .control_plane
            .close_service_window(window.get_window_type(), window.get_timezone())
            .await
        {
            return fail(UpdateState::CloseWindow, e);
        }

        enter(UpdateState::KernelCheck);
        let kernel = match self.packages.detect_kernel_change().await {
            Ok(kernel) => kernel,
            Err(e) => return fail(UpdateState::KernelCheck, e),
        };

        if !should_reboot(&kernel, self.context.get_reboot()) {
            if kernel.has_changed() {
                tracing::info!("newer kernel installed, reboot is disabled");
            }
            enter(UpdateState::Done);
            return UpdateOutcome::Completed;
        }

        if let Err(e) = self.host.check_disk_space().await {
            return fail(UpdateState::KernelCheck, e);
        }

        enter(UpdateState::Reboot);
        cleanup.run().await;
        match self.host.reboot().await {
            Ok(()) => UpdateOutcome::Rebooting,
            Err(e) => fail(UpdateState::Reboot, e),
        }
    }

    async fn log_pending_updates(&self) {
        let Some(exporter) = &self.security_exporter else {
            return;
        };

        match exporter.package_updates().await {
            Ok(updates) => tracing::info!(
                total_number_of_packages_with_update = updates.total_number_of_packages_with_update,
                has_kernel_update = updates.has_kernel_update,
                "packages still pending an update"
            ),
            Err(e) => tracing::warn!(
                error = %e,
                kind = %ErrorKind::BestEffort,
                "failed to query security exporter"
            ),
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

fn enter(state: UpdateState) {
    tracing::info!(state = %state, "entering state");
}

fn fail(state: UpdateState, error: LinuxaidError) -> UpdateOutcome {
    let kind = error.kind().unwrap_or_else(|| state.error_kind());
    tracing::error!(
        state = %state,
        kind = %kind,
        status_code = error.status_code(),
        error = %error,
        "update failed"
    );

    UpdateOutcome::Failed { state, error }
}
