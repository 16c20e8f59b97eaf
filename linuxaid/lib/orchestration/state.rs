use std::fmt::{self, Display};

use crate::{agent::AgentVerdict, ErrorKind, LinuxaidError};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The states of a `system-update` run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateState {
    /// Nothing has happened yet.
    Init,

    /// Checking the host and the operator's disable marker.
    Precheck,

    /// Asking the control plane for the service window.
    AwaitWindow,

    /// Refreshing the repository list and installing the CA bundle.
    PrepareHost,

    /// Waiting for a running agent to finish.
    AwaitAgentIdle,

    /// Running the agent in no-op mode.
    RunAgentDryRun,

    /// Disabling the agent for the duration of the upgrade.
    DisableAgent,

    /// Upgrading packages.
    Upgrade,

    /// Closing the service window.
    CloseWindow,

    /// Comparing installed and running kernels.
    KernelCheck,

    /// Rebooting into the new kernel.
    Reboot,

    /// Finished without a reboot.
    Done,

    /// Re-enabling the agent.
    Cleanup,
}

/// How a `system-update` run ended.
#[derive(Debug)]
pub enum UpdateOutcome {
    /// The operator disabled the agent, nothing was done.
    AgentDisabled,

    /// The service window is not open.
    WindowInactive,

    /// The agent was still running when the wait ran out.
    AgentBusy,

    /// The agent's dry run forbids maintenance.
    AgentNotReady {
        /// The agent's exit code.
        exit_code: i32,

        /// Its classification.
        verdict: AgentVerdict,
    },

    /// The host was upgraded and needs no reboot.
    Completed,

    /// The host was upgraded and the reboot was issued.
    Rebooting,

    /// A step failed.
    Failed {
        /// The state the failure happened in.
        state: UpdateState,

        /// What went wrong.
        error: LinuxaidError,
    },
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl UpdateState {
    /// The failure class of errors in this state that have no class of their own.
    pub fn error_kind(&self) -> ErrorKind {
        match self {
            UpdateState::Init | UpdateState::Precheck => ErrorKind::Precondition,
            UpdateState::AwaitWindow => ErrorKind::TransientApi,
            UpdateState::AwaitAgentIdle
            | UpdateState::RunAgentDryRun
            | UpdateState::DisableAgent => ErrorKind::Agent,
            UpdateState::PrepareHost | UpdateState::Upgrade => ErrorKind::Upgrade,
            UpdateState::CloseWindow => ErrorKind::WindowClose,
            UpdateState::KernelCheck => ErrorKind::KernelCheck,
            UpdateState::Reboot => ErrorKind::Reboot,
            UpdateState::Done | UpdateState::Cleanup => ErrorKind::BestEffort,
        }
    }
}

impl UpdateOutcome {
    /// The failure class, for failed runs.
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            UpdateOutcome::Failed { state, error } => {
                Some(error.kind().unwrap_or_else(|| state.error_kind()))
            }
            _ => None,
        }
    }

    /// The process exit code.
    ///
    /// `0` for skipped and successful runs, `1` for unmet preconditions and `2` for failures
    /// once the host passed its checks.
    pub fn exit_code(&self) -> u8 {
        match self.error_kind() {
            None => 0,
            Some(ErrorKind::Precondition) => 1,
            Some(_) => 2,
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl Display for UpdateState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UpdateState::Init => "init",
            UpdateState::Precheck => "precheck",
            UpdateState::AwaitWindow => "await_window",
            UpdateState::PrepareHost => "prepare_host",
            UpdateState::AwaitAgentIdle => "await_agent_idle",
            UpdateState::RunAgentDryRun => "run_agent_dry_run",
            UpdateState::DisableAgent => "disable_agent",
            UpdateState::Upgrade => "upgrade",
            UpdateState::CloseWindow => "close_window",
            UpdateState::KernelCheck => "kernel_check",
            UpdateState::Reboot => "reboot",
            UpdateState::Done => "done",
            UpdateState::Cleanup => "cleanup",
        };
        write!(f, "{}", name)
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
