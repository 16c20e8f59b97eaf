use std::{
    fs, io,
    path::{Path, PathBuf},
    time::Duration,
};

use async_trait::async_trait;
use linuxaid_utils::{CommandRunner, ShellCommand};
use tokio::time::{self, Instant};

use crate::{config::OrchestratorContext, LinuxaidError, LinuxaidResult};

use super::AgentRunOutcome;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Exit code reported when the agent could not be started or was killed.
const FAILED_RUN_EXIT_CODE: i32 = 1;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Drives the Puppet agent through its command line.
#[derive(Debug)]
pub struct PuppetAgent<R> {
    runner: R,
    agent_bin: String,
    running_lock_file: PathBuf,
    poll_interval: Duration,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Operations on the configuration-management agent.
#[async_trait]
pub trait AgentController: Send + Sync {
    /// Whether an agent run is in progress.
    ///
    /// Filesystem errors other than a missing lock file are logged and read as "not running".
    async fn is_running(&self) -> bool;

    /// Polls [`is_running`](Self::is_running) until the agent is idle or `timeout` elapses.
    ///
    /// A timeout is logged; the caller decides what to do next.
    async fn wait_until_idle(&self, timeout: Duration);

    /// Runs the agent once, in no-op mode when `noop` is set.
    ///
    /// The exit code is returned as data, a non-zero exit is not an error.
    async fn run(&self, noop: bool) -> AgentRunOutcome;

    /// Stops unattended agent runs, recording `reason` with the agent.
    async fn disable(&self, reason: &str) -> LinuxaidResult<()>;

    /// Allows unattended agent runs again. Enabling an enabled agent succeeds.
    async fn enable(&self) -> LinuxaidResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<R> PuppetAgent<R>
where
    R: CommandRunner,
{
    /// Creates an agent controller using the paths of the context.
    pub fn new(runner: R, context: &OrchestratorContext) -> Self {
        Self {
            runner,
            agent_bin: context.get_agent_bin().clone(),
            running_lock_file: context.get_agent_running_lock_file().clone(),
            poll_interval: *context.get_agent_poll_interval(),
        }
    }

    fn command(&self) -> ShellCommand {
        ShellCommand::new(&self.agent_bin).arg("agent")
    }

    async fn run_admin_command(&self, command: ShellCommand) -> LinuxaidResult<()> {
        let status = self.runner.run(&command).await?;
        if !status.success() {
            return Err(LinuxaidError::AgentCommand {
                command: command.to_string(),
                exit_code: status.code(),
            });
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl<R> AgentController for PuppetAgent<R>
where
    R: CommandRunner,
{
    async fn is_running(&self) -> bool {
        lock_file_present(&self.running_lock_file)
    }

    async fn wait_until_idle(&self, timeout: Duration) {
        let deadline = Instant::now() + timeout;
        while self.is_running().await {
            if Instant::now() >= deadline {
                tracing::warn!(
                    timeout_secs = timeout.as_secs(),
                    "agent is still running, giving up waiting"
                );
                return;
            }

            tracing::debug!("agent is running, waiting");
            time::sleep(self.poll_interval).await;
        }
    }

    async fn run(&self, noop: bool) -> AgentRunOutcome {
        let mode = if noop { "--noop" } else { "--no-noop" };
        let command = self.command().args(["-t", mode, "--detailed-exitcodes"]);

        tracing::info!(mode, "running agent");
        let exit_code = match self.runner.run(&command).await {
            Ok(status) => status.code().unwrap_or_else(|| {
                tracing::error!("agent was terminated by a signal");
                FAILED_RUN_EXIT_CODE
            }),
            Err(e) => {
                tracing::error!(error = %e, "failed to start agent");
                FAILED_RUN_EXIT_CODE
            }
        };

        tracing::info!(exit_code, "agent run finished");
        AgentRunOutcome::new(exit_code)
    }

    async fn disable(&self, reason: &str) -> LinuxaidResult<()> {
        self.run_admin_command(self.command().args(["--disable", reason]))
            .await?;
        tracing::info!("agent disabled");
        Ok(())
    }

    async fn enable(&self) -> LinuxaidResult<()> {
        self.run_admin_command(self.command().arg("--enable")).await?;
        tracing::info!("agent enabled");
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// Whether a lock file exists. Unreadable metadata counts as absent.
pub fn lock_file_present(path: &Path) -> bool {
    match fs::metadata(path) {
        Ok(_) => true,
        Err(e) if e.kind() == io::ErrorKind::NotFound => false,
        Err(e) => {
            tracing::warn!(error = %e, lock_file = %path.display(), "failed to check lock file");
            false
        }
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use crate::{config::HostIdentity, test_utils::ScriptedRunner};

    use super::*;

    fn context(lock_file: &Path) -> OrchestratorContext {
        OrchestratorContext::builder()
            .identity(HostIdentity::new("web01.acme", "cert.pem", "key.pem"))
            .agent_running_lock_file(lock_file)
            .build()
    }

    #[test_log::test(tokio::test)]
    async fn test_run_modes_and_exit_codes() {
        let runner = ScriptedRunner::new([Some(2), Some(4), None]);
        let agent = PuppetAgent::new(runner, &context(Path::new("/nonexistent/lock")));

        assert_eq!(agent.run(true).await.exit_code(), 2);
        assert_eq!(agent.run(false).await.exit_code(), 4);
        assert_eq!(agent.run(true).await.exit_code(), FAILED_RUN_EXIT_CODE);

        assert_eq!(
            agent.runner.command_lines(),
            vec![
                "puppet agent -t --noop --detailed-exitcodes",
                "puppet agent -t --no-noop --detailed-exitcodes",
                "puppet agent -t --noop --detailed-exitcodes",
            ]
        );
    }

    #[test_log::test(tokio::test)]
    async fn test_disable_and_enable() {
        let runner = ScriptedRunner::new([Some(0), Some(0), Some(1)]);
        let agent = PuppetAgent::new(runner, &context(Path::new("/nonexistent/lock")));

        assert!(agent.disable("patching in progress").await.is_ok());
        assert!(agent.enable().await.is_ok());

        let err = agent.enable().await.unwrap_err();
        assert!(matches!(
            err,
            LinuxaidError::AgentCommand {
                exit_code: Some(1),
                ..
            }
        ));

        let commands = agent.runner.commands();
        assert_eq!(
            commands[0].get_args(),
            &["agent", "--disable", "patching in progress"]
        );
        assert_eq!(commands[1].get_args(), &["agent", "--enable"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_is_running_follows_lock_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let lock_file = dir.path().join("agent_catalog_run.lock");
        let agent = PuppetAgent::new(ScriptedRunner::default(), &context(&lock_file));

        assert!(!agent.is_running().await);
        fs::write(&lock_file, "1234")?;
        assert!(agent.is_running().await);

        Ok(())
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_wait_until_idle_gives_up_after_timeout() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let lock_file = dir.path().join("agent_catalog_run.lock");
        fs::write(&lock_file, "1234")?;
        let agent = PuppetAgent::new(ScriptedRunner::default(), &context(&lock_file));

        let start = Instant::now();
        agent.wait_until_idle(Duration::from_secs(600)).await;

        assert!(start.elapsed() >= Duration::from_secs(600));
        assert!(agent.is_running().await);

        Ok(())
    }

    #[test_log::test(tokio::test(start_paused = true))]
    async fn test_wait_until_idle_returns_once_lock_is_gone() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let lock_file = dir.path().join("agent_catalog_run.lock");
        fs::write(&lock_file, "1234")?;
        let agent = PuppetAgent::new(ScriptedRunner::default(), &context(&lock_file));

        let remover = {
            let lock_file = lock_file.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_secs(12)).await;
                fs::remove_file(lock_file)
            })
        };

        let start = Instant::now();
        agent.wait_until_idle(Duration::from_secs(600)).await;
        remover.await??;

        assert!(start.elapsed() < Duration::from_secs(600));
        assert!(!agent.is_running().await);

        Ok(())
    }
}
