use std::path::PathBuf;

use async_trait::async_trait;
use linuxaid_utils::{CommandRunner, OsRelease, ShellCommand};

use crate::{
    agent::lock_file_present,
    config::{HostIdentity, OrchestratorContext},
    packages::DistributionFamily,
    LinuxaidError, LinuxaidResult,
};

use super::check_disk_space;

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The Linux host linuxaid runs on.
#[derive(Debug)]
pub struct LinuxHost<R> {
    runner: R,
    identity: HostIdentity,
    os_release_file: PathBuf,
    agent_disabled_lock_file: PathBuf,
    min_free_boot_bytes: u64,
    min_free_root_bytes: u64,
    require_root: bool,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Host-level checks and actions of the update workflow.
#[async_trait]
pub trait HostControl: Send + Sync {
    /// Verifies the host may be updated and returns its distribution `ID`.
    async fn preflight(&self) -> LinuxaidResult<String>;

    /// Whether someone other than linuxaid disabled the agent.
    async fn agent_disabled_by_operator(&self) -> bool;

    /// Verifies there is room to boot a new kernel.
    async fn check_disk_space(&self) -> LinuxaidResult<()>;

    /// Reboots the host immediately.
    async fn reboot(&self) -> LinuxaidResult<()>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<R> LinuxHost<R>
where
    R: CommandRunner,
{
    /// Creates the host from the context.
    pub fn new(runner: R, context: &OrchestratorContext) -> Self {
        Self {
            runner,
            identity: context.get_identity().clone(),
            os_release_file: context.get_os_release_file().clone(),
            agent_disabled_lock_file: context.get_agent_disabled_lock_file().clone(),
            min_free_boot_bytes: *context.get_min_free_boot_bytes(),
            min_free_root_bytes: *context.get_min_free_root_bytes(),
            require_root: true,
        }
    }

    #[cfg(test)]
    fn without_root_check(mut self) -> Self {
        self.require_root = false;
        self
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl<R> HostControl for LinuxHost<R>
where
    R: CommandRunner,
{
    async fn preflight(&self) -> LinuxaidResult<String> {
        let os_release = OsRelease::load(&self.os_release_file)
            .map_err(|e| LinuxaidError::Precondition(format!("failed to read os-release: {e}")))?;

        if self.require_root && !nix::unistd::geteuid().is_root() {
            return Err(LinuxaidError::Precondition(
                "must be run as root".to_string(),
            ));
        }

        for path in [self.identity.get_cert_path(), self.identity.get_key_path()] {
            if !path.is_file() {
                return Err(LinuxaidError::Precondition(format!(
                    "agent credential {} not found",
                    path.display()
                )));
            }
        }

        let name = os_release.name.as_deref().unwrap_or_default();
        if name.is_empty() {
            return Err(LinuxaidError::Precondition(
                "distribution NAME is not set".to_string(),
            ));
        }

        let id = os_release.id.unwrap_or_default();
        if DistributionFamily::from_id(&id).is_none() {
            return Err(LinuxaidError::Precondition(format!(
                "unsupported distribution: {name} ({id})"
            )));
        }

        tracing::info!(
            distribution = %id,
            os_name = name,
            version = os_release.version.as_deref().unwrap_or_default(),
            "host passed preflight checks"
        );

        Ok(id)
    }

    async fn agent_disabled_by_operator(&self) -> bool {
        lock_file_present(&self.agent_disabled_lock_file)
    }

    async fn check_disk_space(&self) -> LinuxaidResult<()> {
        check_disk_space(self.min_free_boot_bytes, self.min_free_root_bytes)
    }

    async fn reboot(&self) -> LinuxaidResult<()> {
        let command = ShellCommand::new("reboot").arg("--force");
        tracing::warn!("rebooting host into the new kernel");

        let status = self.runner.run(&command).await?;
        if !status.success() {
            return Err(LinuxaidError::Reboot {
                command: command.to_string(),
                exit_code: status.code(),
            });
        }

        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::fs;

    use serial_test::serial;

    use crate::test_utils::ScriptedRunner;

    use super::*;

    const OS_RELEASE: &str = "NAME=\"Ubuntu\"\nID=ubuntu\nVERSION=\"24.04.1 LTS (Noble Numbat)\"\nVERSION_ID=\"24.04\"\n";

    struct Fixture {
        dir: tempfile::TempDir,
    }

    impl Fixture {
        fn new(os_release: &str) -> anyhow::Result<Self> {
            let dir = tempfile::tempdir()?;
            fs::write(dir.path().join("os-release"), os_release)?;
            fs::write(dir.path().join("web01.acme.crt"), "cert")?;
            fs::write(dir.path().join("web01.acme.key"), "key")?;
            Ok(Self { dir })
        }

        fn path(&self, name: &str) -> PathBuf {
            self.dir.path().join(name)
        }

        fn host(&self, runner: ScriptedRunner) -> LinuxHost<ScriptedRunner> {
            let context = OrchestratorContext::builder()
                .identity(HostIdentity::new(
                    "web01.acme",
                    self.path("web01.acme.crt"),
                    self.path("web01.acme.key"),
                ))
                .os_release_file(self.path("os-release"))
                .agent_disabled_lock_file(self.path("agent_disabled.lock"))
                .build();
            LinuxHost::new(runner, &context).without_root_check()
        }
    }

    fn clear_os_release_env() {
        for key in ["ID", "NAME", "VERSION", "VERSION_ID"] {
            std::env::remove_var(key);
        }
    }

    #[test_log::test(tokio::test)]
    #[serial]
    async fn test_preflight_returns_distribution() -> anyhow::Result<()> {
        clear_os_release_env();
        let fixture = Fixture::new(OS_RELEASE)?;

        assert_eq!(fixture.host(ScriptedRunner::default()).preflight().await?, "ubuntu");

        Ok(())
    }

    #[test_log::test(tokio::test)]
    #[serial]
    async fn test_preflight_rejects_unsupported_distribution() -> anyhow::Result<()> {
        clear_os_release_env();
        let fixture = Fixture::new("NAME=\"Arch Linux\"\nID=arch\n")?;

        let err = fixture
            .host(ScriptedRunner::default())
            .preflight()
            .await
            .unwrap_err();
        assert!(matches!(err, LinuxaidError::Precondition(_)));
        assert!(err.to_string().contains("unsupported distribution"));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    #[serial]
    async fn test_preflight_requires_credentials() -> anyhow::Result<()> {
        clear_os_release_env();
        let fixture = Fixture::new(OS_RELEASE)?;
        fs::remove_file(fixture.path("web01.acme.key"))?;

        let err = fixture
            .host(ScriptedRunner::default())
            .preflight()
            .await
            .unwrap_err();
        assert!(matches!(err, LinuxaidError::Precondition(_)));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_preflight_requires_os_release() -> anyhow::Result<()> {
        let fixture = Fixture::new(OS_RELEASE)?;
        fs::remove_file(fixture.path("os-release"))?;

        let err = fixture
            .host(ScriptedRunner::default())
            .preflight()
            .await
            .unwrap_err();
        assert!(matches!(err, LinuxaidError::Precondition(_)));

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_agent_disabled_by_operator() -> anyhow::Result<()> {
        let fixture = Fixture::new(OS_RELEASE)?;
        let host = fixture.host(ScriptedRunner::default());

        assert!(!host.agent_disabled_by_operator().await);
        fs::write(fixture.path("agent_disabled.lock"), r#"{"disabled_message":"ops"}"#)?;
        assert!(host.agent_disabled_by_operator().await);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_reboot() -> anyhow::Result<()> {
        let fixture = Fixture::new(OS_RELEASE)?;

        let host = fixture.host(ScriptedRunner::new([Some(0)]));
        host.reboot().await?;
        assert_eq!(host.runner.command_lines(), vec!["reboot --force"]);

        let failing = fixture.host(ScriptedRunner::new([Some(1)]));
        assert!(matches!(
            failing.reboot().await,
            Err(LinuxaidError::Reboot { exit_code: Some(1), .. })
        ));

        Ok(())
    }
}
