use std::path::PathBuf;

use async_trait::async_trait;
use linuxaid_utils::{CommandRunner, ShellCommand};

use crate::{config::OrchestratorContext, LinuxaidError, LinuxaidResult};

use super::{installed_kernel, running_kernel, DistributionFamily, KernelState};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Upgrades packages with the host's own package manager and reads kernel releases from disk.
#[derive(Debug)]
pub struct SystemPackageManager<R> {
    runner: R,
    boot_dir: PathBuf,
}

/// A single package-manager invocation of an upgrade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpgradeStep {
    command: ShellCommand,
    required: bool,
}

/// The commands that keep the host's CA bundle installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaCertificateCommands {
    refresh: ShellCommand,
    check: ShellCommand,
    install: ShellCommand,
}

//--------------------------------------------------------------------------------------------------
// Traits
//--------------------------------------------------------------------------------------------------

/// Package upgrades and kernel detection.
#[async_trait]
pub trait PackageManager: Send + Sync {
    /// Refreshes the repository list and installs `ca-certificates` when it is missing.
    ///
    /// An unknown distribution is logged and left alone.
    async fn ensure_ca_certificates(&self, distribution_id: &str) -> LinuxaidResult<()>;

    /// Upgrades every package using the strategy of the distribution's family.
    ///
    /// An unknown distribution is logged and left alone.
    async fn upgrade_packages(&self, distribution_id: &str) -> LinuxaidResult<()>;

    /// Compares the newest installed kernel with the running one.
    async fn detect_kernel_change(&self) -> LinuxaidResult<KernelState>;
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl<R> SystemPackageManager<R>
where
    R: CommandRunner,
{
    /// Creates a package manager using the boot directory of the context.
    pub fn new(runner: R, context: &OrchestratorContext) -> Self {
        Self {
            runner,
            boot_dir: context.get_boot_dir().clone(),
        }
    }
}

impl UpgradeStep {
    fn required(command: ShellCommand) -> Self {
        Self {
            command,
            required: true,
        }
    }

    fn best_effort(command: ShellCommand) -> Self {
        Self {
            command,
            required: false,
        }
    }

    /// The command to run.
    pub fn get_command(&self) -> &ShellCommand {
        &self.command
    }

    /// Whether a failure aborts the upgrade.
    pub fn is_required(&self) -> bool {
        self.required
    }
}

impl CaCertificateCommands {
    /// Refreshes the repository list.
    pub fn get_refresh(&self) -> &ShellCommand {
        &self.refresh
    }

    /// Exits 0 when the packages are installed.
    pub fn get_check(&self) -> &ShellCommand {
        &self.check
    }

    /// Installs the packages.
    pub fn get_install(&self) -> &ShellCommand {
        &self.install
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

#[async_trait]
impl<R> PackageManager for SystemPackageManager<R>
where
    R: CommandRunner,
{
    async fn ensure_ca_certificates(&self, distribution_id: &str) -> LinuxaidResult<()> {
        let Some(family) = DistributionFamily::from_id(distribution_id) else {
            tracing::warn!(distribution = distribution_id, "unknown distribution, skipping ca-certificates");
            return Ok(());
        };

        let commands = ca_certificate_commands(family);
        run_required(&self.runner, commands.get_refresh()).await?;

        let installed = match self.runner.run(commands.get_check()).await {
            Ok(status) => status.success(),
            Err(e) => {
                tracing::warn!(error = %e, "failed to check for ca-certificates");
                false
            }
        };
        if installed {
            tracing::debug!("ca-certificates is installed");
            return Ok(());
        }

        tracing::info!(%family, "installing ca-certificates");
        run_required(&self.runner, commands.get_install()).await
    }

    async fn upgrade_packages(&self, distribution_id: &str) -> LinuxaidResult<()> {
        let Some(family) = DistributionFamily::from_id(distribution_id) else {
            tracing::warn!(distribution = distribution_id, "unknown distribution, skipping upgrade");
            return Ok(());
        };

        tracing::info!(distribution = distribution_id, %family, "upgrading packages");
        for step in upgrade_steps(family) {
            let command = step.get_command();
            match self.runner.run(command).await {
                Ok(status) if status.success() => {}
                Ok(status) if step.is_required() => {
                    return Err(LinuxaidError::Upgrade {
                        command: command.to_string(),
                        exit_code: status.code(),
                    });
                }
                Ok(status) => {
                    tracing::warn!(command = %command, exit_code = ?status.code(), "command failed, continuing");
                }
                Err(e) if step.is_required() => return Err(e.into()),
                Err(e) => {
                    tracing::warn!(command = %command, error = %e, "command failed, continuing");
                }
            }
        }

        Ok(())
    }

    async fn detect_kernel_change(&self) -> LinuxaidResult<KernelState> {
        let installed = installed_kernel(&self.boot_dir)?;
        if installed.is_empty() {
            tracing::info!(boot_dir = %self.boot_dir.display(), "no kernel image installed");
            return Ok(KernelState::default());
        }

        let state = KernelState::new(installed, running_kernel()?);
        tracing::info!(
            installed_version = %state.get_installed_version(),
            running_version = %state.get_running_version(),
            "kernel versions"
        );

        Ok(state)
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The commands that upgrade a distribution family, in order.
///
/// Repository refreshes and orphan cleanup are best effort, the upgrade itself is required.
pub fn upgrade_steps(family: DistributionFamily) -> Vec<UpgradeStep> {
    match family {
        DistributionFamily::Debian => {
            let apt = |args: &[&str]| {
                ShellCommand::new("apt-get")
                    .args(args.iter().copied())
                    .env("DEBIAN_FRONTEND", "noninteractive")
            };
            vec![
                UpgradeStep::best_effort(apt(&["update"])),
                UpgradeStep::required(apt(&["--with-new-pkgs", "upgrade", "-y"])),
                UpgradeStep::best_effort(apt(&["autoremove", "-y"])),
            ]
        }
        DistributionFamily::Suse => vec![
            UpgradeStep::best_effort(ShellCommand::new("zypper").arg("refresh")),
            UpgradeStep::required(ShellCommand::new("zypper").args(["update", "-y"])),
        ],
        DistributionFamily::RedHat => vec![
            UpgradeStep::best_effort(ShellCommand::new("yum").arg("repolist")),
            UpgradeStep::required(ShellCommand::new("yum").args(["update", "-y"])),
        ],
    }
}

/// The repository refresh, package check and install commands for the CA bundle.
pub fn ca_certificate_commands(family: DistributionFamily) -> CaCertificateCommands {
    match family {
        DistributionFamily::Debian => {
            let apt = |args: &[&str]| {
                ShellCommand::new("apt-get")
                    .args(args.iter().copied())
                    .env("DEBIAN_FRONTEND", "noninteractive")
            };
            CaCertificateCommands {
                refresh: apt(&["update"]),
                check: ShellCommand::new("dpkg-query").args(["-W", "ca-certificates", "openssl"]),
                install: apt(&["install", "-y", "ca-certificates"]),
            }
        }
        DistributionFamily::Suse => {
            let packages = [
                "ca-certificates",
                "openssl",
                "ca-certificates-cacert",
                "ca-certificates-mozilla",
            ];
            CaCertificateCommands {
                refresh: ShellCommand::new("zypper").arg("refresh"),
                check: ShellCommand::new("rpm").arg("-q").args(packages),
                install: ShellCommand::new("zypper").args(["install", "-y"]).args(packages),
            }
        }
        DistributionFamily::RedHat => CaCertificateCommands {
            refresh: ShellCommand::new("yum").arg("repolist"),
            check: ShellCommand::new("rpm").args(["-q", "ca-certificates", "openssl"]),
            install: ShellCommand::new("yum").args(["install", "-y", "ca-certificates", "openssl"]),
        },
    }
}

//--------------------------------------------------------------------------------------------------
// Functions: Helpers
//--------------------------------------------------------------------------------------------------

async fn run_required<R: CommandRunner>(runner: &R, command: &ShellCommand) -> LinuxaidResult<()> {
    let status = runner.run(command).await?;
    if !status.success() {
        return Err(LinuxaidError::Upgrade {
            command: command.to_string(),
            exit_code: status.code(),
        });
    }

    Ok(())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::{fs, path::Path};

    use crate::{config::HostIdentity, test_utils::ScriptedRunner};

    use super::*;

    fn manager(runner: ScriptedRunner, boot_dir: &Path) -> SystemPackageManager<ScriptedRunner> {
        let context = OrchestratorContext::builder()
            .identity(HostIdentity::new("web01.acme", "cert.pem", "key.pem"))
            .boot_dir(boot_dir)
            .build();
        SystemPackageManager::new(runner, &context)
    }

    #[test]
    fn test_debian_steps_are_noninteractive() {
        let steps = upgrade_steps(DistributionFamily::Debian);
        assert_eq!(steps.len(), 3);
        assert!(steps.iter().all(|step| step
            .get_command()
            .get_envs()
            .contains(&("DEBIAN_FRONTEND".to_string(), "noninteractive".to_string()))));
        assert!(!steps[0].is_required());
        assert!(steps[1].is_required());
        assert!(!steps[2].is_required());
    }

    #[test_log::test(tokio::test)]
    async fn test_upgrade_debian_tolerates_refresh_failure() -> anyhow::Result<()> {
        let runner = ScriptedRunner::new([Some(100), Some(0), None]);
        let manager = manager(runner, Path::new("/boot"));
        manager.upgrade_packages("ubuntu").await?;

        assert_eq!(
            manager.runner.command_lines(),
            vec![
                "apt-get update",
                "apt-get --with-new-pkgs upgrade -y",
                "apt-get autoremove -y",
            ]
        );

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_upgrade_failure_carries_exit_status() {
        let manager = manager(ScriptedRunner::new([Some(0), Some(1)]), Path::new("/boot"));
        let err = manager.upgrade_packages("rhel").await.unwrap_err();

        assert!(matches!(
            &err,
            LinuxaidError::Upgrade { command, exit_code: Some(1) } if command == "yum update -y"
        ));
        assert_eq!(manager.runner.command_lines(), vec!["yum repolist", "yum update -y"]);
    }

    #[test_log::test(tokio::test)]
    async fn test_upgrade_suse() -> anyhow::Result<()> {
        let manager = manager(ScriptedRunner::default(), Path::new("/boot"));
        manager.upgrade_packages("sles").await?;

        assert_eq!(manager.runner.command_lines(), vec!["zypper refresh", "zypper update -y"]);

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_upgrade_unknown_distribution_is_noop() -> anyhow::Result<()> {
        let manager = manager(ScriptedRunner::default(), Path::new("/boot"));
        manager.upgrade_packages("gentoo").await?;

        assert!(manager.runner.commands().is_empty());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_ca_certificates_already_installed() -> anyhow::Result<()> {
        let manager = manager(ScriptedRunner::new([Some(0), Some(0)]), Path::new("/boot"));
        manager.ensure_ca_certificates("ubuntu").await?;

        assert_eq!(
            manager.runner.command_lines(),
            vec!["apt-get update", "dpkg-query -W ca-certificates openssl"]
        );

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_ca_certificates_installed_when_missing() -> anyhow::Result<()> {
        let manager = manager(ScriptedRunner::new([Some(0), Some(1), Some(0)]), Path::new("/boot"));
        manager.ensure_ca_certificates("sles").await?;

        assert_eq!(
            manager.runner.command_lines(),
            vec![
                "zypper refresh",
                "rpm -q ca-certificates openssl ca-certificates-cacert ca-certificates-mozilla",
                "zypper install -y ca-certificates openssl ca-certificates-cacert ca-certificates-mozilla",
            ]
        );

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_ca_certificates_failures_are_fatal() {
        let refresh = manager(ScriptedRunner::new([Some(1)]), Path::new("/boot"));
        let err = refresh.ensure_ca_certificates("centos").await.unwrap_err();
        assert!(matches!(
            &err,
            LinuxaidError::Upgrade { command, exit_code: Some(1) } if command == "yum repolist"
        ));
        assert_eq!(refresh.runner.commands().len(), 1);

        let install = manager(ScriptedRunner::new([Some(0), None, Some(1)]), Path::new("/boot"));
        let err = install.ensure_ca_certificates("rhel").await.unwrap_err();
        assert!(matches!(
            &err,
            LinuxaidError::Upgrade { command, .. }
                if command == "yum install -y ca-certificates openssl"
        ));
    }

    #[test_log::test(tokio::test)]
    async fn test_ca_certificates_unknown_distribution_is_noop() -> anyhow::Result<()> {
        let manager = manager(ScriptedRunner::default(), Path::new("/boot"));
        manager.ensure_ca_certificates("gentoo").await?;

        assert!(manager.runner.commands().is_empty());

        Ok(())
    }

    #[test_log::test(tokio::test)]
    async fn test_detect_kernel_change() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let empty = manager(ScriptedRunner::default(), dir.path());
        assert_eq!(empty.detect_kernel_change().await?, KernelState::default());

        fs::write(dir.path().join("vmlinuz-0.0.1-linuxaid-test"), "")?;
        let state = manager(ScriptedRunner::default(), dir.path())
            .detect_kernel_change()
            .await?;

        assert_eq!(state.get_installed_version(), "0.0.1-linuxaid-test");
        assert!(!state.get_running_version().is_empty());
        assert!(state.has_changed());

        Ok(())
    }
}
