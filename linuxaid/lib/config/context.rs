use std::{env, path::PathBuf, time::Duration};

use getset::Getters;
use typed_builder::TypedBuilder;

use super::{
    defaults::{
        API_URL_ENV_VAR, DEFAULT_AGENT_BIN, DEFAULT_AGENT_DISABLED_LOCK_FILE,
        DEFAULT_AGENT_ENV_FILE, DEFAULT_AGENT_PATH, DEFAULT_AGENT_POLL_INTERVAL,
        DEFAULT_AGENT_RUNNING_LOCK_FILE, DEFAULT_AGENT_WAIT_TIMEOUT, DEFAULT_API_TIMEOUT,
        DEFAULT_API_URL, DEFAULT_BOOT_DIR, DEFAULT_LAST_RUN_REPORT_FILE,
        DEFAULT_MIN_FREE_BOOT_BYTES, DEFAULT_MIN_FREE_ROOT_BYTES, DEFAULT_OS_RELEASE_FILE,
        DEFAULT_SECURITY_EXPORTER_URL,
    },
    HostIdentity,
};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// Everything the update workflow needs to know about this host and run, built once at
/// startup and handed to every component.
///
/// # Example
/// ```
/// use linuxaid::config::{HostIdentity, OrchestratorContext};
///
/// let context = OrchestratorContext::builder()
///     .identity(HostIdentity::new("web01.acme", "/tmp/web01.pem", "/tmp/web01.key"))
///     .reboot(false)
///     .build();
///
/// assert_eq!(context.get_identity().customer_id(), "acme");
/// assert!(!context.get_reboot());
/// ```
#[derive(Debug, Clone, Getters, TypedBuilder)]
#[getset(get = "pub with_prefix")]
pub struct OrchestratorContext {
    /// The host's certname and mutual-TLS material.
    identity: HostIdentity,

    /// Base URL of the control-plane API.
    #[builder(default = DEFAULT_API_URL.to_string(), setter(into))]
    api_url: String,

    /// Timeout of each control-plane request.
    #[builder(default = DEFAULT_API_TIMEOUT)]
    api_timeout: Duration,

    /// Local security exporter, `None` to skip the post-upgrade query.
    #[builder(default = Some(DEFAULT_SECURITY_EXPORTER_URL.to_string()))]
    security_exporter_url: Option<String>,

    /// The configuration agent's executable.
    #[builder(default = DEFAULT_AGENT_BIN.to_string(), setter(into))]
    agent_bin: String,

    /// `PATH` handed to every external command.
    #[builder(default = DEFAULT_AGENT_PATH.to_string(), setter(into))]
    command_path: String,

    /// Presence means an agent run is in progress.
    #[builder(default = PathBuf::from(DEFAULT_AGENT_RUNNING_LOCK_FILE), setter(into))]
    agent_running_lock_file: PathBuf,

    /// Presence means the agent was administratively disabled.
    #[builder(default = PathBuf::from(DEFAULT_AGENT_DISABLED_LOCK_FILE), setter(into))]
    agent_disabled_lock_file: PathBuf,

    /// The agent's report of its most recent run.
    #[builder(default = PathBuf::from(DEFAULT_LAST_RUN_REPORT_FILE), setter(into))]
    last_run_report_file: PathBuf,

    /// Optional environment file consulted before agent runs.
    #[builder(default = PathBuf::from(DEFAULT_AGENT_ENV_FILE), setter(into))]
    agent_env_file: PathBuf,

    /// The host's `os-release` file.
    #[builder(default = PathBuf::from(DEFAULT_OS_RELEASE_FILE), setter(into))]
    os_release_file: PathBuf,

    /// Directory searched for kernel images.
    #[builder(default = PathBuf::from(DEFAULT_BOOT_DIR), setter(into))]
    boot_dir: PathBuf,

    /// Upper bound on waiting for a running agent.
    #[builder(default = DEFAULT_AGENT_WAIT_TIMEOUT)]
    agent_wait_timeout: Duration,

    /// How often the agent lock file is polled.
    #[builder(default = DEFAULT_AGENT_POLL_INTERVAL)]
    agent_poll_interval: Duration,

    /// Minimum free bytes on `/boot` before a reboot.
    #[builder(default = DEFAULT_MIN_FREE_BOOT_BYTES)]
    min_free_boot_bytes: u64,

    /// Minimum free bytes on `/` before a reboot.
    #[builder(default = DEFAULT_MIN_FREE_ROOT_BYTES)]
    min_free_root_bytes: u64,

    /// Whether a newly installed kernel triggers a reboot.
    #[builder(default = true)]
    #[getset(skip)]
    reboot: bool,

    /// Whether the configuration agent steps are skipped entirely.
    #[builder(default = false)]
    #[getset(skip)]
    skip_agent: bool,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl OrchestratorContext {
    /// Whether a newly installed kernel triggers a reboot.
    pub fn get_reboot(&self) -> bool {
        self.reboot
    }

    /// Whether the configuration agent steps are skipped entirely.
    pub fn get_skip_agent(&self) -> bool {
        self.skip_agent
    }
}

//--------------------------------------------------------------------------------------------------
// Functions
//--------------------------------------------------------------------------------------------------

/// The control-plane base URL, honouring the `OBMONDO_API_URL` override.
pub fn api_url_from_env() -> String {
    env::var(API_URL_ENV_VAR)
        .ok()
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_string())
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use serial_test::serial;

    use super::*;

    #[test]
    fn test_context_defaults() {
        let context = OrchestratorContext::builder()
            .identity(HostIdentity::new("web01.acme", "cert.pem", "key.pem"))
            .build();

        assert_eq!(context.get_api_url(), DEFAULT_API_URL);
        assert_eq!(context.get_agent_wait_timeout(), &Duration::from_secs(600));
        assert_eq!(context.get_agent_poll_interval(), &Duration::from_secs(5));
        assert_eq!(context.get_boot_dir(), &PathBuf::from("/boot"));
        assert!(context.get_reboot());
        assert!(!context.get_skip_agent());
    }

    #[test]
    #[serial]
    fn test_api_url_from_env() {
        env::remove_var(API_URL_ENV_VAR);
        assert_eq!(api_url_from_env(), DEFAULT_API_URL);

        env::set_var(API_URL_ENV_VAR, "https://api.example.test/api");
        assert_eq!(api_url_from_env(), "https://api.example.test/api");

        env::set_var(API_URL_ENV_VAR, "");
        assert_eq!(api_url_from_env(), DEFAULT_API_URL);

        env::remove_var(API_URL_ENV_VAR);
    }
}
