//! Fixed paths, endpoints, timeouts and environment variable names.

use std::time::Duration;

//--------------------------------------------------------------------------------------------------
// Constants
//--------------------------------------------------------------------------------------------------

/// Base URL of the Obmondo control-plane API.
pub const DEFAULT_API_URL: &str = "https://api.obmondo.com/api";

/// Timeout applied to every control-plane request.
pub const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(15);

/// Number of retries for best-effort telemetry requests.
pub const DEFAULT_TELEMETRY_MAX_RETRIES: u32 = 3;

/// `PATH` handed to every external command, so the agent binaries resolve.
pub const DEFAULT_AGENT_PATH: &str = "/sbin:/usr/sbin:/bin:/usr/bin:/opt/puppetlabs/puppet/bin";

/// The configuration agent's executable.
pub const DEFAULT_AGENT_BIN: &str = "puppet";

/// Presence means an agent catalog run is in progress.
pub const DEFAULT_AGENT_RUNNING_LOCK_FILE: &str =
    "/opt/puppetlabs/puppet/cache/state/agent_catalog_run.lock";

/// Presence means the agent was administratively disabled.
pub const DEFAULT_AGENT_DISABLED_LOCK_FILE: &str =
    "/opt/puppetlabs/puppet/cache/state/agent_disabled.lock";

/// The agent's report of its most recent run.
pub const DEFAULT_LAST_RUN_REPORT_FILE: &str =
    "/opt/puppetlabs/puppet/cache/state/last_run_report.yaml";

/// Directory holding the host certificate, named `<certname>.pem`.
pub const DEFAULT_CERTS_DIR: &str = "/etc/puppetlabs/puppet/ssl/certs";

/// Directory holding the host private key, named `<certname>.pem`.
pub const DEFAULT_PRIVATE_KEYS_DIR: &str = "/etc/puppetlabs/puppet/ssl/private_keys";

/// Where the distribution identity is read from.
pub const DEFAULT_OS_RELEASE_FILE: &str = "/etc/os-release";

/// Optional environment file consulted before agent runs.
pub const DEFAULT_AGENT_ENV_FILE: &str = "/etc/default/run_puppet";

/// Directory searched for `vmlinuz-*` kernel images.
pub const DEFAULT_BOOT_DIR: &str = "/boot";

/// How long to wait for a running agent to finish before proceeding anyway.
pub const DEFAULT_AGENT_WAIT_TIMEOUT: Duration = Duration::from_secs(600);

/// How often the agent lock file is polled while waiting.
pub const DEFAULT_AGENT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Local security exporter reporting pending package updates.
pub const DEFAULT_SECURITY_EXPORTER_URL: &str = "http://127.254.254.254:63396";

/// Minimum free bytes on `/boot` before rebooting into a new kernel.
pub const DEFAULT_MIN_FREE_BOOT_BYTES: u64 = 10_000_000;

/// Minimum free bytes on `/` before rebooting into a new kernel.
pub const DEFAULT_MIN_FREE_ROOT_BYTES: u64 = 100_000_000;

/// Audit message recorded when the orchestrator disables the agent.
pub const AGENT_DISABLE_MESSAGE: &str =
    "puppet has been disabled by the linuxaid-cli system-update command.";

//--------------------------------------------------------------------------------------------------
// Constants: Environment
//--------------------------------------------------------------------------------------------------

/// Overrides the control-plane base URL.
pub const API_URL_ENV_VAR: &str = "OBMONDO_API_URL";

/// Path to the host certificate.
pub const AGENT_CERT_ENV_VAR: &str = "PUPPETCERT";

/// Path to the host private key.
pub const AGENT_PRIVATE_KEY_ENV_VAR: &str = "PUPPETPRIVKEY";

/// The host's certname.
pub const CERTNAME_ENV_VAR: &str = "CERTNAME";

/// Whether a kernel change should trigger a reboot.
pub const REBOOT_ENV_VAR: &str = "LINUXAID_REBOOT";

/// Skips every configuration agent step of the update workflow.
pub const SKIP_AGENT_ENV_VAR: &str = "LINUXAID_SKIP_AGENT";

/// Enables debug logging.
pub const DEBUG_ENV_VAR: &str = "LINUXAID_DEBUG";
