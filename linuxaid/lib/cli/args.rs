use clap::{ArgAction, Parser, Subcommand};

use super::styles;
use crate::config::defaults::{CERTNAME_ENV_VAR, DEBUG_ENV_VAR, REBOOT_ENV_VAR, SKIP_AGENT_ENV_VAR};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// linuxaid - keeps Obmondo managed Linux hosts patched inside their service windows
#[derive(Debug, Parser)]
#[command(name = "linuxaid-cli", author, about, version, styles = styles::styles())]
pub struct LinuxaidArgs {
    /// The subcommand to run
    #[command(subcommand)]
    pub subcommand: LinuxaidSubcommand,

    /// Enable debug logging
    #[arg(long, global = true, env = DEBUG_ENV_VAR)]
    pub debug: bool,

    /// Certname of this host, used when no certificate can be found
    #[arg(long, global = true, env = CERTNAME_ENV_VAR)]
    pub certname: Option<String>,
}

/// Available subcommands
#[derive(Debug, Subcommand)]
pub enum LinuxaidSubcommand {
    /// Upgrade the host's packages if its service window is open
    #[command(name = "system-update")]
    SystemUpdate {
        /// Reboot when a newer kernel was installed
        #[arg(
            long,
            env = REBOOT_ENV_VAR,
            default_value_t = true,
            action = ArgAction::Set,
            value_name = "BOOL"
        )]
        reboot: bool,

        /// Leave the configuration agent alone
        #[arg(long, env = SKIP_AGENT_ENV_VAR)]
        skip_agent: bool,
    },

    /// Run the configuration agent once and report the result
    #[command(name = "run-agent")]
    RunAgent,
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------
