//! `linuxaid` keeps managed Linux hosts up to date inside the maintenance windows granted by
//! the Obmondo control plane.
//!
//! # Overview
//!
//! A run of `linuxaid-cli system-update` walks a small state machine:
//!
//! - check the host (root, supported distribution, agent credentials)
//! - ask the control plane whether a service window is open
//! - refresh the repository list and make sure `ca-certificates` is installed
//! - wait for the configuration agent, dry-run it and disable it
//! - upgrade the distribution's packages
//! - close the service window
//! - reboot when a newer kernel was installed
//!
//! Once the window is known to be open the agent is re-enabled on every way out.
//!
//! # Modules
//!
//! - [`api`] - Control-plane client and the local security exporter
//! - [`agent`] - Configuration agent control and exit-code classification
//! - [`packages`] - Distribution package upgrades and kernel detection
//! - [`host`] - Host checks, disk guard and reboot
//! - [`orchestration`] - The update state machine and the agent run command
//! - [`cli`] - Command-line interface
//! - [`config`] - Defaults, host identity and the per-run context

#![warn(missing_docs)]

mod error;
mod log;

#[cfg(test)]
pub(crate) mod test_utils;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub mod agent;
pub mod api;
pub mod cli;
pub mod config;
pub mod host;
pub mod orchestration;
pub mod packages;

pub use error::*;
pub use log::*;
