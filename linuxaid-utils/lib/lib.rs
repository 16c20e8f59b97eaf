//! `linuxaid-utils` is a library containing general host utilities for the linuxaid project.

#![warn(missing_docs)]
#![allow(clippy::module_inception)]

pub mod error;
pub mod os_release;
pub mod process;
pub mod term;
pub mod version;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use error::*;
pub use os_release::*;
pub use process::*;
pub use version::*;
