//! Distribution package upgrades and kernel change detection.

mod distribution;
mod kernel;
mod manager;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use distribution::*;
pub use kernel::*;
pub use manager::*;
