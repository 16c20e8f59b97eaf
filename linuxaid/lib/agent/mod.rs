//! Control of the configuration-management agent and its exit-code contract.

mod outcome;
mod puppet;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use outcome::*;
pub use puppet::*;
