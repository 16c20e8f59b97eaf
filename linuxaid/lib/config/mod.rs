//! Configuration of the update workflow: fixed defaults, the host identity and the
//! per-run context.

mod context;
pub mod defaults;
mod identity;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use context::*;
pub use identity::*;
