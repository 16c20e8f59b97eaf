//! The host itself: preconditions, the operator's disable marker, disk space and reboots.

mod disk;
mod linux;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use disk::*;
pub use linux::*;
