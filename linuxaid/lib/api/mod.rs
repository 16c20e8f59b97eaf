//! Network collaborators: the Obmondo control plane and the local security exporter.

mod client;
mod exporter;
mod models;

//--------------------------------------------------------------------------------------------------
// Exports
//--------------------------------------------------------------------------------------------------

pub use client::*;
pub use exporter::*;
pub use models::*;
