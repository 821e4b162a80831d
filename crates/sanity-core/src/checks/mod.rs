//! Builtin sanity checks over the template graph of a document.

pub mod graph;

mod deadlock_locations;
mod receive_syncs;
mod template_locations;

pub use deadlock_locations::DeadlockLocations;
pub use receive_syncs::ReceiveSyncs;
pub use template_locations::TemplateLocations;
