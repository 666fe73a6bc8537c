pub mod poller;
pub mod reconcile;
mod registry;
pub mod scheduler;
pub mod view;

pub use poller::{FleetPoller, FleetSnapshot, FleetStatus, Phase};
pub use registry::PollerRegistry;
