//! Gateway-side provisioning
//!
//! The gateway drives each newly joined peripheral through discovery,
//! identity assignment and clock handoff, then transfers the periodic-train
//! synchronization info out-of-band. One peripheral is provisioned at a
//! time; arrivals are serialized by the single global provisioning state.

mod directory;
mod engine;
mod feeder;

pub use directory::{Directory, SensorNode};
pub use engine::{GatewayEngine, GatewayEvent, ProvisioningState};
pub use feeder::TrainFeeder;
