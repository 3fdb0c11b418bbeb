//! # pawrsync
//!
//! A pure Rust library for provisioning a wireless sensor network over
//! Periodic Advertising with Responses (PAwR) and keeping every peripheral
//! node's clock aligned to the gateway's.
//!
//! ## Features
//!
//! - Gateway-side provisioning: scan, connect, discover the configuration
//!   service, assign node identities, hand off the wall clock
//! - Out-of-band periodic-train sync transfer to each peripheral
//! - Peripheral-side drift tracking with bounded-error outlier rejection
//! - A continuously corrected virtual clock for time-stamping sensor data
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use pawrsync::clock::FreeRunningClock;
//! use pawrsync::testing::MockCommands;
//! use pawrsync::{BleEvent, GatewayConfig, GatewayEngine};
//!
//! # async fn example() -> Result<(), pawrsync::TimeSyncError> {
//! let ticks = Arc::new(FreeRunningClock::new(32_768));
//! let mut gateway = GatewayEngine::new(GatewayConfig::default(), MockCommands::new(), ticks)?;
//!
//! // Feed radio events as the transport delivers them
//! gateway.handle_event(BleEvent::Boot).await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Architecture
//!
//! The library is organized around two event-driven engines sharing one
//! transport contract:
//!
//! - **Gateway**: `GatewayEngine` - provisioning state machine + node directory
//! - **Peripheral**: `PeripheralEngine` - clock acquisition + drift tracker
//! - **Transport**: `Commands` trait and `BleEvent` stream - the seam to the
//!   radio/GATT stack

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Public modules
/// Tick sources and the virtual clock
pub mod clock;
/// Error types
pub mod error;
/// Core types
pub mod types;

/// Testing utilities
pub mod testing;

/// Gateway-side provisioning
pub mod gateway;
/// Peripheral-side clock acquisition
pub mod peripheral;
/// Transport contract (commands, events, wire formats)
pub mod transport;

// Re-exports
pub use clock::{SharedClock, TickSource, VirtualClock, shared_clock};
pub use error::TimeSyncError;
pub use gateway::{Directory, GatewayEngine, GatewayEvent, ProvisioningState, SensorNode};
pub use peripheral::{DriftTracker, PeripheralEngine, TimeSyncHandle};
pub use transport::{BleEvent, Commands, DataStatus};
pub use types::{
    ConnectionHandle, DeviceAddress, GatewayConfig, NodeId, NodeIdPolicy, PeripheralConfig,
    SubeventId, Uuid16,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude for common imports
///
/// Convenient re-exports
pub mod prelude {
    pub use crate::{
        BleEvent, Commands, ConnectionHandle, Directory, DriftTracker, GatewayConfig,
        GatewayEngine, NodeId, PeripheralConfig, PeripheralEngine, ProvisioningState,
        TimeSyncError, VirtualClock, shared_clock,
    };
}
