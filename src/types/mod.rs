//! Core types shared across the gateway and peripheral engines

mod config;
mod ids;

pub use config::{
    GatewayConfig, GatewayConfigBuilder, NodeIdPolicy, PeripheralConfig, PeripheralConfigBuilder,
    TrainSchedule,
};
pub use ids::{
    AttributeHandle, ConnectionHandle, DeviceAddress, NodeId, ServiceHandle, SubeventId,
    SyncHandle, Uuid16,
};
