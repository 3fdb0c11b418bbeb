//! Peripheral-side clock acquisition and drift tracking
//!
//! A peripheral receives its identity and an initial wall-clock value over
//! GATT writes, then locks onto the gateway's periodic train and turns each
//! received subevent into a drift observation. The synchronization rides on
//! the train alone; closing the GATT link does not disturb it.

mod engine;
mod handle;

pub use engine::PeripheralEngine;
pub use handle::{DriftTracker, TimeSyncHandle};

#[cfg(test)]
mod tests;
