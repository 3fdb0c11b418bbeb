//! Heartbeat payload for the periodic train
//!
//! The train carries a one-byte monotonically incrementing counter, not
//! sensor data; sensor payloads flow over a separate notification path.

/// Supplies the broadcast payload on each periodic-train data request
#[derive(Debug, Default)]
pub struct TrainFeeder {
    counter: u8,
}

impl TrainFeeder {
    /// Create a feeder starting at zero
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Next heartbeat byte, wrapping at 256
    pub fn next_payload(&mut self) -> u8 {
        let payload = self.counter;
        self.counter = self.counter.wrapping_add(1);
        payload
    }
}
