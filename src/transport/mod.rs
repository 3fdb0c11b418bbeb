//! Transport abstraction layer
//!
//! The radio/GATT engine is an external collaborator. The engines consume
//! it exclusively through the [`Commands`] trait and the [`BleEvent`]
//! stream: every command is issued asynchronously and its outcome, if any,
//! arrives later as a separate event correlated by link identity.

mod adv;
mod commands;
mod events;
mod wire;

pub use adv::contains_service_uuid;
pub use commands::{Commands, TrainParams};
pub use events::{BleEvent, DataStatus, Status, WriteKind};
pub use wire::{
    decode_clock_correction, decode_node_id, decode_subevent_id, decode_wall_clock,
    encode_clock_correction, encode_node_id, encode_subevent_id, encode_wall_clock,
};

#[cfg(test)]
mod tests;
