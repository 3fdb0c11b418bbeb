use std::time::Duration;

use crate::types::{AttributeHandle, Uuid16};

/// Policy for keeping node identities in step with directory positions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NodeIdPolicy {
    /// Identities are assigned once at add time and never change, even when
    /// compaction moves an entry to a different slot (stable identity for
    /// downstream logging)
    #[default]
    Permanent,
    /// Identities are recomputed to match directory position after every
    /// compaction, so `node_id == slot index` always holds
    PositionBased,
}

/// Periodic-train broadcast schedule
#[derive(Debug, Clone)]
pub struct TrainSchedule {
    /// Interval between periodic-train events (default: 1 second)
    ///
    /// Must resolve to the transport's representable range of
    /// 7.5 ms - 81.92 s (units of 1.25 ms).
    pub interval: Duration,

    /// Number of subevents per interval (this design uses exactly one)
    pub num_subevents: u8,

    /// Subevent spacing in transport units of 1.25 ms
    pub subevent_interval: u8,

    /// Delay before the first response slot, in units of 1.25 ms
    pub response_slot_delay: u8,

    /// Spacing between response slots, in units of 0.125 ms
    pub response_slot_spacing: u8,
}

impl Default for TrainSchedule {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            num_subevents: 1,
            subevent_interval: 0xFF,
            response_slot_delay: 0x50,
            response_slot_spacing: 0x10,
        }
    }
}

impl TrainSchedule {
    /// Interval expressed in transport units of 1.25 ms
    #[must_use]
    pub fn interval_units(&self) -> u64 {
        // ms * 8 / 10 == ms / 1.25
        u64::try_from(self.interval.as_millis() * 8 / 10).unwrap_or(u64::MAX)
    }
}

/// Configuration for the gateway provisioning engine
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Maximum number of peripheral nodes (default: 4)
    ///
    /// Bounds both the directory capacity and the number of reserved
    /// periodic-train response slots.
    pub max_peripherals: usize,

    /// Configuration-service identifier advertised by peripherals
    pub service_uuid: Uuid16,

    /// Node-id characteristic identifier
    pub node_id_uuid: Uuid16,

    /// Subevent-id characteristic identifier
    pub subevent_uuid: Uuid16,

    /// Wall-clock characteristic identifier
    pub wall_clock_uuid: Uuid16,

    /// Clock-correction characteristic identifier
    pub clock_correction_uuid: Uuid16,

    /// Broadcast schedule for the periodic train
    pub train: TrainSchedule,

    /// How node identities relate to directory positions
    pub node_id_policy: NodeIdPolicy,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            max_peripherals: 4,
            service_uuid: Uuid16(0x98C7),
            node_id_uuid: Uuid16(0x690B),
            subevent_uuid: Uuid16(0xB8A5),
            wall_clock_uuid: Uuid16(0x509A),
            clock_correction_uuid: Uuid16(0x9AC6),
            train: TrainSchedule::default(),
            node_id_policy: NodeIdPolicy::default(),
        }
    }
}

impl GatewayConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder::default()
    }
}

/// Builder for `GatewayConfig`
#[derive(Debug, Clone, Default)]
pub struct GatewayConfigBuilder {
    config: GatewayConfig,
}

impl GatewayConfigBuilder {
    /// Set the maximum number of peripheral nodes
    #[must_use]
    pub fn max_peripherals(mut self, count: usize) -> Self {
        self.config.max_peripherals = count;
        self
    }

    /// Set the configuration-service identifier to scan for
    #[must_use]
    pub fn service_uuid(mut self, uuid: Uuid16) -> Self {
        self.config.service_uuid = uuid;
        self
    }

    /// Set the periodic-train interval
    #[must_use]
    pub fn train_interval(mut self, interval: Duration) -> Self {
        self.config.train.interval = interval;
        self
    }

    /// Set the full broadcast schedule
    #[must_use]
    pub fn train(mut self, schedule: TrainSchedule) -> Self {
        self.config.train = schedule;
        self
    }

    /// Set the node-identity policy
    #[must_use]
    pub fn node_id_policy(mut self, policy: NodeIdPolicy) -> Self {
        self.config.node_id_policy = policy;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> GatewayConfig {
        self.config
    }
}

/// Configuration for the peripheral engine
///
/// The four attribute handles must match the characteristics hosted in the
/// local attribute database; the defaults are placeholders for testing.
#[derive(Debug, Clone)]
pub struct PeripheralConfig {
    /// Local handle of the node-id characteristic
    pub node_id_char: AttributeHandle,

    /// Local handle of the subevent-id characteristic
    pub subevent_char: AttributeHandle,

    /// Local handle of the wall-clock characteristic
    pub wall_clock_char: AttributeHandle,

    /// Local handle of the clock-correction characteristic
    pub clock_correction_char: AttributeHandle,

    /// Periodic-train events that may be skipped between receives (default: 0)
    pub sync_skip: u16,

    /// Lower clamp for the computed sync-supervision timeout, in units of
    /// 10 ms (default: `0x000A`)
    pub sync_timeout_min: u32,

    /// Upper clamp for the computed sync-supervision timeout, in units of
    /// 10 ms (default: `0x4000`)
    pub sync_timeout_max: u32,

    /// Timeout used while waiting for the initial sync transfer, in units of
    /// 10 ms (default: `0x2000`)
    pub sync_receive_timeout: u32,

    /// Consecutive missed trains tolerated before the sync is declared lost
    /// (default: 3)
    pub max_sync_lost: u32,
}

impl Default for PeripheralConfig {
    fn default() -> Self {
        Self {
            node_id_char: AttributeHandle(1),
            subevent_char: AttributeHandle(2),
            wall_clock_char: AttributeHandle(3),
            clock_correction_char: AttributeHandle(4),
            sync_skip: 0,
            sync_timeout_min: 0x000A,
            sync_timeout_max: 0x4000,
            sync_receive_timeout: 0x2000,
            max_sync_lost: 3,
        }
    }
}

impl PeripheralConfig {
    /// Create a new config builder
    #[must_use]
    pub fn builder() -> PeripheralConfigBuilder {
        PeripheralConfigBuilder::default()
    }
}

/// Builder for `PeripheralConfig`
#[derive(Debug, Clone, Default)]
pub struct PeripheralConfigBuilder {
    config: PeripheralConfig,
}

impl PeripheralConfigBuilder {
    /// Set all four control-characteristic handles at once
    #[must_use]
    pub fn characteristics(
        mut self,
        node_id: AttributeHandle,
        subevent: AttributeHandle,
        wall_clock: AttributeHandle,
        clock_correction: AttributeHandle,
    ) -> Self {
        self.config.node_id_char = node_id;
        self.config.subevent_char = subevent;
        self.config.wall_clock_char = wall_clock;
        self.config.clock_correction_char = clock_correction;
        self
    }

    /// Set the sync skip count
    #[must_use]
    pub fn sync_skip(mut self, skip: u16) -> Self {
        self.config.sync_skip = skip;
        self
    }

    /// Set the number of missed trains tolerated before sync loss
    #[must_use]
    pub fn max_sync_lost(mut self, count: u32) -> Self {
        self.config.max_sync_lost = count;
        self
    }

    /// Build the configuration
    #[must_use]
    pub fn build(self) -> PeripheralConfig {
        self.config
    }
}
