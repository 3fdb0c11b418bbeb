//! Asynchronous command surface of the transport collaborator

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, TimeSyncError};
use crate::types::{
    AttributeHandle, ConnectionHandle, DeviceAddress, ServiceHandle, SubeventId, SyncHandle,
    TrainSchedule, Uuid16,
};

/// Parameters for starting the periodic-train broadcast
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainParams {
    /// Interval between train events in units of 1.25 ms
    pub interval_units: u16,
    /// Number of subevents per interval
    pub num_subevents: u8,
    /// Subevent spacing in units of 1.25 ms
    pub subevent_interval: u8,
    /// Delay before the first response slot in units of 1.25 ms
    pub response_slot_delay: u8,
    /// Response slot spacing in units of 0.125 ms
    pub response_slot_spacing: u8,
    /// Number of reserved response slots
    pub response_slots: u8,
}

/// Smallest representable train interval (7.5 ms)
const MIN_INTERVAL_UNITS: u64 = 0x06;
/// Largest representable train interval (81.92 s)
const MAX_INTERVAL_UNITS: u64 = 0xFFFF;

impl TrainParams {
    /// Build train parameters from a schedule, validating the interval
    ///
    /// # Errors
    ///
    /// Returns [`TimeSyncError::IntervalOutOfRange`] when the schedule's
    /// interval does not resolve to the transport's representable range.
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_schedule(schedule: &TrainSchedule, response_slots: u8) -> Result<Self> {
        let units = schedule.interval_units();
        if !(MIN_INTERVAL_UNITS..=MAX_INTERVAL_UNITS).contains(&units) {
            return Err(TimeSyncError::IntervalOutOfRange {
                units,
                min: MIN_INTERVAL_UNITS,
                max: MAX_INTERVAL_UNITS,
            });
        }
        Ok(Self {
            interval_units: units as u16,
            num_subevents: schedule.num_subevents,
            subevent_interval: schedule.subevent_interval,
            response_slot_delay: schedule.response_slot_delay,
            response_slot_spacing: schedule.response_slot_spacing,
            response_slots,
        })
    }
}

/// Commands accepted by the transport collaborator
///
/// Every method returns the immediate accept/reject status only; the
/// outcome of an accepted command arrives later as a [`super::BleEvent`]
/// correlated by link identity. Implementations must not block.
#[async_trait]
pub trait Commands: Send + Sync {
    /// Start scanning for advertisements
    async fn start_scan(&self) -> Result<()>;

    /// Stop scanning
    async fn stop_scan(&self) -> Result<()>;

    /// Open a link to the given advertiser
    ///
    /// The returned handle identifies the pending link; establishment is
    /// reported by a later `LinkOpened` event.
    async fn open_link(&self, address: DeviceAddress, address_type: u8)
    -> Result<ConnectionHandle>;

    /// Discover a primary service by its 16-bit identifier
    async fn discover_service_by_uuid(&self, link: ConnectionHandle, uuid: Uuid16) -> Result<()>;

    /// Discover the characteristics of a service
    async fn discover_characteristics(
        &self,
        link: ConnectionHandle,
        service: ServiceHandle,
    ) -> Result<()>;

    /// Write a characteristic value with acknowledgment
    async fn write_characteristic(
        &self,
        link: ConnectionHandle,
        characteristic: AttributeHandle,
        value: Bytes,
    ) -> Result<()>;

    /// Start the periodic-train broadcast
    async fn start_periodic_train(&self, params: TrainParams) -> Result<()>;

    /// Queue payload data for one subevent of the next train interval
    async fn set_subevent_data(
        &self,
        subevent: SubeventId,
        response_slot_start: u8,
        response_slot_count: u8,
        payload: Bytes,
    ) -> Result<()>;

    /// Hand the periodic-train synchronization info to a peripheral
    async fn transfer_periodic_sync_info(&self, link: ConnectionHandle) -> Result<()>;

    /// Arm reception of a synchronization-info transfer on a link
    async fn set_sync_receive_parameters(
        &self,
        link: ConnectionHandle,
        skip: u16,
        timeout: u32,
    ) -> Result<()>;

    /// Update the supervision parameters of an established synchronization
    async fn update_sync_parameters(
        &self,
        sync: SyncHandle,
        skip: u16,
        timeout: u32,
    ) -> Result<()>;

    /// Select which subevents of a synchronization to listen to
    async fn set_sync_subevents(&self, sync: SyncHandle, subevents: &[SubeventId]) -> Result<()>;

    /// (Re)generate advertising data and start connectable advertising
    async fn start_advertising(&self) -> Result<()>;

    /// Acknowledge a write request on a locally hosted characteristic
    async fn send_write_response(
        &self,
        link: ConnectionHandle,
        characteristic: AttributeHandle,
    ) -> Result<()>;
}
