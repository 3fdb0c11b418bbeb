//! Testing utilities
//!
//! A scriptable in-memory transport and helpers for driving the engines
//! without a radio stack.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::{Result, TimeSyncError};
use crate::transport::{Commands, TrainParams};
use crate::types::{
    AttributeHandle, ConnectionHandle, DeviceAddress, ServiceHandle, SubeventId, SyncHandle,
    Uuid16,
};


/// Helper to build a device address from a single distinguishing byte
#[must_use]
pub fn test_address(n: u8) -> DeviceAddress {
    DeviceAddress([n, 0x22, 0x33, 0x44, 0x55, 0x66])
}

/// One recorded command issued to the mock transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandCall {
    /// `start_scan` was issued
    StartScan,
    /// `stop_scan` was issued
    StopScan,
    /// `open_link` was issued
    OpenLink {
        /// Target address
        address: DeviceAddress,
        /// Target address type
        address_type: u8,
    },
    /// `discover_service_by_uuid` was issued
    DiscoverService {
        /// Target link
        link: ConnectionHandle,
        /// Requested service identifier
        uuid: Uuid16,
    },
    /// `discover_characteristics` was issued
    DiscoverCharacteristics {
        /// Target link
        link: ConnectionHandle,
        /// Parent service
        service: ServiceHandle,
    },
    /// `write_characteristic` was issued
    WriteCharacteristic {
        /// Target link
        link: ConnectionHandle,
        /// Target characteristic
        characteristic: AttributeHandle,
        /// Written value
        value: Bytes,
    },
    /// `start_periodic_train` was issued
    StartPeriodicTrain {
        /// Broadcast parameters
        params: TrainParams,
    },
    /// `set_subevent_data` was issued
    SetSubeventData {
        /// Target subevent
        subevent: SubeventId,
        /// First response slot
        response_slot_start: u8,
        /// Number of response slots
        response_slot_count: u8,
        /// Queued payload
        payload: Bytes,
    },
    /// `transfer_periodic_sync_info` was issued
    TransferSyncInfo {
        /// Target link
        link: ConnectionHandle,
    },
    /// `set_sync_receive_parameters` was issued
    SetSyncReceiveParameters {
        /// Target link
        link: ConnectionHandle,
        /// Skip count
        skip: u16,
        /// Timeout in units of 10 ms
        timeout: u32,
    },
    /// `update_sync_parameters` was issued
    UpdateSyncParameters {
        /// Target synchronization
        sync: SyncHandle,
        /// Skip count
        skip: u16,
        /// Timeout in units of 10 ms
        timeout: u32,
    },
    /// `set_sync_subevents` was issued
    SetSyncSubevents {
        /// Target synchronization
        sync: SyncHandle,
        /// Selected subevents
        subevents: Vec<SubeventId>,
    },
    /// `start_advertising` was issued
    StartAdvertising,
    /// `send_write_response` was issued
    SendWriteResponse {
        /// Target link
        link: ConnectionHandle,
        /// Acknowledged characteristic
        characteristic: AttributeHandle,
    },
}

#[derive(Default)]
struct Inner {
    calls: Mutex<Vec<CommandCall>>,
    next_link: AtomicU8,
    link_invalid_once: Mutex<HashSet<&'static str>>,
    rejections: Mutex<HashMap<&'static str, u16>>,
}

/// In-memory transport that records every command
///
/// Failures can be scripted per command name: a one-shot link-validity
/// failure or a persistent rejection status.
#[derive(Clone, Default)]
pub struct MockCommands {
    inner: Arc<Inner>,
}

impl MockCommands {
    /// Create a mock transport
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All commands recorded so far
    ///
    /// # Panics
    ///
    /// Panics if the call log mutex is poisoned.
    #[must_use]
    pub fn calls(&self) -> Vec<CommandCall> {
        self.inner.calls.lock().unwrap().clone()
    }

    /// Drain and return the recorded commands
    ///
    /// # Panics
    ///
    /// Panics if the call log mutex is poisoned.
    pub fn take_calls(&self) -> Vec<CommandCall> {
        std::mem::take(&mut *self.inner.calls.lock().unwrap())
    }

    /// Make the next issuance of `command` fail with a link-invalid error
    ///
    /// # Panics
    ///
    /// Panics if the script mutex is poisoned.
    pub fn fail_link_invalid_once(&self, command: &'static str) {
        self.inner.link_invalid_once.lock().unwrap().insert(command);
    }

    /// Make every issuance of `command` fail with a rejection status
    ///
    /// # Panics
    ///
    /// Panics if the script mutex is poisoned.
    pub fn reject(&self, command: &'static str, status: u16) {
        self.inner.rejections.lock().unwrap().insert(command, status);
    }

    fn record(&self, call: CommandCall) {
        self.inner.calls.lock().unwrap().push(call);
    }

    fn check(&self, command: &'static str) -> Result<()> {
        if let Some(status) = self.inner.rejections.lock().unwrap().get(command) {
            return Err(TimeSyncError::CommandRejected {
                command,
                status: *status,
            });
        }
        Ok(())
    }

    fn check_link(&self, command: &'static str, link: ConnectionHandle) -> Result<()> {
        if self.inner.link_invalid_once.lock().unwrap().remove(command) {
            return Err(TimeSyncError::LinkInvalid { link });
        }
        self.check(command)
    }
}

#[async_trait]
impl Commands for MockCommands {
    async fn start_scan(&self) -> Result<()> {
        self.check("start_scan")?;
        self.record(CommandCall::StartScan);
        Ok(())
    }

    async fn stop_scan(&self) -> Result<()> {
        self.check("stop_scan")?;
        self.record(CommandCall::StopScan);
        Ok(())
    }

    async fn open_link(
        &self,
        address: DeviceAddress,
        address_type: u8,
    ) -> Result<ConnectionHandle> {
        self.check("open_link")?;
        self.record(CommandCall::OpenLink {
            address,
            address_type,
        });
        let link = self.inner.next_link.fetch_add(1, Ordering::Relaxed) + 1;
        Ok(ConnectionHandle(link))
    }

    async fn discover_service_by_uuid(&self, link: ConnectionHandle, uuid: Uuid16) -> Result<()> {
        self.check_link("discover_service_by_uuid", link)?;
        self.record(CommandCall::DiscoverService { link, uuid });
        Ok(())
    }

    async fn discover_characteristics(
        &self,
        link: ConnectionHandle,
        service: ServiceHandle,
    ) -> Result<()> {
        self.check_link("discover_characteristics", link)?;
        self.record(CommandCall::DiscoverCharacteristics { link, service });
        Ok(())
    }

    async fn write_characteristic(
        &self,
        link: ConnectionHandle,
        characteristic: AttributeHandle,
        value: Bytes,
    ) -> Result<()> {
        self.check_link("write_characteristic", link)?;
        self.record(CommandCall::WriteCharacteristic {
            link,
            characteristic,
            value,
        });
        Ok(())
    }

    async fn start_periodic_train(&self, params: TrainParams) -> Result<()> {
        self.check("start_periodic_train")?;
        self.record(CommandCall::StartPeriodicTrain { params });
        Ok(())
    }

    async fn set_subevent_data(
        &self,
        subevent: SubeventId,
        response_slot_start: u8,
        response_slot_count: u8,
        payload: Bytes,
    ) -> Result<()> {
        self.check("set_subevent_data")?;
        self.record(CommandCall::SetSubeventData {
            subevent,
            response_slot_start,
            response_slot_count,
            payload,
        });
        Ok(())
    }

    async fn transfer_periodic_sync_info(&self, link: ConnectionHandle) -> Result<()> {
        self.check_link("transfer_periodic_sync_info", link)?;
        self.record(CommandCall::TransferSyncInfo { link });
        Ok(())
    }

    async fn set_sync_receive_parameters(
        &self,
        link: ConnectionHandle,
        skip: u16,
        timeout: u32,
    ) -> Result<()> {
        self.check_link("set_sync_receive_parameters", link)?;
        self.record(CommandCall::SetSyncReceiveParameters {
            link,
            skip,
            timeout,
        });
        Ok(())
    }

    async fn update_sync_parameters(
        &self,
        sync: SyncHandle,
        skip: u16,
        timeout: u32,
    ) -> Result<()> {
        self.check("update_sync_parameters")?;
        self.record(CommandCall::UpdateSyncParameters {
            sync,
            skip,
            timeout,
        });
        Ok(())
    }

    async fn set_sync_subevents(&self, sync: SyncHandle, subevents: &[SubeventId]) -> Result<()> {
        self.check("set_sync_subevents")?;
        self.record(CommandCall::SetSyncSubevents {
            sync,
            subevents: subevents.to_vec(),
        });
        Ok(())
    }

    async fn start_advertising(&self) -> Result<()> {
        self.check("start_advertising")?;
        self.record(CommandCall::StartAdvertising);
        Ok(())
    }

    async fn send_write_response(
        &self,
        link: ConnectionHandle,
        characteristic: AttributeHandle,
    ) -> Result<()> {
        self.check_link("send_write_response", link)?;
        self.record(CommandCall::SendWriteResponse {
            link,
            characteristic,
        });
        Ok(())
    }
}
