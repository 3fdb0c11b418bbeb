//! Gateway provisioning state machine

use std::sync::Arc;

use tokio::sync::broadcast;

use super::directory::Directory;
use super::feeder::TrainFeeder;
use crate::clock::TickSource;
use crate::error::{Result, TimeSyncError};
use crate::transport::{
    BleEvent, Commands, Status, TrainParams, contains_service_uuid, encode_clock_correction,
    encode_node_id, encode_subevent_id, encode_wall_clock,
};
use crate::types::{ConnectionHandle, GatewayConfig, NodeId, SubeventId};

/// Subevent every provisioned node listens to (single-subevent design)
const ASSIGNED_SUBEVENT: SubeventId = SubeventId(0);

/// Global provisioning state
///
/// One peripheral is provisioned at a time, so a single state value covers
/// all links; the engine additionally records which link is currently being
/// provisioned and ignores procedure events from any other link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisioningState {
    /// Radio not booted yet
    Inactive,
    /// Looking for peripherals advertising the configuration service
    Scanning,
    /// Waiting for the configuration service to be discovered
    DiscoverService,
    /// Waiting to write the assigned node id
    SetNodeId,
    /// Waiting to write the assigned subevent index
    SetSubeventId,
    /// Waiting to write the wall-clock snapshot
    SetWallClock,
    /// Waiting to write the one-shot clock correction
    SetClockCorrection,
    /// Waiting for the final write acknowledgment before the sync transfer
    SyncFinished,
    /// Directory at capacity; not accepting new peripherals
    NetworkFull,
}

/// Notifications emitted by the gateway engine
#[derive(Debug, Clone)]
pub enum GatewayEvent {
    /// A peripheral finished provisioning and received the sync transfer
    PeripheralReady {
        /// The peripheral's link
        link: ConnectionHandle,
        /// The peripheral's assigned identity
        node_id: NodeId,
    },
    /// A provisioned or in-progress peripheral disconnected
    PeripheralLost {
        /// The departed peripheral's identity
        node_id: NodeId,
    },
}

/// Event-driven provisioning engine for the gateway device
pub struct GatewayEngine<C: Commands> {
    config: GatewayConfig,
    commands: C,
    ticks: Arc<dyn TickSource>,
    train_params: TrainParams,
    directory: Directory,
    state: ProvisioningState,
    /// Link currently being provisioned, if any
    current_link: Option<ConnectionHandle>,
    /// Link opened but not yet reported by the transport
    pending_link: Option<ConnectionHandle>,
    /// Tick snapshot taken when the wall clock was written
    wall_clock_sent: u32,
    feeder: TrainFeeder,
    events: broadcast::Sender<GatewayEvent>,
}

impl<C: Commands> GatewayEngine<C> {
    /// Create a gateway engine
    ///
    /// # Errors
    ///
    /// Returns a configuration error when the train schedule does not
    /// resolve to the transport's representable interval range.
    pub fn new(config: GatewayConfig, commands: C, ticks: Arc<dyn TickSource>) -> Result<Self> {
        if config.max_peripherals == 0 || config.max_peripherals > usize::from(u8::MAX) {
            return Err(TimeSyncError::Config {
                message: format!("max_peripherals {} out of range", config.max_peripherals),
            });
        }
        #[allow(clippy::cast_possible_truncation)]
        let train_params = TrainParams::from_schedule(&config.train, config.max_peripherals as u8)?;
        let directory = Directory::new(config.max_peripherals, config.node_id_policy);
        let (events, _) = broadcast::channel(16);

        Ok(Self {
            config,
            commands,
            ticks,
            train_params,
            directory,
            state: ProvisioningState::Inactive,
            current_link: None,
            pending_link: None,
            wall_clock_sent: 0,
            feeder: TrainFeeder::new(),
            events,
        })
    }

    /// Current provisioning state
    #[must_use]
    pub fn state(&self) -> ProvisioningState {
        self.state
    }

    /// The node directory
    #[must_use]
    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    /// Subscribe to provisioning notifications
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<GatewayEvent> {
        self.events.subscribe()
    }

    /// Handle one transport event to completion
    ///
    /// # Errors
    ///
    /// Returns fatal-tier errors only: rejected commands and failed
    /// procedures that indicate a configuration or programming defect.
    /// Link-validity failures are absorbed by falling back to scanning.
    pub async fn handle_event(&mut self, event: BleEvent) -> Result<()> {
        match event {
            BleEvent::Boot => self.on_boot().await,
            BleEvent::AdvertisementReport {
                address,
                address_type,
                connectable,
                scannable,
                data,
            } => {
                if connectable && scannable {
                    self.on_advertisement(address, address_type, &data).await
                } else {
                    Ok(())
                }
            }
            BleEvent::LinkOpened { link, address } => self.on_link_opened(link, address).await,
            BleEvent::ServiceDiscovered {
                link,
                service,
                uuid,
            } => {
                self.on_service_discovered(link, service, uuid);
                Ok(())
            }
            BleEvent::CharacteristicDiscovered {
                link,
                characteristic,
                uuid,
            } => {
                self.on_characteristic_discovered(link, characteristic, uuid);
                Ok(())
            }
            BleEvent::ProcedureCompleted { link, result } => {
                self.on_procedure_completed(link, result).await
            }
            BleEvent::SubeventDataRequest { .. } => self.on_subevent_data_request().await,
            BleEvent::LinkClosed { link, .. } => self.on_link_closed(link).await,
            // Peripheral-side events; not for the gateway
            _ => Ok(()),
        }
    }

    async fn on_boot(&mut self) -> Result<()> {
        self.commands.start_periodic_train(self.train_params).await?;
        tracing::info!(
            interval_units = self.train_params.interval_units,
            response_slots = self.train_params.response_slots,
            "periodic train started"
        );

        self.commands.start_scan().await?;
        tracing::info!("scanning for peripheral nodes");
        self.state = ProvisioningState::Scanning;
        Ok(())
    }

    async fn on_advertisement(
        &mut self,
        address: crate::types::DeviceAddress,
        address_type: u8,
        data: &[u8],
    ) -> Result<()> {
        if self.state != ProvisioningState::Scanning {
            return Ok(());
        }
        if !contains_service_uuid(data, self.config.service_uuid) {
            return Ok(());
        }
        if self.directory.is_full() {
            return Ok(());
        }

        tracing::info!(%address, "peripheral node found");
        self.commands.stop_scan().await?;
        let link = self.commands.open_link(address, address_type).await?;
        self.pending_link = Some(link);
        Ok(())
    }

    async fn on_link_opened(
        &mut self,
        link: ConnectionHandle,
        address: crate::types::DeviceAddress,
    ) -> Result<()> {
        if self.pending_link.take() != Some(link) {
            tracing::warn!(%link, "unexpected link opened; ignoring");
            return Ok(());
        }

        let node_id = self.directory.add(link, address);
        tracing::info!(%link, %node_id, "link opened, discovering configuration service");

        match self
            .commands
            .discover_service_by_uuid(link, self.config.service_uuid)
            .await
        {
            Ok(()) => {
                self.current_link = Some(link);
                self.state = ProvisioningState::DiscoverService;
                Ok(())
            }
            Err(e) if e.is_link_invalid() => {
                tracing::warn!(%link, "service discovery failed on invalid link, dropping node");
                self.resume_scanning().await
            }
            Err(e) => Err(e),
        }
    }

    fn on_service_discovered(
        &mut self,
        link: ConnectionHandle,
        service: crate::types::ServiceHandle,
        uuid: crate::types::Uuid16,
    ) {
        if self.state != ProvisioningState::DiscoverService || self.current_link != Some(link) {
            return;
        }
        if uuid != self.config.service_uuid {
            return;
        }
        if let Some(node) = self.directory.find_mut(link) {
            if node.service.is_none() {
                node.service = Some(service);
                tracing::info!(%link, "configuration service discovered");
            }
        }
    }

    fn on_characteristic_discovered(
        &mut self,
        link: ConnectionHandle,
        characteristic: crate::types::AttributeHandle,
        uuid: crate::types::Uuid16,
    ) {
        if self.current_link != Some(link) {
            return;
        }
        let config = &self.config;
        let slot = if uuid == config.node_id_uuid {
            "node id"
        } else if uuid == config.subevent_uuid {
            "subevent id"
        } else if uuid == config.wall_clock_uuid {
            "wall clock"
        } else if uuid == config.clock_correction_uuid {
            "clock correction"
        } else {
            return;
        };

        if let Some(node) = self.directory.find_mut(link) {
            if uuid == config.node_id_uuid {
                node.node_id_char = Some(characteristic);
            } else if uuid == config.subevent_uuid {
                node.subevent_char = Some(characteristic);
            } else if uuid == config.wall_clock_uuid {
                node.wall_clock_char = Some(characteristic);
            } else {
                node.clock_correction_char = Some(characteristic);
            }
            tracing::info!(%link, "{slot} characteristic discovered");
        }
    }

    async fn on_procedure_completed(
        &mut self,
        link: ConnectionHandle,
        result: Status,
    ) -> Result<()> {
        if self.current_link != Some(link) {
            tracing::warn!(%link, "procedure completion from non-provisioned link; ignoring");
            return Ok(());
        }

        match self.state {
            ProvisioningState::DiscoverService => self.after_service_discovery(link).await,
            ProvisioningState::SetNodeId => self.send_node_id(link).await,
            ProvisioningState::SetSubeventId => self.send_subevent_id(link).await,
            ProvisioningState::SetWallClock => self.send_wall_clock(link).await,
            ProvisioningState::SetClockCorrection => {
                self.send_clock_correction(link, result).await
            }
            ProvisioningState::SyncFinished => self.finish_sync(link, result).await,
            _ => Ok(()),
        }
    }

    async fn after_service_discovery(&mut self, link: ConnectionHandle) -> Result<()> {
        let Some(service) = self.directory.find_node(link).and_then(|n| n.service) else {
            tracing::debug!(%link, "service discovery completed without a match");
            return Ok(());
        };

        match self.commands.discover_characteristics(link, service).await {
            Ok(()) => {
                self.state = ProvisioningState::SetNodeId;
                Ok(())
            }
            Err(e) if e.is_link_invalid() => self.resume_scanning().await,
            Err(e) => Err(e),
        }
    }

    async fn send_node_id(&mut self, link: ConnectionHandle) -> Result<()> {
        let Some(node) = self.directory.find_node(link) else {
            return Ok(());
        };
        let Some(characteristic) = node.node_id_char else {
            return Ok(());
        };
        let node_id = node.node_id;

        // Redundant while a connection is in progress, but harmless
        if let Err(e) = self.commands.stop_scan().await {
            tracing::debug!(error = %e, "stop_scan before node-id write failed");
        }

        if !self
            .write_or_fallback(link, characteristic, encode_node_id(node_id))
            .await?
        {
            return Ok(());
        }
        tracing::info!(%link, %node_id, "node id sent to the peripheral");
        self.state = ProvisioningState::SetSubeventId;
        Ok(())
    }

    async fn send_subevent_id(&mut self, link: ConnectionHandle) -> Result<()> {
        let Some(characteristic) = self
            .directory
            .find_node(link)
            .and_then(|n| n.subevent_char)
        else {
            return Ok(());
        };

        if !self
            .write_or_fallback(link, characteristic, encode_subevent_id(ASSIGNED_SUBEVENT))
            .await?
        {
            return Ok(());
        }
        tracing::info!(%link, subevent = ASSIGNED_SUBEVENT.0, "subevent id sent to the peripheral");
        self.state = ProvisioningState::SetWallClock;
        Ok(())
    }

    async fn send_wall_clock(&mut self, link: ConnectionHandle) -> Result<()> {
        let Some(characteristic) = self
            .directory
            .find_node(link)
            .and_then(|n| n.wall_clock_char)
        else {
            return Ok(());
        };

        self.wall_clock_sent = self.ticks.tick_count();
        if !self
            .write_or_fallback(link, characteristic, encode_wall_clock(self.wall_clock_sent))
            .await?
        {
            return Ok(());
        }
        tracing::info!(%link, ticks = self.wall_clock_sent, "wall clock sent to the peripheral");
        self.state = ProvisioningState::SetClockCorrection;
        Ok(())
    }

    async fn send_clock_correction(
        &mut self,
        link: ConnectionHandle,
        result: Status,
    ) -> Result<()> {
        let Some(characteristic) = self
            .directory
            .find_node(link)
            .and_then(|n| n.clock_correction_char)
        else {
            return Ok(());
        };

        if !result.is_ok() {
            return Err(TimeSyncError::ProcedureFailed {
                link,
                status: result.code(),
            });
        }

        // Half the wall-clock round trip approximates the one-way latency;
        // odd deltas round toward positive infinity.
        let round_trip = self.ticks.tick_count().wrapping_sub(self.wall_clock_sent);
        let correction = round_trip / 2 + round_trip % 2;

        #[allow(clippy::cast_possible_wrap)]
        let payload = encode_clock_correction(correction as i32);
        if !self.write_or_fallback(link, characteristic, payload).await? {
            return Ok(());
        }
        tracing::info!(%link, correction, "clock correction sent to the peripheral");
        self.state = ProvisioningState::SyncFinished;
        Ok(())
    }

    async fn finish_sync(&mut self, link: ConnectionHandle, result: Status) -> Result<()> {
        if !result.is_ok() {
            return Err(TimeSyncError::ProcedureFailed {
                link,
                status: result.code(),
            });
        }

        self.commands.transfer_periodic_sync_info(link).await?;
        tracing::info!(%link, "periodic-train sync info sent");

        let node_id = if let Some(node) = self.directory.find_mut(link) {
            node.synchronized = true;
            node.node_id
        } else {
            return Ok(());
        };
        let _ = self.events.send(GatewayEvent::PeripheralReady { link, node_id });
        self.current_link = None;

        if self.directory.is_full() {
            tracing::info!("sensor network full");
            self.state = ProvisioningState::NetworkFull;
        } else {
            self.commands.start_scan().await?;
            tracing::info!("scanning for further peripheral nodes");
            self.state = ProvisioningState::Scanning;
        }
        Ok(())
    }

    async fn on_subevent_data_request(&mut self) -> Result<()> {
        let payload = self.feeder.next_payload();
        #[allow(clippy::cast_possible_truncation)]
        self.commands
            .set_subevent_data(
                ASSIGNED_SUBEVENT,
                0,
                self.config.max_peripherals as u8,
                bytes::Bytes::copy_from_slice(&[payload]),
            )
            .await
    }

    async fn on_link_closed(&mut self, link: ConnectionHandle) -> Result<()> {
        if let Some(node_id) = self.directory.remove(link) {
            tracing::info!(%link, %node_id, "peripheral node removed");
            let _ = self.events.send(GatewayEvent::PeripheralLost { node_id });
        }
        if self.current_link == Some(link) {
            self.current_link = None;
        }
        if self.pending_link == Some(link) {
            self.pending_link = None;
        }

        if self.state != ProvisioningState::Scanning && self.state != ProvisioningState::Inactive {
            self.commands.start_scan().await?;
            tracing::info!("scanning resumed after disconnect");
            self.state = ProvisioningState::Scanning;
        }
        Ok(())
    }

    /// Write a characteristic, falling back to scanning on a dead link
    ///
    /// Returns `true` when the write was issued, `false` when the link was
    /// invalid and the engine fell back to scanning.
    async fn write_or_fallback(
        &mut self,
        link: ConnectionHandle,
        characteristic: crate::types::AttributeHandle,
        value: bytes::Bytes,
    ) -> Result<bool> {
        match self
            .commands
            .write_characteristic(link, characteristic, value)
            .await
        {
            Ok(()) => Ok(true),
            Err(e) if e.is_link_invalid() => {
                tracing::warn!(%link, "write on invalid link, dropping peripheral");
                self.resume_scanning().await?;
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn resume_scanning(&mut self) -> Result<()> {
        self.current_link = None;
        self.commands.start_scan().await?;
        self.state = ProvisioningState::Scanning;
        Ok(())
    }
}
