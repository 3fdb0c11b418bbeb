//! Peripheral event engine

use super::handle::{DriftTracker, TimeSyncHandle, apply_systematic_correction, tick_error_envelope};
use crate::clock::SharedClock;
use crate::error::Result;
use crate::transport::{
    BleEvent, Commands, DataStatus, Status, WriteKind, decode_clock_correction, decode_node_id,
    decode_subevent_id, decode_wall_clock,
};
use crate::types::{AttributeHandle, ConnectionHandle, PeripheralConfig, SubeventId, SyncHandle};

/// Event-driven clock-acquisition engine for a peripheral node
///
/// Owns the [`TimeSyncHandle`] and the drift tracker; shares the virtual
/// clock with the telemetry consumer, which reads corrected timestamps via
/// [`crate::VirtualClock::virtual_time`].
pub struct PeripheralEngine<C: Commands> {
    config: PeripheralConfig,
    commands: C,
    clock: SharedClock,
    handle: TimeSyncHandle,
    drift: Option<DriftTracker>,
}

impl<C: Commands> PeripheralEngine<C> {
    /// Create a peripheral engine over a shared virtual clock
    #[must_use]
    pub fn new(config: PeripheralConfig, commands: C, clock: SharedClock) -> Self {
        Self {
            config,
            commands,
            clock,
            handle: TimeSyncHandle::default(),
            drift: None,
        }
    }

    /// Current synchronization state
    #[must_use]
    pub fn handle(&self) -> &TimeSyncHandle {
        &self.handle
    }

    /// The drift tracker, present while a periodic-train sync is held
    #[must_use]
    pub fn drift(&self) -> Option<&DriftTracker> {
        self.drift.as_ref()
    }

    /// The shared virtual clock
    #[must_use]
    pub fn clock(&self) -> &SharedClock {
        &self.clock
    }

    /// Corrected local timestamp for sensor-sample time-stamping
    #[must_use]
    pub fn timestamp(&self) -> u32 {
        self.clock.virtual_time()
    }

    /// Handle one transport event to completion
    ///
    /// # Errors
    ///
    /// Returns rejected-command errors; malformed write payloads,
    /// incomplete subevent reports and failed sync transfers are absorbed
    /// silently.
    pub async fn handle_event(&mut self, event: BleEvent) -> Result<()> {
        match event {
            BleEvent::Boot => self.commands.start_advertising().await,
            BleEvent::LinkOpened { link, .. } => {
                self.handle.link = Some(link);
                Ok(())
            }
            BleEvent::ConnectionParameters { link } => {
                self.commands
                    .set_sync_receive_parameters(
                        link,
                        self.config.sync_skip,
                        self.config.sync_receive_timeout,
                    )
                    .await
            }
            BleEvent::WriteRequest {
                link,
                characteristic,
                value,
                kind,
            } => self.on_write(link, characteristic, &value, kind).await,
            BleEvent::SyncTransferReceived {
                status,
                sync,
                train_interval,
                ..
            } => self.on_sync_transfer(status, sync, train_interval).await,
            BleEvent::SubeventReport {
                sync, data_status, ..
            } => {
                self.on_subevent_report(sync, data_status);
                Ok(())
            }
            BleEvent::LinkClosed { .. } => {
                // Sync state is carried by the train alone; only the GATT
                // link is gone. Re-advertise for re-connection.
                self.handle.link = None;
                self.commands.start_advertising().await
            }
            BleEvent::SyncClosed { sync } => {
                if self.handle.sync == Some(sync) {
                    tracing::info!("periodic-train sync lost");
                    self.handle.sync = None;
                    self.drift = None;
                }
                Ok(())
            }
            // Gateway-side events; not for a peripheral
            _ => Ok(()),
        }
    }

    /// Apply one control-characteristic write
    ///
    /// Writes arrive in no guaranteed order; each is idempotent and
    /// independent. A malformed payload is remote data, not a local
    /// defect: it is logged and dropped, and the writer still gets its
    /// acknowledgment so the GATT procedure completes.
    async fn on_write(
        &mut self,
        link: ConnectionHandle,
        characteristic: AttributeHandle,
        value: &[u8],
        kind: WriteKind,
    ) -> Result<()> {
        if let Err(e) = self.apply_write(characteristic, value) {
            tracing::warn!(
                characteristic = characteristic.0,
                error = %e,
                "malformed control write dropped"
            );
        }

        if kind == WriteKind::Request {
            self.commands.send_write_response(link, characteristic).await?;
        }
        Ok(())
    }

    fn apply_write(&mut self, characteristic: AttributeHandle, value: &[u8]) -> Result<()> {
        if characteristic == self.config.wall_clock_char {
            let wall_clock = decode_wall_clock(value)?;
            self.clock.set_from_wall_clock(wall_clock);
            tracing::info!(wall_clock, "wall clock received");
        } else if characteristic == self.config.clock_correction_char {
            let correction = decode_clock_correction(value)?;
            self.clock.apply_correction(correction);
            tracing::info!(correction, "clock correction received");
        } else if characteristic == self.config.node_id_char {
            let node_id = decode_node_id(value)?;
            self.handle.node_id = Some(node_id);
            tracing::info!(%node_id, "node id assigned");
        } else if characteristic == self.config.subevent_char {
            let subevent = decode_subevent_id(value)?;
            self.handle.subevent = Some(subevent);
            tracing::info!(subevent = subevent.0, "subevent id assigned");
        } else {
            tracing::debug!(characteristic = characteristic.0, "write to unknown characteristic");
        }
        Ok(())
    }

    async fn on_sync_transfer(
        &mut self,
        status: Status,
        sync: SyncHandle,
        train_interval: u16,
    ) -> Result<()> {
        if !status.is_ok() {
            tracing::debug!(status = status.code(), "sync transfer failed; staying unsynced");
            return Ok(());
        }

        let now = self.clock.tick_count();
        self.handle.sync = Some(sync);

        // The advertised interval arrives in units of 1.25 ms; go through an
        // integer millisecond intermediate before converting to ticks.
        let interval_ms = 10 * u32::from(train_interval) / 8;

        let timeout = self.supervision_timeout(interval_ms);
        self.commands
            .update_sync_parameters(sync, self.config.sync_skip, timeout)
            .await?;

        let nominal = apply_systematic_correction(self.clock.ms_to_ticks(interval_ms));
        self.handle.nominal_interval_ticks = nominal;

        let subevent = self.handle.subevent.unwrap_or(SubeventId(0));
        self.commands.set_sync_subevents(sync, &[subevent]).await?;

        let envelope = tick_error_envelope(nominal);
        self.drift = Some(DriftTracker::new(now, envelope));
        tracing::info!(
            interval_ms,
            nominal_ticks = nominal,
            tick_error_max = envelope,
            "periodic-train sync acquired"
        );
        Ok(())
    }

    /// Supervision timeout for the sync, in units of 10 ms
    ///
    /// Sized to tolerate `max_sync_lost` consecutive missed trains, clamped
    /// to the transport's limits and scaled by the skip count.
    fn supervision_timeout(&self, interval_ms: u32) -> u32 {
        let mut timeout =
            (self.config.max_sync_lost * interval_ms + self.config.sync_timeout_min) / 10;
        timeout = timeout.clamp(self.config.sync_timeout_min, self.config.sync_timeout_max);

        let scaled = timeout * (u32::from(self.config.sync_skip) + 1);
        scaled.min(self.config.sync_timeout_max)
    }

    fn on_subevent_report(&mut self, sync: SyncHandle, data_status: DataStatus) {
        // Incomplete reports are dropped with no state change
        if data_status != DataStatus::Complete {
            return;
        }
        if self.handle.sync != Some(sync) {
            return;
        }
        let Some(drift) = self.drift.as_mut() else {
            return;
        };

        let now = self.clock.tick_count();
        let tick_error = drift.observe(now, self.handle.nominal_interval_ticks);
        self.clock.adjust(tick_error);
        tracing::trace!(tick_error, offset = self.clock.offset(), "train report applied");
    }
}
