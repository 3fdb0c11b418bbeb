use std::sync::Arc;

use bytes::Bytes;

use crate::clock::{ManualClock, SharedClock, shared_clock};
use crate::peripheral::handle::{apply_systematic_correction, tick_error_envelope};
use crate::peripheral::{DriftTracker, PeripheralEngine};
use crate::testing::{CommandCall, MockCommands, test_address};
use crate::transport::{BleEvent, DataStatus, Status, WriteKind};
use crate::types::{
    AttributeHandle, ConnectionHandle, NodeId, PeripheralConfig, SubeventId, SyncHandle,
};

// ===== drift tracker =====

#[test]
fn test_drift_tracker_accepts_in_envelope_error() {
    let mut drift = DriftTracker::new(0, 1);
    // one tick slow over a 32767-tick nominal interval
    assert_eq!(drift.observe(32_768, 32_767), 1);
    assert_eq!(drift.last_accepted_error(), 1);
}

#[test]
fn test_drift_tracker_holds_last_good_on_outlier() {
    let mut drift = DriftTracker::new(0, 1);
    assert_eq!(drift.observe(32_768, 32_767), 1);

    // two ticks of error exceeds the envelope; last accepted error stands
    assert_eq!(drift.observe(32_768 + 32_769, 32_767), 1);
    assert_eq!(drift.last_accepted_error(), 1);

    // the baseline still advanced, so the next in-envelope report is normal
    assert_eq!(drift.observe(32_768 + 32_769 + 32_766, 32_767), -1);
}

#[test]
fn test_drift_tracker_initial_outlier_applies_zero() {
    let mut drift = DriftTracker::new(0, 1);
    assert_eq!(drift.observe(40_000, 32_767), 0);
}

#[test]
fn test_drift_tracker_tolerates_tick_wrap() {
    let mut drift = DriftTracker::new(u32::MAX - 100, 1);
    // 32768 elapsed ticks across the wrap boundary
    assert_eq!(drift.observe(32_667, 32_767), 1);
}

#[test]
fn test_tick_error_envelope_rounds_to_nearest() {
    assert_eq!(tick_error_envelope(32_767), 1);
    assert_eq!(tick_error_envelope(25_000), 1);
    assert_eq!(tick_error_envelope(20_000), 0);
    assert_eq!(tick_error_envelope(75_000), 2);
}

#[test]
fn test_systematic_correction_is_36_ppm() {
    assert_eq!(apply_systematic_correction(32_768), 32_767);
    assert_eq!(apply_systematic_correction(1_000_000), 999_964);
    assert_eq!(apply_systematic_correction(0), 0);
}

// ===== engine =====

struct Fixture {
    engine: PeripheralEngine<MockCommands>,
    mock: MockCommands,
    ticks: Arc<ManualClock>,
    clock: SharedClock,
}

fn fixture(config: PeripheralConfig) -> Fixture {
    let mock = MockCommands::new();
    let ticks = Arc::new(ManualClock::new(32_768));
    let clock = shared_clock(ticks.clone());
    let engine = PeripheralEngine::new(config, mock.clone(), clock.clone());
    Fixture {
        engine,
        mock,
        ticks,
        clock,
    }
}

fn write_event(characteristic: AttributeHandle, value: &[u8], kind: WriteKind) -> BleEvent {
    BleEvent::WriteRequest {
        link: ConnectionHandle(1),
        characteristic,
        value: Bytes::copy_from_slice(value),
        kind,
    }
}

fn sync_transfer(train_interval: u16) -> BleEvent {
    BleEvent::SyncTransferReceived {
        status: Status::Ok,
        link: ConnectionHandle(1),
        sync: SyncHandle(7),
        train_interval,
    }
}

fn report(sync: SyncHandle, data_status: DataStatus) -> BleEvent {
    BleEvent::SubeventReport {
        sync,
        subevent: SubeventId(0),
        data_status,
        payload: Bytes::copy_from_slice(&[0x2A]),
    }
}

#[tokio::test]
async fn test_boot_starts_advertising() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine.handle_event(BleEvent::Boot).await.unwrap();
    assert_eq!(fx.mock.calls(), vec![CommandCall::StartAdvertising]);
}

#[tokio::test]
async fn test_connection_arms_sync_receive() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine
        .handle_event(BleEvent::LinkOpened {
            link: ConnectionHandle(1),
            address: test_address(1),
        })
        .await
        .unwrap();
    assert_eq!(fx.engine.handle().link, Some(ConnectionHandle(1)));

    fx.engine
        .handle_event(BleEvent::ConnectionParameters {
            link: ConnectionHandle(1),
        })
        .await
        .unwrap();

    assert!(fx.mock.calls().contains(&CommandCall::SetSyncReceiveParameters {
        link: ConnectionHandle(1),
        skip: 0,
        timeout: 0x2000,
    }));
}

#[tokio::test]
async fn test_wall_clock_write_initializes_clock() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.ticks.set(500);

    fx.engine
        .handle_event(write_event(
            AttributeHandle(3),
            &1000u32.to_le_bytes(),
            WriteKind::Request,
        ))
        .await
        .unwrap();

    assert_eq!(fx.clock.virtual_time(), 1000);
    // write request gets acknowledged
    assert!(fx.mock.calls().contains(&CommandCall::SendWriteResponse {
        link: ConnectionHandle(1),
        characteristic: AttributeHandle(3),
    }));
}

#[tokio::test]
async fn test_correction_write_shifts_clock() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.ticks.set(500);
    fx.clock.set_from_wall_clock(1000);

    fx.engine
        .handle_event(write_event(
            AttributeHandle(4),
            &25i32.to_le_bytes(),
            WriteKind::Request,
        ))
        .await
        .unwrap();

    assert_eq!(fx.clock.virtual_time(), 1025);
}

#[tokio::test]
async fn test_identity_writes_update_handle() {
    let mut fx = fixture(PeripheralConfig::default());

    fx.engine
        .handle_event(write_event(AttributeHandle(1), &[3], WriteKind::Request))
        .await
        .unwrap();
    fx.engine
        .handle_event(write_event(AttributeHandle(2), &[0], WriteKind::Request))
        .await
        .unwrap();

    assert_eq!(fx.engine.handle().node_id, Some(NodeId(3)));
    assert_eq!(fx.engine.handle().subevent, Some(SubeventId(0)));
}

#[tokio::test]
async fn test_write_command_is_not_acknowledged() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine
        .handle_event(write_event(AttributeHandle(1), &[3], WriteKind::Command))
        .await
        .unwrap();

    assert!(
        !fx.mock
            .calls()
            .iter()
            .any(|c| matches!(c, CommandCall::SendWriteResponse { .. }))
    );
}

#[tokio::test]
async fn test_malformed_write_is_dropped_but_acknowledged() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.ticks.set(500);
    fx.clock.set_from_wall_clock(1000);

    // two bytes where the wall clock needs four
    fx.engine
        .handle_event(write_event(AttributeHandle(3), &[1, 2], WriteKind::Request))
        .await
        .unwrap();

    // clock untouched, but the writer's procedure still completes
    assert_eq!(fx.clock.virtual_time(), 1000);
    assert!(fx.mock.calls().contains(&CommandCall::SendWriteResponse {
        link: ConnectionHandle(1),
        characteristic: AttributeHandle(3),
    }));
}

#[tokio::test]
async fn test_sync_transfer_configures_sync_and_drift() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine
        .handle_event(write_event(AttributeHandle(2), &[0], WriteKind::Command))
        .await
        .unwrap();
    fx.mock.take_calls();

    // 800 units of 1.25 ms is a 1 s train
    fx.engine.handle_event(sync_transfer(800)).await.unwrap();

    let handle = fx.engine.handle();
    assert_eq!(handle.sync, Some(SyncHandle(7)));
    // 32768 ticks per second, minus the 36 ppm oscillator bias
    assert_eq!(handle.nominal_interval_ticks, 32_767);

    let drift = fx.engine.drift().unwrap();
    assert_eq!(drift.tick_error_max(), 1);

    let calls = fx.mock.calls();
    // supervision timeout: (3 * 1000 ms + 10) / 10
    assert!(calls.contains(&CommandCall::UpdateSyncParameters {
        sync: SyncHandle(7),
        skip: 0,
        timeout: 301,
    }));
    assert!(calls.contains(&CommandCall::SetSyncSubevents {
        sync: SyncHandle(7),
        subevents: vec![SubeventId(0)],
    }));
}

#[tokio::test]
async fn test_sync_transfer_timeout_is_clamped() {
    let mut fx = fixture(PeripheralConfig::default());
    // longest representable train: 0xFFFF units is about 82 s
    fx.engine.handle_event(sync_transfer(0xFFFF)).await.unwrap();

    assert!(fx.mock.calls().iter().any(|c| matches!(
        c,
        CommandCall::UpdateSyncParameters {
            timeout: 0x4000,
            ..
        }
    )));
}

#[tokio::test]
async fn test_sync_transfer_timeout_scales_with_skip() {
    let config = PeripheralConfig::builder().sync_skip(2).build();
    let mut fx = fixture(config);
    fx.engine.handle_event(sync_transfer(800)).await.unwrap();

    assert!(fx.mock.calls().contains(&CommandCall::UpdateSyncParameters {
        sync: SyncHandle(7),
        skip: 2,
        timeout: 903,
    }));
}

#[tokio::test]
async fn test_failed_sync_transfer_leaves_engine_unsynced() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine
        .handle_event(BleEvent::SyncTransferReceived {
            status: Status::Error(0x0185),
            link: ConnectionHandle(1),
            sync: SyncHandle(7),
            train_interval: 800,
        })
        .await
        .unwrap();

    assert!(fx.engine.handle().sync.is_none());
    assert!(fx.engine.drift().is_none());
    assert!(fx.mock.calls().is_empty());
}

#[tokio::test]
async fn test_subevent_reports_steer_clock() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.ticks.set(1000);
    fx.clock.set_from_wall_clock(50_000);
    let offset0 = fx.clock.offset();

    fx.engine.handle_event(sync_transfer(800)).await.unwrap();

    // one tick slow: within the envelope, steers the offset back by one
    fx.ticks.advance(32_768);
    fx.engine
        .handle_event(report(SyncHandle(7), DataStatus::Complete))
        .await
        .unwrap();
    assert_eq!(fx.clock.offset(), offset0 - 1);

    // two ticks slow: outlier, held at the last accepted error of +1
    fx.ticks.advance(32_769);
    fx.engine
        .handle_event(report(SyncHandle(7), DataStatus::Complete))
        .await
        .unwrap();
    assert_eq!(fx.clock.offset(), offset0 - 2);
}

#[tokio::test]
async fn test_incomplete_report_is_inert() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine.handle_event(sync_transfer(800)).await.unwrap();
    let offset0 = fx.clock.offset();

    fx.ticks.advance(40_000);
    fx.engine
        .handle_event(report(SyncHandle(7), DataStatus::Truncated))
        .await
        .unwrap();
    assert_eq!(fx.clock.offset(), offset0);
}

#[tokio::test]
async fn test_report_for_foreign_sync_is_ignored() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine.handle_event(sync_transfer(800)).await.unwrap();
    let offset0 = fx.clock.offset();

    fx.ticks.advance(32_768);
    fx.engine
        .handle_event(report(SyncHandle(99), DataStatus::Complete))
        .await
        .unwrap();
    assert_eq!(fx.clock.offset(), offset0);
}

#[tokio::test]
async fn test_link_close_readvertises_and_keeps_sync() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine
        .handle_event(BleEvent::LinkOpened {
            link: ConnectionHandle(1),
            address: test_address(1),
        })
        .await
        .unwrap();
    fx.engine.handle_event(sync_transfer(800)).await.unwrap();
    fx.mock.take_calls();

    fx.engine
        .handle_event(BleEvent::LinkClosed {
            link: ConnectionHandle(1),
            reason: 0x13,
        })
        .await
        .unwrap();

    assert!(fx.engine.handle().link.is_none());
    assert_eq!(fx.engine.handle().sync, Some(SyncHandle(7)));
    assert!(fx.engine.drift().is_some());
    assert_eq!(fx.mock.calls(), vec![CommandCall::StartAdvertising]);
}

#[tokio::test]
async fn test_sync_loss_clears_drift_state() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine.handle_event(sync_transfer(800)).await.unwrap();

    fx.engine
        .handle_event(BleEvent::SyncClosed { sync: SyncHandle(7) })
        .await
        .unwrap();

    assert!(fx.engine.handle().sync.is_none());
    assert!(fx.engine.drift().is_none());
}

#[tokio::test]
async fn test_foreign_sync_loss_is_ignored() {
    let mut fx = fixture(PeripheralConfig::default());
    fx.engine.handle_event(sync_transfer(800)).await.unwrap();

    fx.engine
        .handle_event(BleEvent::SyncClosed {
            sync: SyncHandle(99),
        })
        .await
        .unwrap();

    assert_eq!(fx.engine.handle().sync, Some(SyncHandle(7)));
    assert!(fx.engine.drift().is_some());
}

#[tokio::test]
async fn test_timestamp_reads_virtual_time() {
    let fx = fixture(PeripheralConfig::default());
    fx.ticks.set(500);
    fx.clock.set_from_wall_clock(1000);
    fx.ticks.advance(10);
    assert_eq!(fx.engine.timestamp(), 1010);
}
