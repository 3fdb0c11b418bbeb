use std::time::Duration;

use crate::transport::{
    TrainParams, contains_service_uuid, decode_clock_correction, decode_node_id,
    decode_subevent_id, decode_wall_clock, encode_clock_correction, encode_node_id,
    encode_subevent_id, encode_wall_clock,
};
use crate::types::{NodeId, SubeventId, TrainSchedule, Uuid16};
use crate::{BleEvent, TimeSyncError};

// ===== wire =====

#[test]
fn test_node_id_round_trip() {
    let encoded = encode_node_id(NodeId(3));
    assert_eq!(encoded.as_ref(), &[3]);
    assert_eq!(decode_node_id(&encoded).unwrap(), NodeId(3));
}

#[test]
fn test_subevent_id_round_trip() {
    let encoded = encode_subevent_id(SubeventId(0));
    assert_eq!(decode_subevent_id(&encoded).unwrap(), SubeventId(0));
}

#[test]
fn test_wall_clock_is_little_endian() {
    let encoded = encode_wall_clock(0x0102_0304);
    assert_eq!(encoded.as_ref(), &[0x04, 0x03, 0x02, 0x01]);
    assert_eq!(decode_wall_clock(&encoded).unwrap(), 0x0102_0304);
}

#[test]
fn test_clock_correction_signed() {
    let encoded = encode_clock_correction(-25);
    assert_eq!(decode_clock_correction(&encoded).unwrap(), -25);
}

#[test]
fn test_decode_rejects_wrong_length() {
    assert!(matches!(
        decode_node_id(&[1, 2]),
        Err(TimeSyncError::Codec { .. })
    ));
    assert!(matches!(
        decode_wall_clock(&[1, 2, 3]),
        Err(TimeSyncError::Codec { .. })
    ));
    assert!(matches!(
        decode_clock_correction(&[]),
        Err(TimeSyncError::Codec { .. })
    ));
}

// ===== adv =====

#[test]
fn test_adv_complete_uuid_list_matches() {
    // flags field, then complete 16-bit UUID list containing 0x98C7
    let data = [0x02, 0x01, 0x06, 0x03, 0x03, 0xC7, 0x98];
    assert!(contains_service_uuid(&data, Uuid16(0x98C7)));
    assert!(!contains_service_uuid(&data, Uuid16(0x1809)));
}

#[test]
fn test_adv_partial_uuid_list_matches() {
    let data = [0x05, 0x02, 0x09, 0x18, 0xC7, 0x98];
    assert!(contains_service_uuid(&data, Uuid16(0x98C7)));
    assert!(contains_service_uuid(&data, Uuid16(0x1809)));
}

#[test]
fn test_adv_uuid_in_other_field_type_ignored() {
    // same bytes but inside a local-name field
    let data = [0x03, 0x09, 0xC7, 0x98];
    assert!(!contains_service_uuid(&data, Uuid16(0x98C7)));
}

#[test]
fn test_adv_malformed_length_terminates_walk() {
    // field claims 0x20 bytes but the payload ends early
    let data = [0x20, 0x03, 0xC7, 0x98];
    assert!(!contains_service_uuid(&data, Uuid16(0x98C7)));

    // zero-length field would loop forever if not rejected
    let data = [0x00, 0x00, 0x00];
    assert!(!contains_service_uuid(&data, Uuid16(0x98C7)));
}

#[test]
fn test_adv_empty_payload() {
    assert!(!contains_service_uuid(&[], Uuid16(0x98C7)));
}

// ===== train params =====

#[test]
fn test_train_params_from_default_schedule() {
    let schedule = TrainSchedule::default();
    let params = TrainParams::from_schedule(&schedule, 4).unwrap();
    assert_eq!(params.interval_units, 800);
    assert_eq!(params.num_subevents, 1);
    assert_eq!(params.response_slots, 4);
}

#[test]
fn test_train_params_rejects_short_interval() {
    let schedule = TrainSchedule {
        interval: Duration::from_millis(5),
        ..TrainSchedule::default()
    };
    assert!(matches!(
        TrainParams::from_schedule(&schedule, 4),
        Err(TimeSyncError::IntervalOutOfRange { units: 4, .. })
    ));
}

#[test]
fn test_train_params_rejects_long_interval() {
    let schedule = TrainSchedule {
        interval: Duration::from_secs(100),
        ..TrainSchedule::default()
    };
    assert!(TrainParams::from_schedule(&schedule, 4).is_err());
}

#[test]
fn test_events_are_clone_and_send() {
    fn assert_send<T: Send + Clone>() {}
    assert_send::<BleEvent>();
}
