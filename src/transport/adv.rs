//! Advertisement payload inspection
//!
//! Advertisements are sequences of length-prefixed AD fields. The
//! provisioning scan filter looks for a 16-bit service identifier inside a
//! "partial" or "complete list of 16-bit service UUIDs" field.

use crate::types::Uuid16;

/// AD field type: incomplete list of 16-bit service UUIDs
const AD_TYPE_UUID16_PARTIAL: u8 = 0x02;
/// AD field type: complete list of 16-bit service UUIDs
const AD_TYPE_UUID16_COMPLETE: u8 = 0x03;

/// Check whether an advertisement payload lists the given service
///
/// Walks the AD fields; malformed length prefixes terminate the walk
/// without a match.
#[must_use]
pub fn contains_service_uuid(data: &[u8], uuid: Uuid16) -> bool {
    let needle = uuid.to_le_bytes();
    let mut i = 0usize;

    while i + 1 < data.len() {
        let field_len = data[i] as usize;
        if field_len == 0 {
            break;
        }
        let field_type = data[i + 1];
        let value_end = i + 1 + field_len;
        if value_end > data.len() {
            break;
        }

        if field_type == AD_TYPE_UUID16_PARTIAL || field_type == AD_TYPE_UUID16_COMPLETE {
            let list = &data[i + 2..value_end];
            if list.chunks_exact(2).any(|pair| pair == needle) {
                return true;
            }
        }

        i = value_end;
    }

    false
}
