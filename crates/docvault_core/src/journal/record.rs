//! Journal record framing.
//!
//! ```text
//! +-------+---------+--------+----------------------+-------+
//! | magic | version | length | payload (JSON)       | crc32 |
//! | 4 B   | u16 LE  | u32 LE | `length` bytes       | u32 LE|
//! +-------+---------+--------+----------------------+-------+
//! ```
//!
//! The CRC covers everything before it.

use crate::error::{CoreError, CoreResult};
use crate::revision::Revision;

/// Magic bytes identifying a journal record.
pub const RECORD_MAGIC: [u8; 4] = *b"DVRL";

/// Current record format version.
pub const RECORD_VERSION: u16 = 1;

/// magic (4) + version (2) + length (4)
const HEADER_SIZE: usize = 10;

const CRC_SIZE: usize = 4;

/// Upper bound on a record payload. Records carry revision metadata only,
/// so a length above this can only come from a damaged header.
pub(crate) const MAX_RECORD_PAYLOAD: usize = 1024 * 1024;

/// Outcome of decoding at an offset.
#[derive(Debug)]
pub(crate) enum Decoded {
    /// A complete, verified record and its total encoded length.
    Record { revision: Revision, len: usize },
    /// The bytes end inside a record: an interrupted append.
    Torn,
}

/// Encodes a revision as a framed record.
pub(crate) fn encode(revision: &Revision) -> CoreResult<Vec<u8>> {
    let payload = serde_json::to_vec(revision)
        .map_err(|e| CoreError::commit(format!("cannot encode revision: {e}")))?;
    let len = u32::try_from(payload.len())
        .map_err(|_| CoreError::commit("journal record payload too large"))?;

    let mut data = Vec::with_capacity(HEADER_SIZE + payload.len() + CRC_SIZE);
    data.extend_from_slice(&RECORD_MAGIC);
    data.extend_from_slice(&RECORD_VERSION.to_le_bytes());
    data.extend_from_slice(&len.to_le_bytes());
    data.extend_from_slice(&payload);

    let crc = crc32fast::hash(&data);
    data.extend_from_slice(&crc.to_le_bytes());
    Ok(data)
}

/// Decodes the record starting at `offset` in `data`.
pub(crate) fn decode_at(data: &[u8], offset: usize) -> CoreResult<Decoded> {
    let rest = &data[offset..];
    if rest.len() < HEADER_SIZE {
        return Ok(Decoded::Torn);
    }

    if rest[0..4] != RECORD_MAGIC {
        return Err(CoreError::corruption(format!(
            "bad journal record magic at offset {offset}"
        )));
    }

    let version = u16::from_le_bytes([rest[4], rest[5]]);
    if version > RECORD_VERSION {
        return Err(CoreError::corruption(format!(
            "unsupported journal record version {version} at offset {offset}"
        )));
    }

    let payload_len = u32::from_le_bytes([rest[6], rest[7], rest[8], rest[9]]) as usize;
    if payload_len > MAX_RECORD_PAYLOAD {
        return Err(CoreError::corruption(format!(
            "journal record at offset {offset} claims {payload_len} payload bytes"
        )));
    }
    let total = HEADER_SIZE
        .checked_add(payload_len)
        .and_then(|n| n.checked_add(CRC_SIZE))
        .ok_or_else(|| CoreError::corruption("journal record length overflows"))?;
    if rest.len() < total {
        return Ok(Decoded::Torn);
    }

    let body_end = HEADER_SIZE + payload_len;
    let stored_crc = u32::from_le_bytes([
        rest[body_end],
        rest[body_end + 1],
        rest[body_end + 2],
        rest[body_end + 3],
    ]);
    let actual_crc = crc32fast::hash(&rest[..body_end]);
    if stored_crc != actual_crc {
        return Err(CoreError::corruption(format!(
            "journal checksum mismatch at offset {offset}: expected {stored_crc:08x}, got {actual_crc:08x}"
        )));
    }

    let revision: Revision = serde_json::from_slice(&rest[HEADER_SIZE..body_end]).map_err(|e| {
        CoreError::corruption(format!("undecodable journal record at offset {offset}: {e}"))
    })?;

    Ok(Decoded::Record {
        revision,
        len: total,
    })
}

/// Returns the position of the first record magic in `data`, if any.
pub(crate) fn find_magic(data: &[u8]) -> Option<usize> {
    data.windows(RECORD_MAGIC.len())
        .position(|window| window == RECORD_MAGIC)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revision::CommitRequest;
    use proptest::prelude::*;

    fn sample() -> Revision {
        Revision::new(None, &CommitRequest::for_save(br#"{"items":[]}"#, "alice"))
    }

    #[test]
    fn encode_then_decode() {
        let rev = sample();
        let data = encode(&rev).unwrap();

        match decode_at(&data, 0).unwrap() {
            Decoded::Record { revision, len } => {
                assert_eq!(revision, rev);
                assert_eq!(len, data.len());
            }
            Decoded::Torn => panic!("complete record decoded as torn"),
        }
    }

    #[test]
    fn flipped_payload_byte_fails_checksum() {
        let mut data = encode(&sample()).unwrap();
        data[HEADER_SIZE + 3] ^= 0x20;

        let result = decode_at(&data, 0);
        assert!(matches!(result, Err(CoreError::Corruption { .. })));
    }

    #[test]
    fn wrong_magic_is_corruption() {
        let mut data = encode(&sample()).unwrap();
        data[0] = b'X';
        assert!(matches!(
            decode_at(&data, 0),
            Err(CoreError::Corruption { .. })
        ));
    }

    #[test]
    fn newer_version_is_rejected() {
        let mut data = encode(&sample()).unwrap();
        data[4..6].copy_from_slice(&(RECORD_VERSION + 1).to_le_bytes());
        assert!(matches!(
            decode_at(&data, 0),
            Err(CoreError::Corruption { .. })
        ));
    }

    #[test]
    fn implausible_length_is_corruption() {
        let mut data = encode(&sample()).unwrap();
        data[9] = 0x7f;
        assert!(matches!(
            decode_at(&data, 0),
            Err(CoreError::Corruption { .. })
        ));
    }

    #[test]
    fn find_magic_locates_later_records() {
        let first = encode(&sample()).unwrap();
        let mut data = first.clone();
        data.extend(encode(&sample()).unwrap());

        assert_eq!(find_magic(&data[1..]), Some(first.len() - 1));
        assert_eq!(find_magic(&first[1..]), None);
        assert_eq!(find_magic(b"DVR"), None);
    }

    proptest! {
        #[test]
        fn every_strict_prefix_is_torn(cut in 0usize..10_000) {
            let data = encode(&sample()).unwrap();
            let cut = cut % data.len();
            prop_assert!(matches!(decode_at(&data[..cut], 0), Ok(Decoded::Torn)));
        }
    }
}
