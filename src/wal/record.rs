//! Framed record codec for the write-ahead log.
//!
//! On-disk frame layout:
//!
//! ```text
//! [len: u32 LE][crc32: u32 LE][payload: len bytes]
//! ```
//!
//! Payload layout:
//!
//! ```text
//! [txn_id: u64 LE][type: u8][key_len: varint32][value_len: varint32][key][value]
//! ```
//!
//! The checksum covers the payload only. A log segment is a plain
//! concatenation of frames; there is no file header and no resynchronization
//! after a damaged frame.

use crate::encoding;
use crate::error::{Error, Result};

/// Size of the `[len][crc]` frame header.
pub const FRAME_HEADER_LEN: usize = 8;

/// Minimum payload size: txn_id, type byte, and two one-byte varints.
const MIN_PAYLOAD_LEN: usize = 9;

/// Operation carried by a WAL record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum RecordType {
    Begin = 0,
    Put = 1,
    Delete = 2,
    Commit = 3,
    Abort = 4,
}

impl RecordType {
    fn from_u8(v: u8) -> Result<Self> {
        match v {
            0 => Ok(RecordType::Begin),
            1 => Ok(RecordType::Put),
            2 => Ok(RecordType::Delete),
            3 => Ok(RecordType::Commit),
            4 => Ok(RecordType::Abort),
            _ => Err(Error::Corrupt("wal record type")),
        }
    }
}

/// A single logical WAL record.
///
/// `Begin`/`Commit`/`Abort` carry no key or value; `Delete` carries a key
/// only; `Put` carries both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalRecord {
    pub txn_id: u64,
    pub record_type: RecordType,
    pub key: Vec<u8>,
    pub value: Vec<u8>,
}

impl WalRecord {
    pub fn begin(txn_id: u64) -> Self {
        Self::control(txn_id, RecordType::Begin)
    }

    pub fn commit(txn_id: u64) -> Self {
        Self::control(txn_id, RecordType::Commit)
    }

    pub fn abort(txn_id: u64) -> Self {
        Self::control(txn_id, RecordType::Abort)
    }

    pub fn put(txn_id: u64, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            txn_id,
            record_type: RecordType::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(txn_id: u64, key: impl Into<Vec<u8>>) -> Self {
        Self {
            txn_id,
            record_type: RecordType::Delete,
            key: key.into(),
            value: Vec::new(),
        }
    }

    fn control(txn_id: u64, record_type: RecordType) -> Self {
        Self {
            txn_id,
            record_type,
            key: Vec::new(),
            value: Vec::new(),
        }
    }

    /// Serializes the payload portion of the frame.
    pub fn serialize_payload(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(16 + self.key.len() + self.value.len());
        encoding::put_fixed64(&mut out, self.txn_id);
        out.push(self.record_type as u8);
        encoding::put_varint32(&mut out, self.key.len() as u32);
        encoding::put_varint32(&mut out, self.value.len() as u32);
        out.extend_from_slice(&self.key);
        out.extend_from_slice(&self.value);
        out
    }

    /// Serializes the full on-disk frame: header plus payload.
    pub fn serialize_frame(&self) -> Vec<u8> {
        let payload = self.serialize_payload();
        let mut out = Vec::with_capacity(FRAME_HEADER_LEN + payload.len());
        encoding::put_fixed32(&mut out, payload.len() as u32);
        encoding::put_fixed32(&mut out, encoding::crc32(&payload));
        out.extend_from_slice(&payload);
        out
    }

    /// Parses one frame from the front of `input`, advancing it past the
    /// consumed bytes on success. On any error the cursor is left untouched
    /// and the remainder of the stream is unparsable.
    pub fn parse_frame(input: &mut &[u8]) -> Result<WalRecord> {
        if input.len() < FRAME_HEADER_LEN {
            return Err(Error::TruncatedHeader);
        }
        let len = encoding::decode_fixed32(&input[0..]) as usize;
        let stored = encoding::decode_fixed32(&input[4..]);

        let rest = &input[FRAME_HEADER_LEN..];
        if rest.len() < len {
            return Err(Error::TruncatedPayload);
        }
        let payload = &rest[..len];

        let computed = encoding::crc32(payload);
        if computed != stored {
            return Err(Error::CrcMismatch { computed, stored });
        }

        let record = Self::parse_payload(payload)?;
        *input = &rest[len..];
        Ok(record)
    }

    fn parse_payload(payload: &[u8]) -> Result<WalRecord> {
        if payload.len() < MIN_PAYLOAD_LEN {
            return Err(Error::PayloadTooSmall);
        }
        let txn_id = encoding::decode_fixed64(payload);
        let record_type = RecordType::from_u8(payload[8])?;

        let mut rest = &payload[9..];
        let key_len = encoding::get_varint32(&mut rest)
            .ok_or(Error::BadLength("wal key length"))? as usize;
        let value_len = encoding::get_varint32(&mut rest)
            .ok_or(Error::BadLength("wal value length"))? as usize;

        if rest.len() < key_len + value_len {
            return Err(Error::TruncatedKv);
        }

        Ok(WalRecord {
            txn_id,
            record_type,
            key: rest[..key_len].to_vec(),
            value: rest[key_len..key_len + value_len].to_vec(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_all_record_types() {
        let records = vec![
            WalRecord::begin(1),
            WalRecord::put(1, "apple", "red"),
            WalRecord::delete(1, "banana"),
            WalRecord::commit(1),
            WalRecord::begin(2),
            WalRecord::abort(2),
        ];

        let mut log = Vec::new();
        for record in &records {
            log.extend_from_slice(&record.serialize_frame());
        }

        let mut input = log.as_slice();
        let mut parsed = Vec::new();
        while !input.is_empty() {
            parsed.push(WalRecord::parse_frame(&mut input).unwrap());
        }
        assert_eq!(parsed, records);
    }

    #[test]
    fn parse_advances_by_exactly_one_frame() {
        let record = WalRecord::put(3, "k", "v");
        let frame = record.serialize_frame();

        let mut padded = frame.clone();
        padded.extend_from_slice(b"trailing");

        let mut input = padded.as_slice();
        let parsed = WalRecord::parse_frame(&mut input).unwrap();
        assert_eq!(parsed, record);
        assert_eq!(input, b"trailing");
        assert_eq!(padded.len() - input.len(), frame.len());
    }

    #[test]
    fn detects_crc_corruption() {
        let frame = WalRecord::put(42, "key", "value").serialize_frame();

        // Flip one bit inside the payload region (byte 10 = payload[2]).
        let mut bad = frame.clone();
        bad[10] ^= 0x01;

        let mut input = bad.as_slice();
        assert!(matches!(
            WalRecord::parse_frame(&mut input),
            Err(Error::CrcMismatch { .. })
        ));
    }

    #[test]
    fn every_payload_bit_flip_is_detected() {
        let frame = WalRecord::put(7, "ab", "cd").serialize_frame();
        for byte in FRAME_HEADER_LEN..frame.len() {
            for bit in 0..8 {
                let mut bad = frame.clone();
                bad[byte] ^= 1 << bit;
                let mut input = bad.as_slice();
                assert!(
                    matches!(
                        WalRecord::parse_frame(&mut input),
                        Err(Error::CrcMismatch { .. })
                    ),
                    "flip at byte {byte} bit {bit} went undetected"
                );
            }
        }
    }

    #[test]
    fn detects_truncated_header() {
        let mut input: &[u8] = &[0x01, 0x00, 0x00];
        assert!(matches!(
            WalRecord::parse_frame(&mut input),
            Err(Error::TruncatedHeader)
        ));
    }

    #[test]
    fn detects_truncated_payload() {
        let mut frame = WalRecord::put(7, "a", "b").serialize_frame();
        frame.truncate(FRAME_HEADER_LEN + 3);

        let mut input = frame.as_slice();
        assert!(matches!(
            WalRecord::parse_frame(&mut input),
            Err(Error::TruncatedPayload)
        ));
    }

    #[test]
    fn rejects_unknown_record_type() {
        let mut payload = WalRecord::begin(1).serialize_payload();
        payload[8] = 200;

        let mut frame = Vec::new();
        encoding::put_fixed32(&mut frame, payload.len() as u32);
        encoding::put_fixed32(&mut frame, encoding::crc32(&payload));
        frame.extend_from_slice(&payload);

        let mut input = frame.as_slice();
        assert!(matches!(
            WalRecord::parse_frame(&mut input),
            Err(Error::Corrupt(_))
        ));
    }

    #[test]
    fn rejects_payload_smaller_than_fixed_fields() {
        let payload = [0u8; 5];
        let mut frame = Vec::new();
        encoding::put_fixed32(&mut frame, payload.len() as u32);
        encoding::put_fixed32(&mut frame, encoding::crc32(&payload));
        frame.extend_from_slice(&payload);

        let mut input = frame.as_slice();
        assert!(matches!(
            WalRecord::parse_frame(&mut input),
            Err(Error::PayloadTooSmall)
        ));
    }

    #[test]
    fn rejects_kv_lengths_exceeding_payload() {
        // Declare a 100-byte key but supply none.
        let mut payload = Vec::new();
        encoding::put_fixed64(&mut payload, 1);
        payload.push(RecordType::Put as u8);
        encoding::put_varint32(&mut payload, 100);
        encoding::put_varint32(&mut payload, 0);

        let mut frame = Vec::new();
        encoding::put_fixed32(&mut frame, payload.len() as u32);
        encoding::put_fixed32(&mut frame, encoding::crc32(&payload));
        frame.extend_from_slice(&payload);

        let mut input = frame.as_slice();
        assert!(matches!(
            WalRecord::parse_frame(&mut input),
            Err(Error::TruncatedKv)
        ));
    }

    #[test]
    fn handles_large_key_and_value() {
        let big_key = vec![b'K'; 8192];
        let big_value = vec![b'V'; 16384];
        let record = WalRecord::put(99, big_key.clone(), big_value.clone());

        let frame = record.serialize_frame();
        let mut input = frame.as_slice();
        let parsed = WalRecord::parse_frame(&mut input).unwrap();

        assert_eq!(parsed.txn_id, 99);
        assert_eq!(parsed.key, big_key);
        assert_eq!(parsed.value, big_value);
        assert!(input.is_empty());
    }
}
