//! RDB snapshot support.
//!
//! Replication full-resync ships a fixed empty snapshot, framed as a bulk
//! string without the trailing CRLF. Startup loading is best-effort: string
//! entries (with optional expiry) are read, every other payload type makes
//! the loader give up on the rest of the file and keep what it has.

use std::collections::HashMap;

use jiff::Timestamp;
use thiserror::Error;
use tokio::time::Instant;

use crate::key_value_store::{DataType, KeyValueStore, Value};

/// The canonical empty snapshot: header, aux fields, EOF marker, checksum.
pub const EMPTY_RDB: &[u8] = &[
    0x52, 0x45, 0x44, 0x49, 0x53, 0x30, 0x30, 0x31, 0x31, 0xfa, 0x09, 0x72, 0x65,
    0x64, 0x69, 0x73, 0x2d, 0x76, 0x65, 0x72, 0x05, 0x37, 0x2e, 0x32, 0x2e, 0x30,
    0xfa, 0x0a, 0x72, 0x65, 0x64, 0x69, 0x73, 0x2d, 0x62, 0x69, 0x74, 0x73, 0xc0,
    0x40, 0xfa, 0x05, 0x63, 0x74, 0x69, 0x6d, 0x65, 0xc2, 0x6d, 0x08, 0xbc, 0x65,
    0xfa, 0x08, 0x75, 0x73, 0x65, 0x64, 0x2d, 0x6d, 0x65, 0x6d, 0xc2, 0xb0, 0xc4,
    0x10, 0x00, 0xfa, 0x08, 0x61, 0x6f, 0x66, 0x2d, 0x62, 0x61, 0x73, 0x65, 0xc0,
    0x00, 0xff, 0xf0, 0x6e, 0x3b, 0xfe, 0xc0, 0xff, 0x5a, 0xa2,
];

const OPCODE_AUX: u8 = 0xFA;
const OPCODE_RESIZE_DB: u8 = 0xFB;
const OPCODE_EXPIRE_TIME_MS: u8 = 0xFC;
const OPCODE_EXPIRE_TIME_SEC: u8 = 0xFD;
const OPCODE_SELECT_DB: u8 = 0xFE;
const OPCODE_EOF: u8 = 0xFF;
const TYPE_STRING: u8 = 0x00;

#[derive(Error, Debug, PartialEq)]
pub enum RdbError {
    #[error("missing REDIS magic string")]
    InvalidMagicString,
    #[error("unexpected end of snapshot")]
    UnexpectedEof,
    #[error("invalid length encoding")]
    InvalidLengthEncoding,
    #[error("invalid UTF-8 in snapshot string")]
    InvalidUtf8,
}

/// Frames a snapshot for the replication socket: `$<len>\r\n<bytes>` with no
/// trailing CRLF.
pub fn snapshot_transfer_bytes(payload: &[u8]) -> Vec<u8> {
    let mut framed = format!("${}\r\n", payload.len()).into_bytes();
    framed.extend_from_slice(payload);

    framed
}

/// Accepts a received snapshot: only the magic header is inspected, the body
/// is discarded. An empty but well-formed snapshot is the expected case.
pub fn validate_snapshot(payload: &[u8]) -> Result<(), RdbError> {
    if payload.len() < 9 || &payload[0..5] != b"REDIS" {
        return Err(RdbError::InvalidMagicString);
    }

    Ok(())
}

struct SnapshotReader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> SnapshotReader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        SnapshotReader { buffer, cursor: 0 }
    }

    fn take(&mut self, count: usize) -> Result<&'a [u8], RdbError> {
        if self.cursor + count > self.buffer.len() {
            return Err(RdbError::UnexpectedEof);
        }

        let slice = &self.buffer[self.cursor..self.cursor + count];
        self.cursor += count;

        Ok(slice)
    }

    fn take_byte(&mut self) -> Result<u8, RdbError> {
        Ok(self.take(1)?[0])
    }

    fn peek_byte(&self) -> Result<u8, RdbError> {
        self.buffer
            .get(self.cursor)
            .copied()
            .ok_or(RdbError::UnexpectedEof)
    }

    /// Length encoding: the top two bits of the first byte pick a 6-bit,
    /// 14-bit, or 32-bit length; `0b11` marks a specially encoded value.
    fn read_length(&mut self) -> Result<u64, RdbError> {
        let first = self.take_byte()?;

        match first >> 6 {
            0b00 => Ok((first & 0b0011_1111) as u64),
            0b01 => {
                let second = self.take_byte()?;
                Ok((((first & 0b0011_1111) as u64) << 8) | second as u64)
            }
            0b10 => {
                let bytes = self.take(4)?;
                Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as u64)
            }
            _ => Err(RdbError::InvalidLengthEncoding),
        }
    }

    fn read_string(&mut self) -> Result<String, RdbError> {
        let first = self.peek_byte()?;

        // `0b11` prefixes an integer stored inline as 1, 2 or 4 bytes.
        if first >> 6 == 0b11 {
            self.cursor += 1;

            let value = match first & 0b0011_1111 {
                0 => self.take_byte()? as i8 as i64,
                1 => {
                    let bytes = self.take(2)?;
                    i16::from_le_bytes([bytes[0], bytes[1]]) as i64
                }
                2 => {
                    let bytes = self.take(4)?;
                    i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64
                }
                _ => return Err(RdbError::InvalidLengthEncoding),
            };

            return Ok(value.to_string());
        }

        let length = self.read_length()? as usize;
        let bytes = self.take(length)?;

        str::from_utf8(bytes)
            .map(|s| s.to_string())
            .map_err(|_| RdbError::InvalidUtf8)
    }
}

/// Parses string entries out of a snapshot, skipping aux fields and hash
/// table hints. Expired entries are dropped; anything unrecognized ends the
/// scan with whatever was read so far.
pub fn parse_snapshot(payload: &[u8]) -> Result<KeyValueStore, RdbError> {
    validate_snapshot(payload)?;

    let mut reader = SnapshotReader::new(payload);
    reader.cursor = 9;

    let mut store: KeyValueStore = HashMap::new();
    let now_ms = Timestamp::now().as_millisecond();

    loop {
        let opcode = match reader.take_byte() {
            Ok(opcode) => opcode,
            Err(RdbError::UnexpectedEof) => break,
            Err(e) => return Err(e),
        };

        match opcode {
            OPCODE_EOF => break,
            OPCODE_AUX => {
                reader.read_string()?;
                reader.read_string()?;
            }
            OPCODE_SELECT_DB => {
                reader.read_length()?;
            }
            OPCODE_RESIZE_DB => {
                reader.read_length()?;
                reader.read_length()?;
            }
            OPCODE_EXPIRE_TIME_MS | OPCODE_EXPIRE_TIME_SEC => {
                let expiry_ms = if opcode == OPCODE_EXPIRE_TIME_MS {
                    let bytes = reader.take(8)?;
                    u64::from_le_bytes([
                        bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6],
                        bytes[7],
                    ]) as i64
                } else {
                    let bytes = reader.take(4)?;
                    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as i64 * 1000
                };

                let value_type = reader.take_byte()?;

                if value_type != TYPE_STRING {
                    break;
                }

                let key = reader.read_string()?;
                let value = reader.read_string()?;

                if expiry_ms <= now_ms {
                    continue;
                }

                let remaining = std::time::Duration::from_millis((expiry_ms - now_ms) as u64);
                store.insert(
                    key,
                    Value {
                        data: DataType::String(value),
                        expiration: Some(Instant::now() + remaining),
                    },
                );
            }
            TYPE_STRING => {
                let key = reader.read_string()?;
                let value = reader.read_string()?;
                store.insert(key, Value::new(DataType::String(value)));
            }
            _ => break,
        }
    }

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_rdb_is_well_formed() {
        assert_eq!(EMPTY_RDB.len(), 88);
        assert_eq!(validate_snapshot(EMPTY_RDB), Ok(()));
        assert_eq!(parse_snapshot(EMPTY_RDB), Ok(HashMap::new()));
    }

    #[test]
    fn test_snapshot_transfer_framing_has_no_trailing_crlf() {
        let framed = snapshot_transfer_bytes(EMPTY_RDB);

        assert!(framed.starts_with(b"$88\r\n"));
        assert_eq!(&framed[5..], EMPTY_RDB);
        assert!(!framed.ends_with(b"\r\n"));
    }

    #[test]
    fn test_validate_snapshot_rejects_garbage() {
        assert_eq!(
            validate_snapshot(b"not an rdb"),
            Err(RdbError::InvalidMagicString)
        );
        assert_eq!(validate_snapshot(b"RED"), Err(RdbError::InvalidMagicString));
    }

    fn length_prefixed(s: &str) -> Vec<u8> {
        let mut bytes = vec![s.len() as u8];
        bytes.extend_from_slice(s.as_bytes());
        bytes
    }

    #[test]
    fn test_parse_snapshot_reads_string_entries() {
        let mut payload = b"REDIS0011".to_vec();
        payload.push(OPCODE_SELECT_DB);
        payload.push(0);
        payload.push(OPCODE_RESIZE_DB);
        payload.push(2);
        payload.push(0);
        payload.push(TYPE_STRING);
        payload.extend(length_prefixed("fruit"));
        payload.extend(length_prefixed("mango"));
        payload.push(TYPE_STRING);
        payload.extend(length_prefixed("count"));
        // Inline int8 encoding.
        payload.push(0b1100_0000);
        payload.push(42);
        payload.push(OPCODE_EOF);
        payload.extend_from_slice(&[0u8; 8]);

        let store = parse_snapshot(&payload).unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(
            store.get("fruit").map(|v| &v.data),
            Some(&DataType::String("mango".to_string()))
        );
        assert_eq!(
            store.get("count").map(|v| &v.data),
            Some(&DataType::String("42".to_string()))
        );
    }

    #[test]
    fn test_parse_snapshot_drops_already_expired_entries() {
        let mut payload = b"REDIS0011".to_vec();
        payload.push(OPCODE_EXPIRE_TIME_MS);
        payload.extend_from_slice(&1u64.to_le_bytes());
        payload.push(TYPE_STRING);
        payload.extend(length_prefixed("old"));
        payload.extend(length_prefixed("value"));
        payload.push(OPCODE_EOF);

        let store = parse_snapshot(&payload).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_parse_snapshot_stops_at_unknown_payload_types() {
        let mut payload = b"REDIS0011".to_vec();
        payload.push(TYPE_STRING);
        payload.extend(length_prefixed("kept"));
        payload.extend(length_prefixed("yes"));
        // List payload type: unsupported, ends the scan.
        payload.push(0x01);
        payload.extend(length_prefixed("ignored"));

        let store = parse_snapshot(&payload).unwrap();
        assert_eq!(store.len(), 1);
        assert!(store.contains_key("kept"));
    }
}
