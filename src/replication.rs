//! Master–replica replication.
//!
//! The master keeps a registry of connected replicas. Every committed write
//! is serialized back to RESP and appended to each replica's outbound queue
//! while the commit still holds the keyspace lock, so the queue order equals
//! the commit order; a writer task per replica flushes the queue to the
//! socket. `repl_offset` advances by the exact serialized byte length of
//! each propagated command.
//!
//! The replica side runs the handshake (PING, REPLCONF, PSYNC), consumes the
//! bulk-framed snapshot, and then treats the same socket as a stream of
//! commands to apply silently.

use std::collections::HashMap;

use bytes::BytesMut;
use regex::Regex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::warn;

use crate::connection::{write_to_stream, SharedWriter};
use crate::rdb::{validate_snapshot, RdbError};
use crate::resp::{RespError, RespValue};

#[derive(Error, Debug, PartialEq)]
pub enum ReplicationError {
    #[error("I/O error: {0}")]
    IoError(String),
    #[error("connection closed by master")]
    ConnectionClosed,
    #[error("RESP parse error")]
    RespParseError(#[from] RespError),
    #[error("invalid response from master")]
    InvalidResponseFromMaster,
    #[error("invalid snapshot payload")]
    InvalidSnapshot(#[from] RdbError),
}

/// One connected replica: its append-only outbound queue and the last
/// offset it acknowledged.
#[derive(Debug)]
pub struct ReplicaHandle {
    pub sender: mpsc::UnboundedSender<Vec<u8>>,
    pub ack_offset: usize,
}

#[derive(Debug, Default)]
pub struct ReplicaRegistry {
    repl_offset: usize,
    replicas: HashMap<String, ReplicaHandle>,
}

impl ReplicaRegistry {
    pub fn new() -> Self {
        ReplicaRegistry::default()
    }

    pub fn repl_offset(&self) -> usize {
        self.repl_offset
    }

    /// On a replica this mirrors the processed offset of the master link.
    pub fn set_repl_offset(&mut self, offset: usize) {
        self.repl_offset = offset;
    }

    pub fn replica_count(&self) -> usize {
        self.replicas.len()
    }

    pub fn add_replica(&mut self, client_address: &str, sender: mpsc::UnboundedSender<Vec<u8>>) {
        self.replicas.insert(
            client_address.to_string(),
            ReplicaHandle {
                sender,
                ack_offset: 0,
            },
        );
    }

    pub fn remove_replica(&mut self, client_address: &str) {
        self.replicas.remove(client_address);
    }

    /// Fans a committed write out to every replica, advancing the offset by
    /// the serialized length. Call sites hold the keyspace lock so queue
    /// order equals commit order.
    pub fn propagate(&mut self, frame: &[u8]) {
        self.repl_offset += frame.len();

        for handle in self.replicas.values() {
            let _ = handle.sender.send(frame.to_vec());
        }
    }

    /// Sends a frame to every replica without touching the offset (GETACK
    /// probes are not data).
    pub fn broadcast(&self, frame: &[u8]) {
        for handle in self.replicas.values() {
            let _ = handle.sender.send(frame.to_vec());
        }
    }

    pub fn record_ack(&mut self, client_address: &str, offset: usize) {
        if let Some(handle) = self.replicas.get_mut(client_address) {
            handle.ack_offset = handle.ack_offset.max(offset);
        }
    }

    /// How many replicas have acknowledged at least `target` bytes.
    pub fn acknowledged_count(&self, target: usize) -> usize {
        self.replicas
            .values()
            .filter(|handle| handle.ack_offset >= target)
            .count()
    }
}

/// Drains a replica's outbound queue to its socket, preserving order.
pub fn spawn_replica_writer(writer: SharedWriter, mut receiver: mpsc::UnboundedReceiver<Vec<u8>>) {
    tokio::spawn(async move {
        while let Some(frame) = receiver.recv().await {
            if let Err(e) = write_to_stream(&writer, &frame).await {
                warn!("replica write failed, dropping link: {}", e);
                break;
            }
        }
    });
}

pub fn getack_frame() -> String {
    RespValue::encode_array_from_strings(["REPLCONF", "GETACK", "*"])
}

pub fn ack_frame(offset: usize) -> String {
    RespValue::encode_array_from_strings(["REPLCONF", "ACK", &offset.to_string()])
}

/// Runs the replica side of the handshake against a freshly connected
/// master socket.
///
/// Returns the master's replication id together with any bytes that arrived
/// after the snapshot; those bytes are the beginning of the replication
/// stream and must not be lost.
pub async fn perform_handshake(
    stream: &mut TcpStream,
    listening_port: u32,
) -> Result<(String, BytesMut), ReplicationError> {
    let mut buffer = BytesMut::with_capacity(4096);

    let response = exchange(
        stream,
        &mut buffer,
        RespValue::encode_array_from_strings(["PING"]),
    )
    .await?;

    if response != RespValue::SimpleString("PONG".to_string()) {
        return Err(ReplicationError::InvalidResponseFromMaster);
    }

    let response = exchange(
        stream,
        &mut buffer,
        RespValue::encode_array_from_strings([
            "REPLCONF",
            "listening-port",
            &listening_port.to_string(),
        ]),
    )
    .await?;

    if response != RespValue::SimpleString("OK".to_string()) {
        return Err(ReplicationError::InvalidResponseFromMaster);
    }

    let response = exchange(
        stream,
        &mut buffer,
        RespValue::encode_array_from_strings(["REPLCONF", "capa", "psync2"]),
    )
    .await?;

    if response != RespValue::SimpleString("OK".to_string()) {
        return Err(ReplicationError::InvalidResponseFromMaster);
    }

    let response = exchange(
        stream,
        &mut buffer,
        RespValue::encode_array_from_strings(["PSYNC", "?", "-1"]),
    )
    .await?;

    let replication_id = parse_fullresync(&response)?;

    let snapshot = read_snapshot(stream, &mut buffer).await?;
    validate_snapshot(&snapshot)?;

    Ok((replication_id, buffer))
}

async fn exchange(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
    command: String,
) -> Result<RespValue, ReplicationError> {
    stream
        .write_all(command.as_bytes())
        .await
        .map_err(|e| ReplicationError::IoError(e.to_string()))?;
    stream
        .flush()
        .await
        .map_err(|e| ReplicationError::IoError(e.to_string()))?;

    read_reply(stream, buffer).await
}

async fn read_reply(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
) -> Result<RespValue, ReplicationError> {
    use tokio::io::AsyncReadExt;

    loop {
        if let Some((value, _)) = RespValue::decode(buffer)? {
            return Ok(value);
        }

        let read = stream
            .read_buf(buffer)
            .await
            .map_err(|e| ReplicationError::IoError(e.to_string()))?;

        if read == 0 {
            return Err(ReplicationError::ConnectionClosed);
        }
    }
}

fn parse_fullresync(response: &RespValue) -> Result<String, ReplicationError> {
    let RespValue::SimpleString(line) = response else {
        return Err(ReplicationError::InvalidResponseFromMaster);
    };

    let parts = line.split_whitespace().collect::<Vec<&str>>();

    if parts.len() != 3 || parts[0] != "FULLRESYNC" || !is_valid_replication_id(parts[1]) {
        return Err(ReplicationError::InvalidResponseFromMaster);
    }

    parts[2]
        .parse::<usize>()
        .map_err(|_| ReplicationError::InvalidResponseFromMaster)?;

    Ok(parts[1].to_string())
}

fn is_valid_replication_id(replication_id: &str) -> bool {
    match Regex::new(r"^[a-zA-Z0-9]{40}$") {
        Ok(re) => re.is_match(replication_id),
        Err(_) => false,
    }
}

/// Reads the bulk-framed snapshot: `$<len>\r\n` followed by exactly `len`
/// raw bytes, with no trailing CRLF.
async fn read_snapshot(
    stream: &mut TcpStream,
    buffer: &mut BytesMut,
) -> Result<Vec<u8>, ReplicationError> {
    use bytes::Buf;
    use tokio::io::AsyncReadExt;

    loop {
        if let Some(position) = buffer.windows(2).position(|window| window == b"\r\n") {
            if buffer.first() != Some(&b'$') {
                return Err(ReplicationError::InvalidResponseFromMaster);
            }

            let length = str::from_utf8(&buffer[1..position])
                .map_err(|_| ReplicationError::InvalidResponseFromMaster)?
                .parse::<usize>()
                .map_err(|_| ReplicationError::InvalidResponseFromMaster)?;

            while buffer.len() < position + 2 + length {
                let read = stream
                    .read_buf(buffer)
                    .await
                    .map_err(|e| ReplicationError::IoError(e.to_string()))?;

                if read == 0 {
                    return Err(ReplicationError::ConnectionClosed);
                }
            }

            buffer.advance(position + 2);
            let payload = buffer.split_to(length).to_vec();

            return Ok(payload);
        }

        let read = stream
            .read_buf(buffer)
            .await
            .map_err(|e| ReplicationError::IoError(e.to_string()))?;

        if read == 0 {
            return Err(ReplicationError::ConnectionClosed);
        }
    }
}
