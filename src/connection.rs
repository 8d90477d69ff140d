//! Per-connection read loops.
//!
//! Every accepted socket gets its own task running [`handle_client_connection`].
//! Bytes are buffered and decoded incrementally, so a command split across
//! TCP segments simply waits in the buffer for its remainder. Protocol
//! errors are fatal to the connection; command errors are replied and the
//! connection lives on.
//!
//! A replica runs one extra task, [`handle_master_connection`], that applies
//! the master's command stream silently and keeps a byte-exact processed
//! offset for acknowledgments.

use std::sync::Arc;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use crate::commands::{CommandDispatcher, CommandHandler, CommandResult};
use crate::rdb::{snapshot_transfer_bytes, EMPTY_RDB};
use crate::replication::{ack_frame, spawn_replica_writer};
use crate::resp::{RespError, RespValue};
use crate::server::ServerContext;

/// A connection's write half, shareable across the tasks that may answer on
/// it (its own read loop, PUBLISH fan-out, the replica writer).
pub type SharedWriter = Arc<RwLock<OwnedWriteHalf>>;

pub async fn write_to_stream(writer: &SharedWriter, response: &[u8]) -> tokio::io::Result<()> {
    let mut writer_guard = writer.write().await;
    writer_guard.write_all(response).await?;
    writer_guard.flush().await?;

    Ok(())
}

pub async fn handle_client_connection(
    stream: TcpStream,
    client_address: String,
    context: Arc<ServerContext>,
) {
    let (mut reader, writer) = stream.into_split();
    let writer: SharedWriter = Arc::new(RwLock::new(writer));
    let dispatcher = CommandDispatcher::new(&client_address, Arc::clone(&writer), Arc::clone(&context));
    let mut buffer = BytesMut::with_capacity(4096);

    'connection: loop {
        let frames = match read_frames(&mut reader, &mut buffer).await {
            Ok(Some(frames)) => frames,
            Ok(None) => break,
            Err(e) => {
                // Malformed RESP is fatal; report and drop the connection.
                let _ = write_to_stream(&writer, e.as_string().as_bytes()).await;
                warn!("protocol error from {}: {}", client_address, e);
                break;
            }
        };

        for (frame, _) in frames {
            let command = match CommandHandler::new(&frame) {
                Ok(command) => command,
                Err(e) => {
                    if write_to_stream(&writer, e.as_string().as_bytes()).await.is_err() {
                        break 'connection;
                    }
                    continue;
                }
            };

            match dispatcher.dispatch(command).await {
                Ok(CommandResult::Response(response)) => {
                    if write_to_stream(&writer, response.as_bytes()).await.is_err() {
                        break 'connection;
                    }
                }
                Ok(CommandResult::NoResponse) => {}
                Ok(CommandResult::CloseConnection(response)) => {
                    let _ = write_to_stream(&writer, response.as_bytes()).await;
                    break 'connection;
                }
                Ok(CommandResult::Sync(header)) => {
                    register_replica(&context, &client_address, &writer, &header).await;
                }
                Err(e) => {
                    if write_to_stream(&writer, e.as_string().as_bytes()).await.is_err() {
                        break 'connection;
                    }
                }
            }
        }
    }

    remove_client(&context, &client_address).await;
    debug!("connection {} closed", client_address);
}

/// Completes a PSYNC: FULLRESYNC header, then the snapshot framed with no
/// trailing CRLF, then the peer becomes a registered replica. Header and
/// snapshot go through the replica's ordered outbound queue, and the
/// registration happens before the queue is first drained, so a write
/// committing concurrently can never slip in ahead of the snapshot. The
/// same socket keeps carrying the replica's ACKs back through the normal
/// command loop.
async fn register_replica(
    context: &Arc<ServerContext>,
    client_address: &str,
    writer: &SharedWriter,
    header: &str,
) {
    let (sender, receiver) = mpsc::unbounded_channel();

    let _ = sender.send(header.as_bytes().to_vec());
    let _ = sender.send(snapshot_transfer_bytes(EMPTY_RDB));

    {
        let mut registry = context.replicas.lock().await;
        registry.add_replica(client_address, sender);
    }

    spawn_replica_writer(Arc::clone(writer), receiver);
    info!("replica {} completed full resync", client_address);
}

/// Drains every complete frame currently readable. `Ok(None)` means the
/// peer closed the connection cleanly.
async fn read_frames(
    reader: &mut OwnedReadHalf,
    buffer: &mut BytesMut,
) -> Result<Option<Vec<(RespValue, usize)>>, RespError> {
    loop {
        let frames = RespValue::decode_all(buffer)?;

        if !frames.is_empty() {
            return Ok(Some(frames));
        }

        match reader.read_buf(buffer).await {
            Ok(0) => return Ok(None),
            Ok(_) => {}
            Err(_) => return Ok(None),
        }
    }
}

/// Applies the master's replication stream on a replica.
///
/// Commands are executed silently against the local keyspace; only
/// `REPLCONF GETACK` produces bytes back to the master. `processed` counts
/// the exact serialized length of every frame consumed, and the GETACK
/// reply carries the offset as it stood before the GETACK frame itself.
pub async fn handle_master_connection(
    stream: TcpStream,
    leftover: BytesMut,
    context: Arc<ServerContext>,
) {
    let server_info = context.info.read().await.clone();
    let (mut reader, writer) = stream.into_split();
    let writer: SharedWriter = Arc::new(RwLock::new(writer));
    let mut buffer = leftover;
    let mut processed: usize = 0;

    loop {
        let frames = match RespValue::decode_all(&mut buffer) {
            Ok(frames) => frames,
            Err(e) => {
                warn!("malformed replication stream: {}", e);
                break;
            }
        };

        for (frame, length) in frames {
            let Ok(command) = CommandHandler::new(&frame) else {
                processed += length;
                continue;
            };

            if is_getack(&command) {
                let reply = ack_frame(processed);

                if write_to_stream(&writer, reply.as_bytes()).await.is_err() {
                    return;
                }

                processed += length;
            } else {
                apply_replicated_command(&context, &server_info, &command).await;
                processed += length;
            }

            let mut registry = context.replicas.lock().await;
            registry.set_repl_offset(processed);
        }

        match reader.read_buf(&mut buffer).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => {
                warn!("master link read failed: {}", e);
                break;
            }
        }
    }

    info!("master link closed after {} bytes", processed);
}

fn is_getack(command: &CommandHandler) -> bool {
    command.name == "REPLCONF"
        && command
            .arguments
            .first()
            .is_some_and(|sub| sub.eq_ignore_ascii_case("GETACK"))
}

async fn apply_replicated_command(
    context: &Arc<ServerContext>,
    server_info: &crate::server::ServerInfo,
    command: &CommandHandler,
) {
    // PING keepalives and unsupported commands still count toward the
    // offset; only keyspace effects are applied.
    if command.name == "PING" || command.name == "REPLCONF" {
        return;
    }

    let mut store = context.store.lock().await;

    if let Err(e) = command.execute_on_keyspace(&mut store, server_info) {
        debug!("replicated command {} failed locally: {}", command.name, e);
        return;
    }

    // A replicated append can satisfy local blocking readers (XREAD BLOCK
    // is a read and stays legal on replicas).
    if command.name == "XADD" {
        if let Some(key) = command.first_key() {
            let mut state = context.state.lock().await;
            state.wake_stream_waiters(key);
        }
    }
}

async fn remove_client(context: &Arc<ServerContext>, client_address: &str) {
    {
        let mut state = context.state.lock().await;
        state.remove_client(client_address);
    }
    {
        let mut pub_sub = context.pub_sub.lock().await;
        pub_sub.remove_client(client_address);
    }
    {
        let mut registry = context.replicas.lock().await;
        registry.remove_replica(client_address);
    }
}
