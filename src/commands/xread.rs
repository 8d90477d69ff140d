use std::ops::Bound;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::commands::stream_utils::{encode_stream_entries, parse_cursor};
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore, StreamId};
use crate::resp::RespValue;
use crate::server::ServerContext;
use crate::state::StreamWaiter;

#[derive(Debug, PartialEq)]
pub struct XreadArguments {
    block_ms: Option<u64>,
    key_id_pairs: Vec<(String, String)>,
}

impl XreadArguments {
    /// `XREAD [BLOCK ms] STREAMS key [key ...] id [id ...]`.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 3 {
            return Err(CommandError::WrongNumberOfArguments("XREAD".to_string()));
        }

        let (block_ms, streams_index) = match arguments[0].to_lowercase().as_str() {
            "block" => {
                let duration = arguments[1]
                    .parse::<u64>()
                    .map_err(|_| CommandError::InvalidTimeout)?;

                (Some(duration), 2)
            }
            _ => (None, 0),
        };

        if arguments
            .get(streams_index)
            .map(|keyword| keyword.to_lowercase())
            .as_deref()
            != Some("streams")
        {
            return Err(CommandError::SyntaxError);
        }

        let data = &arguments[streams_index + 1..];

        if data.is_empty() || data.len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("XREAD".to_string()));
        }

        let half = data.len() / 2;
        let key_id_pairs = (0..half)
            .map(|i| (data[i].clone(), data[half + i].clone()))
            .collect();

        Ok(Self {
            block_ms,
            key_id_pairs,
        })
    }
}

/// Reads entries strictly greater than each cursor.
///
/// `$` cursors resolve to the stream's top id at call time, so a blocking
/// read only sees entries appended after the command arrived. The blocking
/// form parks on every listed stream until one of them gets an append or
/// the deadline passes (`BLOCK 0` waits forever, timeouts answer with a
/// null array).
pub async fn xread(
    client_address: &str,
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;

    let (cursors, immediate) = {
        let mut store = context.store.lock().await;
        let cursors = resolve_cursors(&mut store, &xread_arguments.key_id_pairs)?;
        let immediate = read_streams(&mut store, &cursors)?;
        (cursors, immediate)
    };

    if let Some(response) = immediate {
        return Ok(CommandResult::Response(response));
    }

    let Some(block_ms) = xread_arguments.block_ms else {
        return Ok(CommandResult::Response(
            RespValue::Array(Vec::new()).encode(),
        ));
    };

    let mut receiver = {
        let mut store = context.store.lock().await;

        // The keyspace may have moved between the first read and now; check
        // again before parking so an append is never missed.
        if let Some(response) = read_streams(&mut store, &cursors)? {
            return Ok(CommandResult::Response(response));
        }

        let (sender, receiver) = mpsc::channel(cursors.len().max(1));
        let mut state = context.state.lock().await;

        for (key, _) in &cursors {
            state.add_stream_waiter(
                key,
                StreamWaiter {
                    client_address: client_address.to_string(),
                    wake: sender.clone(),
                },
            );
        }

        receiver
    };

    let _ = wait_for_wake(&mut receiver, block_ms).await;

    {
        let mut state = context.state.lock().await;

        for (key, _) in &cursors {
            state.remove_stream_waiter(key, client_address);
        }
    }

    // Whether woken or timed out, a final read settles it: an append that
    // raced the deadline is still returned rather than dropped.
    let mut store = context.store.lock().await;

    match read_streams(&mut store, &cursors)? {
        Some(response) => Ok(CommandResult::Response(response)),
        None => Ok(CommandResult::Response(RespValue::NullArray.encode())),
    }
}

/// Immediate form used inside transactions: the BLOCK option is ignored.
pub fn xread_immediate(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xread_arguments = XreadArguments::parse(arguments)?;
    let cursors = resolve_cursors(store, &xread_arguments.key_id_pairs)?;

    match read_streams(store, &cursors)? {
        Some(response) => Ok(CommandResult::Response(response)),
        None => Ok(CommandResult::Response(
            RespValue::Array(Vec::new()).encode(),
        )),
    }
}

fn resolve_cursors(
    store: &mut KeyValueStore,
    pairs: &[(String, String)],
) -> Result<Vec<(String, StreamId)>, CommandError> {
    let mut cursors = Vec::with_capacity(pairs.len());

    for (key, raw_id) in pairs {
        let top = match live_entry(store, key) {
            Some(value) => {
                let DataType::Stream(ref stream) = value.data else {
                    return Err(CommandError::WrongType);
                };

                stream.keys().next_back().copied().unwrap_or(StreamId::new(0, 0))
            }
            None => StreamId::new(0, 0),
        };

        cursors.push((key.clone(), parse_cursor(raw_id, top)?));
    }

    Ok(cursors)
}

/// Builds the `[key, entries]` reply for every stream holding entries past
/// its cursor, or `None` when no stream does.
fn read_streams(
    store: &mut KeyValueStore,
    cursors: &[(String, StreamId)],
) -> Result<Option<String>, CommandError> {
    let mut per_stream = Vec::new();

    for (key, cursor) in cursors {
        let Some(value) = live_entry(store, key) else {
            continue;
        };

        let DataType::Stream(ref stream) = value.data else {
            return Err(CommandError::WrongType);
        };

        let entries: Vec<_> = stream
            .range((Bound::Excluded(*cursor), Bound::Unbounded))
            .collect();

        if entries.is_empty() {
            continue;
        }

        per_stream.push(RespValue::Array(vec![
            RespValue::BulkString(key.clone()),
            encode_stream_entries(entries),
        ]));
    }

    if per_stream.is_empty() {
        return Ok(None);
    }

    Ok(Some(RespValue::Array(per_stream).encode()))
}

async fn wait_for_wake(receiver: &mut mpsc::Receiver<()>, block_ms: u64) -> bool {
    if block_ms == 0 {
        return receiver.recv().await.is_some();
    }

    matches!(
        tokio::time::timeout(Duration::from_millis(block_ms), receiver.recv()).await,
        Ok(Some(()))
    )
}
