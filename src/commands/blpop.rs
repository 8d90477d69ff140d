use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore};
use crate::resp::RespValue;
use crate::server::{ServerContext, ServerRole};
use crate::state::ListWaiter;

#[derive(Debug, PartialEq)]
pub struct BlpopArguments {
    keys: Vec<String>,
    timeout_secs: f64,
}

impl BlpopArguments {
    /// `BLPOP key [key ...] timeout`; the timeout is fractional seconds,
    /// `0` blocks forever.
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            return Err(CommandError::WrongNumberOfArguments("BLPOP".to_string()));
        }

        let raw_timeout = arguments.pop().unwrap_or_default();
        let timeout_secs = raw_timeout
            .parse::<f64>()
            .map_err(|_| CommandError::InvalidTimeout)?;

        if !timeout_secs.is_finite() || timeout_secs < 0.0 {
            return Err(CommandError::InvalidTimeout);
        }

        Ok(Self {
            keys: arguments,
            timeout_secs,
        })
    }
}

/// Blocking head-pop across one or more lists.
///
/// Fast path: the first listed key with an element answers immediately.
/// Otherwise one result slot is registered under every key (keyspace lock
/// first, then the coordinator lock) and the worker parks on the slot until
/// a pusher fills it or the deadline passes. A timeout answers with a null
/// array.
pub async fn blpop(
    client_address: &str,
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let blpop_arguments = BlpopArguments::parse(arguments)?;
    let is_master = context.role().await == ServerRole::Master;

    let mut receiver = {
        let mut store = context.store.lock().await;

        for key in &blpop_arguments.keys {
            if let Some(element) = pop_head_element(&mut store, key)? {
                if is_master {
                    propagate_consumed_head(context, key).await;
                }

                return Ok(CommandResult::Response(
                    RespValue::encode_array_from_strings([key.clone(), element]),
                ));
            }
        }

        // One result slot, registered under every listed key; the first
        // write to any of them takes it.
        let (first_waiter, receiver) = ListWaiter::new(client_address);
        let slot = Arc::clone(&first_waiter.slot);
        let mut state = context.state.lock().await;
        let mut keys = blpop_arguments.keys.iter();

        if let Some(key) = keys.next() {
            state.add_list_waiter(key, first_waiter);
        }

        for key in keys {
            state.add_list_waiter(
                key,
                ListWaiter {
                    client_address: client_address.to_string(),
                    slot: Arc::clone(&slot),
                },
            );
        }

        receiver
    };

    let outcome = wait_for_result(&mut receiver, blpop_arguments.timeout_secs).await;

    let outcome = {
        let mut state = context.state.lock().await;

        for key in &blpop_arguments.keys {
            state.remove_list_waiter(key, client_address);
        }

        // A delivery can land right at the deadline. Writers fill the slot
        // while holding this lock, so no send is in flight any more; one
        // final poll either claims that element or confirms the timeout.
        match outcome {
            Some(result) => Some(result),
            None => receiver.try_recv().ok(),
        }
    };

    match outcome {
        Some((key, element)) => Ok(CommandResult::Response(
            RespValue::encode_array_from_strings([key, element]),
        )),
        None => Ok(CommandResult::Response(RespValue::NullArray.encode())),
    }
}

/// Immediate form used inside transactions: pops or answers null without
/// ever parking.
pub fn blpop_immediate(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let blpop_arguments = BlpopArguments::parse(arguments)?;

    for key in &blpop_arguments.keys {
        if let Some(element) = pop_head_element(store, key)? {
            return Ok(CommandResult::Response(
                RespValue::encode_array_from_strings([key.clone(), element]),
            ));
        }
    }

    Ok(CommandResult::Response(RespValue::NullArray.encode()))
}

fn pop_head_element(
    store: &mut KeyValueStore,
    key: &str,
) -> Result<Option<String>, CommandError> {
    let Some(value) = live_entry(store, key) else {
        return Ok(None);
    };

    let DataType::List(ref mut list) = value.data else {
        return Err(CommandError::WrongType);
    };

    let element = list.pop_front();

    if list.is_empty() {
        store.remove(key);
    }

    Ok(element)
}

/// A fast-path pop consumed an element the replicas have already been sent;
/// mirror it on them as a head pop.
async fn propagate_consumed_head(context: &Arc<ServerContext>, key: &str) {
    let frame = RespValue::encode_array_from_strings(["LPOP", key]);
    let mut replicas = context.replicas.lock().await;
    replicas.propagate(frame.as_bytes());
}

async fn wait_for_result(
    receiver: &mut oneshot::Receiver<(String, String)>,
    timeout_secs: f64,
) -> Option<(String, String)> {
    if timeout_secs == 0.0 {
        return receiver.await.ok();
    }

    match tokio::time::timeout(Duration::from_secs_f64(timeout_secs), receiver).await {
        Ok(result) => result.ok(),
        Err(_) => None,
    }
}
