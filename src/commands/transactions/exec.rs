use std::sync::Arc;

use crate::commands::pub_sub::publish;
use crate::commands::{info, wait, CommandError, CommandHandler, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore};
use crate::resp::RespValue;
use crate::server::{ServerContext, ServerRole};
use crate::state::State;

pub struct ExecArguments;

impl ExecArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("EXEC".to_string()));
        }

        Ok(Self)
    }
}

/// Runs a transaction's queued commands as one atomic batch.
///
/// The keyspace lock is taken once and held across the whole loop, so no
/// other command's effects interleave. Per-command failures are encoded
/// inline in the reply array and never stop the batch. Successful writes
/// propagate to replicas in batch order, inside the critical section.
pub async fn run_queued_commands(
    context: &Arc<ServerContext>,
    commands: Vec<CommandHandler>,
) -> String {
    let server_info = context.info.read().await.clone();
    let is_master = server_info.role == ServerRole::Master;

    let mut store = context.store.lock().await;
    let mut state = context.state.lock().await;

    let mut replies = Vec::with_capacity(commands.len());

    for command in &commands {
        let result = match command.name.as_str() {
            // These need more than the keyspace; everything they touch sits
            // after `K` in the lock order, so evaluating them here is safe.
            "WAIT" => wait::wait_immediate(context, command.arguments.clone()).await,
            "INFO" => info::info(context, command.arguments.clone()).await,
            "PUBLISH" => publish(context, command.arguments.clone()).await,
            _ => command.execute_on_keyspace(&mut store, &server_info),
        };

        let reply = match result {
            Ok(CommandResult::Response(reply)) => {
                if is_master && command.is_write_command() {
                    let mut registry = context.replicas.lock().await;
                    registry.propagate(command.input.encode().as_bytes());
                }

                if let Some(key) = command.first_key() {
                    match command.name.as_str() {
                        "RPUSH" | "LPUSH" => {
                            drain_push_waiters(context, &mut store, &mut state, is_master, key)
                                .await;
                        }
                        "XADD" => state.wake_stream_waiters(key),
                        _ => {}
                    }
                }

                reply
            }
            Ok(_) => RespValue::NullBulkString.encode(),
            Err(e) => e.as_string(),
        };

        replies.push(reply);
    }

    format!("*{}\r\n{}", replies.len(), replies.concat())
}

/// After a push commits, hands elements to parked BLPOP waiters and mirrors
/// each handoff to replicas as a head pop.
pub async fn drain_push_waiters(
    context: &Arc<ServerContext>,
    store: &mut KeyValueStore,
    state: &mut State,
    is_master: bool,
    key: &str,
) {
    let Some(value) = live_entry(store, key) else {
        return;
    };

    let DataType::List(ref mut list) = value.data else {
        return;
    };

    let delivered = state.drain_list_waiters(key, list);

    if list.is_empty() {
        store.remove(key);
    }

    if is_master && delivered > 0 {
        let frame =
            RespValue::encode_array_from_strings(["LPOP", key, &delivered.to_string()]);
        let mut registry = context.replicas.lock().await;
        registry.propagate(frame.as_bytes());
    }
}
