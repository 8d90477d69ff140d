use std::sync::Arc;

use crate::commands::pub_sub::{publish, subscribe, unsubscribe};
use crate::commands::transactions::{discard, drain_push_waiters, multi, run_queued_commands};
use crate::commands::{
    blpop, info, ping, psync, replconf, wait, xread, CommandError, CommandHandler, CommandResult,
    NON_QUEUEABLE_COMMANDS, SUBSCRIBER_MODE_COMMANDS,
};
use crate::connection::SharedWriter;
use crate::resp::RespValue;
use crate::server::{ServerContext, ServerRole};

/// Routes one parsed command for one connection.
///
/// The dispatcher owns the per-connection decision layers: subscriber-mode
/// restriction, transaction queueing, the replica read-only gate, and the
/// post-commit work of a write on a master (waking parked readers and
/// fanning the command out to replicas).
pub struct CommandDispatcher {
    client_address: String,
    writer: SharedWriter,
    context: Arc<ServerContext>,
}

impl CommandDispatcher {
    pub fn new(client_address: &str, writer: SharedWriter, context: Arc<ServerContext>) -> Self {
        CommandDispatcher {
            client_address: client_address.to_string(),
            writer,
            context,
        }
    }

    pub async fn dispatch(&self, command: CommandHandler) -> Result<CommandResult, CommandError> {
        let subscribed = {
            let pub_sub = self.context.pub_sub.lock().await;
            pub_sub.is_subscribed(&self.client_address)
        };

        if subscribed {
            if !SUBSCRIBER_MODE_COMMANDS.contains(&command.name.as_str()) {
                return Err(CommandError::SubscriberModeRestricted(command.name.clone()));
            }

            if command.name == "PING" {
                return ping::ping_subscribed(command.arguments);
            }
        }

        let name = command.name.clone();

        match name.as_str() {
            "MULTI" => {
                let mut state = self.context.state.lock().await;
                multi(&self.client_address, &mut state, command.arguments)
            }
            "EXEC" => self.exec().await,
            "DISCARD" => {
                let mut state = self.context.state.lock().await;
                discard(&self.client_address, &mut state, command.arguments)
            }
            // QUIT closes the connection regardless of transaction state.
            "QUIT" => Ok(CommandResult::CloseConnection(
                RespValue::SimpleString("OK".to_string()).encode(),
            )),
            _ => {
                let in_transaction = {
                    let state = self.context.state.lock().await;
                    state.in_transaction(&self.client_address)
                };

                if in_transaction {
                    return self.queue_command(command).await;
                }

                self.execute(command).await
            }
        }
    }

    /// Queue-time handling inside MULTI: invalid commands are reported
    /// right away and poison the transaction; valid ones are queued.
    async fn queue_command(&self, command: CommandHandler) -> Result<CommandResult, CommandError> {
        let is_master = self.context.role().await == ServerRole::Master;
        let mut state = self.context.state.lock().await;

        if NON_QUEUEABLE_COMMANDS.contains(&command.name.as_str()) {
            state.mark_transaction_error(&self.client_address)?;
            return Err(CommandError::SyntaxError);
        }

        if !is_master && command.is_write_command() {
            state.mark_transaction_error(&self.client_address)?;
            return Err(CommandError::ReplicaReadOnly);
        }

        if let Some(error) = command.validate_arguments() {
            state.mark_transaction_error(&self.client_address)?;
            return Err(error);
        }

        state.queue_command(&self.client_address, command)?;

        Ok(CommandResult::Response(
            RespValue::SimpleString("QUEUED".to_string()).encode(),
        ))
    }

    async fn exec(&self) -> Result<CommandResult, CommandError> {
        let transaction = {
            let mut state = self.context.state.lock().await;
            state.take_transaction(&self.client_address)
        };

        let Ok(transaction) = transaction else {
            return Err(CommandError::ExecWithoutMulti);
        };

        if transaction.error_sticky {
            return Err(CommandError::TransactionAborted);
        }

        if transaction.queued.is_empty() {
            return Ok(CommandResult::Response(
                RespValue::Array(Vec::new()).encode(),
            ));
        }

        Ok(CommandResult::Response(
            run_queued_commands(&self.context, transaction.queued).await,
        ))
    }

    async fn execute(&self, command: CommandHandler) -> Result<CommandResult, CommandError> {
        let is_master = self.context.role().await == ServerRole::Master;

        if !is_master && command.is_write_command() {
            return Err(CommandError::ReplicaReadOnly);
        }

        let name = command.name.clone();

        match name.as_str() {
            "BLPOP" => blpop::blpop(&self.client_address, &self.context, command.arguments).await,
            "XREAD" => xread::xread(&self.client_address, &self.context, command.arguments).await,
            "SUBSCRIBE" => {
                subscribe(
                    &self.client_address,
                    &self.writer,
                    &self.context,
                    command.arguments,
                )
                .await
            }
            "UNSUBSCRIBE" => {
                unsubscribe(&self.client_address, &self.context, command.arguments).await
            }
            "PUBLISH" => publish(&self.context, command.arguments).await,
            "INFO" => info::info(&self.context, command.arguments).await,
            "REPLCONF" => {
                replconf::replconf(&self.client_address, &self.context, command.arguments).await
            }
            "PSYNC" => psync::psync(&self.context, command.arguments).await,
            "WAIT" => wait::wait(&self.context, command.arguments).await,
            _ => self.execute_on_keyspace(command, is_master).await,
        }
    }

    /// Keyspace commands: run under the keyspace lock, then (still inside
    /// the critical section) fan committed writes out to replicas and hand
    /// pushed elements to parked readers.
    async fn execute_on_keyspace(
        &self,
        command: CommandHandler,
        is_master: bool,
    ) -> Result<CommandResult, CommandError> {
        let server_info = self.context.info.read().await.clone();
        let mut store = self.context.store.lock().await;

        let result = command.execute_on_keyspace(&mut store, &server_info)?;

        if is_master && command.is_write_command() {
            let mut registry = self.context.replicas.lock().await;
            registry.propagate(command.input.encode().as_bytes());
        }

        if let Some(key) = command.first_key() {
            match command.name.as_str() {
                "RPUSH" | "LPUSH" => {
                    let mut state = self.context.state.lock().await;
                    drain_push_waiters(&self.context, &mut store, &mut state, is_master, key)
                        .await;
                }
                "XADD" => {
                    let mut state = self.context.state.lock().await;
                    state.wake_stream_waiters(key);
                }
                _ => {}
            }
        }

        Ok(result)
    }
}
