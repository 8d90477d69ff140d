use std::sync::Arc;

use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::{ServerContext, ServerInfo};

pub struct InfoArguments {
    section: Option<String>,
}

impl InfoArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::WrongNumberOfArguments("INFO".to_string()));
        }

        Ok(Self {
            section: arguments.into_iter().next().map(|s| s.to_lowercase()),
        })
    }
}

/// The replication section body: role, replica count, replication id and
/// current offset.
pub fn replication_section(
    info: &ServerInfo,
    repl_offset: usize,
    connected_replicas: usize,
) -> String {
    [
        "# Replication".to_string(),
        format!("role:{}", info.role.as_str()),
        format!("connected_slaves:{}", connected_replicas),
        format!("master_replid:{}", info.replication_id),
        format!("master_repl_offset:{}", repl_offset),
    ]
    .join("\r\n")
}

/// Only the replication section is implemented; any requested section
/// answers with it.
pub async fn info(
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let _ = InfoArguments::parse(arguments)?;

    let server_info = context.info.read().await.clone();
    let (repl_offset, connected_replicas) = {
        let registry = context.replicas.lock().await;
        (registry.repl_offset(), registry.replica_count())
    };

    Ok(CommandResult::Response(
        RespValue::BulkString(replication_section(
            &server_info,
            repl_offset,
            connected_replicas,
        ))
        .encode(),
    ))
}
