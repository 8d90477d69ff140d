use std::sync::Arc;

use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::ServerContext;

#[derive(Debug, PartialEq)]
pub struct PsyncArguments {
    replication_id: String,
    offset: i64,
}

impl PsyncArguments {
    /// `PSYNC <replid|?> <offset|-1>`.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("PSYNC".to_string()));
        }

        let offset = match arguments[1].as_str() {
            "-1" => -1,
            raw => raw
                .parse::<i64>()
                .map_err(|_| CommandError::InvalidPsyncOffset)?,
        };

        Ok(Self {
            replication_id: arguments[0].clone(),
            offset,
        })
    }
}

/// Answers `+FULLRESYNC <replid> <offset>`; the connection layer follows up
/// with the snapshot transfer and registers the caller as a replica.
pub async fn psync(
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let psync_arguments = PsyncArguments::parse(arguments)?;

    let info = context.info.read().await;

    if psync_arguments.replication_id != "?"
        && psync_arguments.replication_id != info.replication_id
    {
        return Err(CommandError::InvalidPsyncReplicationId);
    }

    // Partial resync is not supported; any offset gets a full snapshot.
    let _ = psync_arguments.offset;

    let repl_offset = {
        let registry = context.replicas.lock().await;
        registry.repl_offset()
    };

    Ok(CommandResult::Sync(
        RespValue::SimpleString(format!(
            "FULLRESYNC {} {}",
            info.replication_id, repl_offset
        ))
        .encode(),
    ))
}
