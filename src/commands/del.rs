use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{remove_live_entry, KeyValueStore};
use crate::resp::RespValue;

pub struct DelArguments {
    keys: Vec<String>,
}

impl DelArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("DEL".to_string()));
        }

        Ok(Self { keys: arguments })
    }
}

/// Removes every named key, counting only keys that were actually live.
pub fn del(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let del_arguments = DelArguments::parse(arguments)?;

    let mut removed = 0;

    for key in &del_arguments.keys {
        if remove_live_entry(store, key) {
            removed += 1;
        }
    }

    Ok(CommandResult::Response(
        RespValue::Integer(removed).encode(),
    ))
}
