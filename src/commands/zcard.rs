use crate::commands::zset_utils::live_sorted_set;
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct ZcardArguments {
    key: String,
}

impl ZcardArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("ZCARD".to_string()));
        }

        Ok(Self {
            key: arguments.remove(0),
        })
    }
}

pub fn zcard(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let zcard_arguments = ZcardArguments::parse(arguments)?;

    let count = match live_sorted_set(store, &zcard_arguments.key)? {
        Some(set) => set.len(),
        None => 0,
    };

    Ok(CommandResult::Response(
        RespValue::Integer(count as i64).encode(),
    ))
}
