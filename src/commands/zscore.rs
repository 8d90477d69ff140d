use crate::commands::zset_utils::{format_score, live_sorted_set};
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct ZscoreArguments {
    key: String,
    member: String,
}

impl ZscoreArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("ZSCORE".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            member: arguments[1].clone(),
        })
    }
}

pub fn zscore(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let zscore_arguments = ZscoreArguments::parse(arguments)?;

    let Some(set) = live_sorted_set(store, &zscore_arguments.key)? else {
        return Ok(CommandResult::Response(RespValue::NullBulkString.encode()));
    };

    let response = match set.get(&zscore_arguments.member) {
        Some(score) => RespValue::BulkString(format_score(*score)).encode(),
        None => RespValue::NullBulkString.encode(),
    };

    Ok(CommandResult::Response(response))
}
