use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct GetArguments {
    key: String,
}

impl GetArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("GET".to_string()));
        }

        Ok(Self {
            key: arguments.remove(0),
        })
    }
}

pub fn get(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let get_arguments = GetArguments::parse(arguments)?;

    let Some(value) = live_entry(store, &get_arguments.key) else {
        return Ok(CommandResult::Response(RespValue::NullBulkString.encode()));
    };

    let DataType::String(ref content) = value.data else {
        return Err(CommandError::WrongType);
    };

    Ok(CommandResult::Response(
        RespValue::BulkString(content.clone()).encode(),
    ))
}
