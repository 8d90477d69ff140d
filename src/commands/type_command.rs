use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, KeyValueStore};
use crate::resp::RespValue;

pub struct TypeArguments {
    key: String,
}

impl TypeArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("TYPE".to_string()));
        }

        Ok(Self {
            key: arguments.remove(0),
        })
    }
}

pub fn type_command(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let type_arguments = TypeArguments::parse(arguments)?;

    let type_name = match live_entry(store, &type_arguments.key) {
        Some(value) => value.data.type_name(),
        None => "none",
    };

    Ok(CommandResult::Response(
        RespValue::SimpleString(type_name.to_string()).encode(),
    ))
}
