use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct LlenArguments {
    key: String,
}

impl LlenArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("LLEN".to_string()));
        }

        Ok(Self {
            key: arguments.remove(0),
        })
    }
}

pub fn llen(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let llen_arguments = LlenArguments::parse(arguments)?;

    let length = match live_entry(store, &llen_arguments.key) {
        Some(value) => {
            let DataType::List(ref list) = value.data else {
                return Err(CommandError::WrongType);
            };
            list.len()
        }
        None => 0,
    };

    Ok(CommandResult::Response(
        RespValue::Integer(length as i64).encode(),
    ))
}
