use crate::commands::zset_utils::live_sorted_set;
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct ZremArguments {
    key: String,
    member: String,
}

impl ZremArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("ZREM".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            member: arguments[1].clone(),
        })
    }
}

/// Removes one member; a set left empty is deleted.
pub fn zrem(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let zrem_arguments = ZremArguments::parse(arguments)?;

    let removed = match live_sorted_set(store, &zrem_arguments.key)? {
        Some(set) => {
            let removed = set.remove(&zrem_arguments.member).is_some();

            if set.is_empty() {
                store.remove(&zrem_arguments.key);
            }

            removed
        }
        None => false,
    };

    Ok(CommandResult::Response(
        RespValue::Integer(removed as i64).encode(),
    ))
}
