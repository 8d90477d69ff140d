use std::collections::HashMap;

use crate::commands::zset_utils::{live_sorted_set, parse_score};
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{DataType, KeyValueStore, Value};
use crate::resp::RespValue;

pub struct ZaddArguments {
    key: String,
    score: f64,
    member: String,
}

impl ZaddArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongNumberOfArguments("ZADD".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            score: parse_score(&arguments[1])?,
            member: arguments[2].clone(),
        })
    }
}

/// Inserts or rescores one member; the reply counts newly added members.
pub fn zadd(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let zadd_arguments = ZaddArguments::parse(arguments)?;

    let added = match live_sorted_set(store, &zadd_arguments.key)? {
        Some(set) => set
            .insert(zadd_arguments.member, zadd_arguments.score)
            .is_none(),
        None => {
            store.insert(
                zadd_arguments.key,
                Value::new(DataType::SortedSet(HashMap::from([(
                    zadd_arguments.member,
                    zadd_arguments.score,
                )]))),
            );
            true
        }
    };

    Ok(CommandResult::Response(
        RespValue::Integer(added as i64).encode(),
    ))
}
