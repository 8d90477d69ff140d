use std::collections::VecDeque;

use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore, Value};
use crate::resp::RespValue;

pub struct PushArguments {
    key: String,
    values: Vec<String>,
}

impl PushArguments {
    pub fn parse(arguments: Vec<String>, prepend: bool) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            let name = if prepend { "LPUSH" } else { "RPUSH" };
            return Err(CommandError::WrongNumberOfArguments(name.to_string()));
        }

        let mut iter = arguments.into_iter();
        let key = iter.next().unwrap_or_default();

        Ok(Self {
            key,
            values: iter.collect(),
        })
    }
}

pub fn rpush(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    push(store, PushArguments::parse(arguments, false)?, false)
}

pub fn lpush(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    push(store, PushArguments::parse(arguments, true)?, true)
}

/// Appends to one end of the list, creating it when absent, and reports the
/// new length. Waking blocked readers happens at the dispatch layer, after
/// the push, under the same keyspace guard.
fn push(
    store: &mut KeyValueStore,
    arguments: PushArguments,
    prepend: bool,
) -> Result<CommandResult, CommandError> {
    let length = match live_entry(store, &arguments.key) {
        Some(value) => {
            let DataType::List(ref mut list) = value.data else {
                return Err(CommandError::WrongType);
            };

            for element in arguments.values {
                if prepend {
                    list.push_front(element);
                } else {
                    list.push_back(element);
                }
            }

            list.len()
        }
        None => {
            let mut list = VecDeque::new();

            for element in arguments.values {
                if prepend {
                    list.push_front(element);
                } else {
                    list.push_back(element);
                }
            }

            let length = list.len();
            store.insert(arguments.key, Value::new(DataType::List(list)));
            length
        }
    };

    Ok(CommandResult::Response(
        RespValue::Integer(length as i64).encode(),
    ))
}
