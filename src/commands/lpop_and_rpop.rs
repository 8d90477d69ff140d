use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct PopArguments {
    key: String,
    count: Option<usize>,
}

impl PopArguments {
    pub fn parse(arguments: Vec<String>, from_tail: bool) -> Result<Self, CommandError> {
        let name = if from_tail { "RPOP" } else { "LPOP" };

        if arguments.is_empty() || arguments.len() > 2 {
            return Err(CommandError::WrongNumberOfArguments(name.to_string()));
        }

        let count = match arguments.get(1) {
            Some(raw) => Some(raw.parse::<usize>().map_err(|_| CommandError::NotAnInteger)?),
            None => None,
        };

        Ok(Self {
            key: arguments[0].clone(),
            count,
        })
    }
}

pub fn lpop(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    pop(store, PopArguments::parse(arguments, false)?, false)
}

pub fn rpop(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    pop(store, PopArguments::parse(arguments, true)?, true)
}

/// Pops from one end: a bare pop answers with a bulk string, a counted pop
/// with an array. A list left empty is deleted.
fn pop(
    store: &mut KeyValueStore,
    arguments: PopArguments,
    from_tail: bool,
) -> Result<CommandResult, CommandError> {
    let Some(value) = live_entry(store, &arguments.key) else {
        let response = match arguments.count {
            Some(_) => RespValue::NullArray,
            None => RespValue::NullBulkString,
        };
        return Ok(CommandResult::Response(response.encode()));
    };

    let DataType::List(ref mut list) = value.data else {
        return Err(CommandError::WrongType);
    };

    let requested = arguments.count.unwrap_or(1).min(list.len());
    let mut popped = Vec::with_capacity(requested);

    for _ in 0..requested {
        let element = if from_tail {
            list.pop_back()
        } else {
            list.pop_front()
        };

        match element {
            Some(element) => popped.push(element),
            None => break,
        }
    }

    if list.is_empty() {
        store.remove(&arguments.key);
    }

    let response = match arguments.count {
        None => match popped.into_iter().next() {
            Some(element) => RespValue::BulkString(element).encode(),
            None => RespValue::NullBulkString.encode(),
        },
        Some(_) => RespValue::encode_array_from_strings(popped),
    };

    Ok(CommandResult::Response(response))
}
