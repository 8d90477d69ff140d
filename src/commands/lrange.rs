use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct LrangeArguments {
    key: String,
    start: i64,
    stop: i64,
}

impl LrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongNumberOfArguments("LRANGE".to_string()));
        }

        let start = arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?;
        let stop = arguments[2]
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?;

        Ok(Self {
            key: arguments[0].clone(),
            start,
            stop,
        })
    }
}

/// Slices the list by index. Negative indexes count back from the tail;
/// out-of-range bounds clamp; an inverted range is an empty array.
pub fn lrange(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let lrange_arguments = LrangeArguments::parse(arguments)?;

    let Some(value) = live_entry(store, &lrange_arguments.key) else {
        return Ok(CommandResult::Response(
            RespValue::Array(Vec::new()).encode(),
        ));
    };

    let DataType::List(ref list) = value.data else {
        return Err(CommandError::WrongType);
    };

    let length = list.len() as i64;

    let start = normalize_index(lrange_arguments.start, length).max(0);
    let stop = normalize_index(lrange_arguments.stop, length).min(length - 1);

    if start > stop || start >= length {
        return Ok(CommandResult::Response(
            RespValue::Array(Vec::new()).encode(),
        ));
    }

    let slice = list
        .iter()
        .skip(start as usize)
        .take((stop - start + 1) as usize)
        .cloned();

    Ok(CommandResult::Response(RespValue::encode_array_from_strings(
        slice,
    )))
}

fn normalize_index(index: i64, length: i64) -> i64 {
    if index < 0 {
        index + length
    } else {
        index
    }
}
