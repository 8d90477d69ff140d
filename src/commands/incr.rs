use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore, Value};
use crate::resp::RespValue;

pub struct IncrArguments {
    key: String,
    amount: i64,
}

impl IncrArguments {
    /// `INCR key` is `INCRBY key 1`.
    pub fn parse(arguments: Vec<String>, with_amount: bool) -> Result<Self, CommandError> {
        let name = if with_amount { "INCRBY" } else { "INCR" };
        let expected = if with_amount { 2 } else { 1 };

        if arguments.len() != expected {
            return Err(CommandError::WrongNumberOfArguments(name.to_string()));
        }

        let amount = if with_amount {
            arguments[1]
                .parse::<i64>()
                .map_err(|_| CommandError::NotAnInteger)?
        } else {
            1
        };

        Ok(Self {
            key: arguments[0].clone(),
            amount,
        })
    }
}

pub fn incr(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    increment(store, IncrArguments::parse(arguments, false)?)
}

pub fn incrby(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    increment(store, IncrArguments::parse(arguments, true)?)
}

/// Parses the stored string as a signed 64-bit decimal, adds the amount and
/// writes the result back. A missing key starts from zero.
fn increment(
    store: &mut KeyValueStore,
    arguments: IncrArguments,
) -> Result<CommandResult, CommandError> {
    let new_value = match live_entry(store, &arguments.key) {
        Some(value) => {
            let DataType::String(ref mut content) = value.data else {
                return Err(CommandError::WrongType);
            };

            let current = content
                .parse::<i64>()
                .map_err(|_| CommandError::NotAnInteger)?;
            let incremented = current
                .checked_add(arguments.amount)
                .ok_or(CommandError::NotAnInteger)?;

            *content = incremented.to_string();
            incremented
        }
        None => {
            store.insert(
                arguments.key,
                Value::new(DataType::String(arguments.amount.to_string())),
            );
            arguments.amount
        }
    };

    Ok(CommandResult::Response(
        RespValue::Integer(new_value).encode(),
    ))
}
