use std::time::Duration;

use tokio::time::Instant;

use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{DataType, KeyValueStore, Value};
use crate::resp::RespValue;

pub struct SetArguments {
    key: String,
    value: String,
    expiration: Option<Instant>,
}

impl SetArguments {
    /// `SET key value [EX seconds | PX milliseconds]`.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            return Err(CommandError::WrongNumberOfArguments("SET".to_string()));
        }

        let mut expiration: Option<Instant> = None;

        if arguments.len() > 2 {
            if arguments.len() != 4 {
                return Err(CommandError::SyntaxError);
            }

            let ttl = arguments[3]
                .parse::<u64>()
                .map_err(|_| CommandError::NotAnInteger)?;

            let duration = match arguments[2].to_lowercase().as_str() {
                "ex" => Duration::from_secs(ttl),
                "px" => Duration::from_millis(ttl),
                _ => return Err(CommandError::SyntaxError),
            };

            expiration = Some(Instant::now() + duration);
        }

        Ok(Self {
            key: arguments[0].clone(),
            value: arguments[1].clone(),
            expiration,
        })
    }
}

/// SET always replaces the entry wholesale, clearing any previous expiry and
/// kind.
pub fn set(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let set_arguments = SetArguments::parse(arguments)?;

    store.insert(
        set_arguments.key,
        Value {
            data: DataType::String(set_arguments.value),
            expiration: set_arguments.expiration,
        },
    );

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}
