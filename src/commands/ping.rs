use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;

pub struct PingArguments {
    message: Option<String>,
}

impl PingArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() > 1 {
            return Err(CommandError::WrongNumberOfArguments("PING".to_string()));
        }

        Ok(Self {
            message: arguments.into_iter().next(),
        })
    }
}

pub fn ping(arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let ping_arguments = PingArguments::parse(arguments)?;

    let response = match ping_arguments.message {
        Some(message) => RespValue::BulkString(message).encode(),
        None => RespValue::SimpleString("PONG".to_string()).encode(),
    };

    Ok(CommandResult::Response(response))
}

/// PING inside subscriber mode replies with a two element array instead of
/// the simple string.
pub fn ping_subscribed(arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let ping_arguments = PingArguments::parse(arguments)?;

    Ok(CommandResult::Response(
        RespValue::Array(vec![
            RespValue::BulkString("pong".to_string()),
            RespValue::BulkString(ping_arguments.message.unwrap_or_default()),
        ])
        .encode(),
    ))
}
