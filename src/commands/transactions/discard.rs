use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::state::State;

pub struct DiscardArguments;

impl DiscardArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("DISCARD".to_string()));
        }

        Ok(Self)
    }
}

pub fn discard(
    client_address: &str,
    state: &mut State,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    DiscardArguments::parse(arguments)?;

    state
        .take_transaction(client_address)
        .map_err(|_| CommandError::DiscardWithoutMulti)?;

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}
