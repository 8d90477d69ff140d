use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::state::State;

pub struct MultiArguments;

impl MultiArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if !arguments.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("MULTI".to_string()));
        }

        Ok(Self)
    }
}

pub fn multi(
    client_address: &str,
    state: &mut State,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    MultiArguments::parse(arguments)?;

    state
        .start_transaction(client_address)
        .map_err(|_| CommandError::MultiNested)?;

    Ok(CommandResult::Response(
        RespValue::SimpleString("OK".to_string()).encode(),
    ))
}
