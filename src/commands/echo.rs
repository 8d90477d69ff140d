use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;

pub struct EchoArguments {
    message: String,
}

impl EchoArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("ECHO".to_string()));
        }

        Ok(Self {
            message: arguments.remove(0),
        })
    }
}

pub fn echo(arguments: Vec<String>) -> Result<CommandResult, CommandError> {
    let echo_arguments = EchoArguments::parse(arguments)?;

    Ok(CommandResult::Response(
        RespValue::BulkString(echo_arguments.message).encode(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_echo() {
        let result = echo(vec!["hey".to_string()]).unwrap();
        assert_eq!(result, CommandResult::Response("$3\r\nhey\r\n".to_string()));

        assert_eq!(
            echo(vec![]),
            Err(CommandError::WrongNumberOfArguments("ECHO".to_string()))
        );
        assert_eq!(
            echo(vec!["a".to_string(), "b".to_string()]),
            Err(CommandError::WrongNumberOfArguments("ECHO".to_string()))
        );
    }
}
