use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::ServerInfo;

pub struct ConfigGetArguments {
    parameter: String,
}

impl ConfigGetArguments {
    /// `CONFIG GET <parameter>`; only the GET subcommand exists here.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("CONFIG".to_string()));
        }

        if arguments[0].to_uppercase() != "GET" {
            return Err(CommandError::SyntaxError);
        }

        Ok(Self {
            parameter: arguments[1].to_lowercase(),
        })
    }
}

/// Reports `dir` and `dbfilename` verbatim as `[param, value]`; unknown
/// parameters answer with an empty value.
pub fn config_get(
    info: &ServerInfo,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let config_arguments = ConfigGetArguments::parse(arguments)?;

    let value = match config_arguments.parameter.as_str() {
        "dir" => info.dir.clone().unwrap_or_default(),
        "dbfilename" => info.dbfilename.clone().unwrap_or_default(),
        _ => String::new(),
    };

    Ok(CommandResult::Response(
        RespValue::encode_array_from_strings([config_arguments.parameter, value]),
    ))
}
