use std::sync::Arc;

use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::ServerContext;

#[derive(Debug, PartialEq)]
pub struct ReplconfArguments {
    subcommand: String,
    values: Vec<String>,
}

impl ReplconfArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 2 {
            return Err(CommandError::WrongNumberOfArguments("REPLCONF".to_string()));
        }

        Ok(Self {
            subcommand: arguments[0].to_uppercase(),
            values: arguments[1..].to_vec(),
        })
    }
}

/// Handshake options (`listening-port`, `capa`) are acknowledged with OK;
/// `ACK <offset>` updates the sender's recorded offset and wakes any WAIT
/// callers, with no reply on the wire.
pub async fn replconf(
    client_address: &str,
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let replconf_arguments = ReplconfArguments::parse(arguments)?;

    match replconf_arguments.subcommand.as_str() {
        "ACK" => {
            let offset = replconf_arguments
                .values
                .first()
                .and_then(|raw| raw.parse::<usize>().ok())
                .ok_or(CommandError::NotAnInteger)?;

            {
                let mut registry = context.replicas.lock().await;
                registry.record_ack(client_address, offset);
            }

            context.ack_notify.notify_waiters();

            Ok(CommandResult::NoResponse)
        }
        "LISTENING-PORT" | "CAPA" => Ok(CommandResult::Response(
            RespValue::SimpleString("OK".to_string()).encode(),
        )),
        _ => Err(CommandError::SyntaxError),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let parsed = ReplconfArguments::parse(vec![
            "listening-port".to_string(),
            "6380".to_string(),
        ])
        .unwrap();
        assert_eq!(parsed.subcommand, "LISTENING-PORT");
        assert_eq!(parsed.values, vec!["6380".to_string()]);

        assert_eq!(
            ReplconfArguments::parse(vec!["capa".to_string()]),
            Err(CommandError::WrongNumberOfArguments("REPLCONF".to_string()))
        );
    }
}
