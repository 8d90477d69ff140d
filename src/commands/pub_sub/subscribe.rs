use std::sync::Arc;

use crate::commands::{CommandError, CommandResult};
use crate::connection::SharedWriter;
use crate::resp::RespValue;
use crate::server::ServerContext;

#[derive(Debug, PartialEq)]
pub struct SubscribeArguments {
    channels: Vec<String>,
}

impl SubscribeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.is_empty() {
            return Err(CommandError::WrongNumberOfArguments("SUBSCRIBE".to_string()));
        }

        Ok(Self {
            channels: arguments,
        })
    }
}

/// Joins each channel in turn; every channel gets its own
/// `[subscribe, channel, count]` confirmation frame.
pub async fn subscribe(
    client_address: &str,
    writer: &SharedWriter,
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let subscribe_arguments = SubscribeArguments::parse(arguments)?;

    let mut pub_sub = context.pub_sub.lock().await;
    let mut response = String::new();

    for channel in subscribe_arguments.channels {
        let count = pub_sub.subscribe(client_address, &channel, Arc::clone(writer));

        response.push_str(
            &RespValue::Array(vec![
                RespValue::BulkString("subscribe".to_string()),
                RespValue::BulkString(channel),
                RespValue::Integer(count as i64),
            ])
            .encode(),
        );
    }

    Ok(CommandResult::Response(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_requires_a_channel() {
        assert!(SubscribeArguments::parse(vec!["news".to_string()]).is_ok());
        assert_eq!(
            SubscribeArguments::parse(vec![]),
            Err(CommandError::WrongNumberOfArguments("SUBSCRIBE".to_string()))
        );
    }
}
