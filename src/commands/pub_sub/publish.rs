use std::sync::Arc;

use crate::commands::{CommandError, CommandResult};
use crate::connection::write_to_stream;
use crate::resp::RespValue;
use crate::server::ServerContext;

#[derive(Debug, PartialEq)]
pub struct PublishArguments {
    channel: String,
    message: String,
}

impl PublishArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("PUBLISH".to_string()));
        }

        Ok(Self {
            channel: arguments[0].clone(),
            message: arguments[1].clone(),
        })
    }
}

/// Fans the message out to every subscriber of the channel and reports how
/// many deliveries succeeded. The writer handles are cloned out of the
/// channel table first so the sends happen without the table lock.
pub async fn publish(
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let publish_arguments = PublishArguments::parse(arguments)?;

    let writers = {
        let pub_sub = context.pub_sub.lock().await;
        pub_sub.subscribers(&publish_arguments.channel)
    };

    let frame = RespValue::Array(vec![
        RespValue::BulkString("message".to_string()),
        RespValue::BulkString(publish_arguments.channel),
        RespValue::BulkString(publish_arguments.message),
    ])
    .encode();

    let mut delivered = 0;

    for writer in writers {
        if write_to_stream(&writer, frame.as_bytes()).await.is_ok() {
            delivered += 1;
        }
    }

    Ok(CommandResult::Response(
        RespValue::Integer(delivered).encode(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert!(PublishArguments::parse(vec!["ch".to_string(), "msg".to_string()]).is_ok());
        assert_eq!(
            PublishArguments::parse(vec!["ch".to_string()]),
            Err(CommandError::WrongNumberOfArguments("PUBLISH".to_string()))
        );
    }
}
