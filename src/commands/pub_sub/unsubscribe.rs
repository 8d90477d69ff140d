use std::sync::Arc;

use crate::commands::{CommandError, CommandResult};
use crate::resp::RespValue;
use crate::server::ServerContext;

pub struct UnsubscribeArguments {
    channels: Vec<String>,
}

impl UnsubscribeArguments {
    /// No arguments means "leave every channel".
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        Ok(Self {
            channels: arguments,
        })
    }
}

pub async fn unsubscribe(
    client_address: &str,
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let unsubscribe_arguments = UnsubscribeArguments::parse(arguments)?;

    let mut pub_sub = context.pub_sub.lock().await;

    let channels = if unsubscribe_arguments.channels.is_empty() {
        pub_sub.subscribed_channels(client_address)
    } else {
        unsubscribe_arguments.channels
    };

    if channels.is_empty() {
        return Ok(CommandResult::Response(
            RespValue::Array(vec![
                RespValue::BulkString("unsubscribe".to_string()),
                RespValue::BulkString(String::new()),
                RespValue::Integer(0),
            ])
            .encode(),
        ));
    }

    let mut response = String::new();

    for channel in channels {
        let remaining = pub_sub.unsubscribe(client_address, &channel);

        response.push_str(
            &RespValue::Array(vec![
                RespValue::BulkString("unsubscribe".to_string()),
                RespValue::BulkString(channel),
                RespValue::Integer(remaining as i64),
            ])
            .encode(),
        );
    }

    Ok(CommandResult::Response(response))
}
