use thiserror::Error;

use crate::resp::RespValue;
use crate::state::StateError;

/// Everything a command can fail with.
///
/// Each variant renders to the exact RESP error frame a client expects; the
/// uppercase tag at the front of the message (`ERR`, `WRONGTYPE`,
/// `EXECABORT`) is part of the wire contract.
#[derive(Error, Debug, PartialEq)]
pub enum CommandError {
    #[error("unknown command '{0}'")]
    UnknownCommand(String),
    #[error("wrong number of arguments for '{0}' command")]
    WrongNumberOfArguments(String),
    #[error("syntax error")]
    SyntaxError,
    #[error("operation against a key holding the wrong kind of value")]
    WrongType,
    #[error("value is not an integer or out of range")]
    NotAnInteger,
    #[error("value is not a valid float")]
    NotAFloat,
    #[error("timeout is not a float or out of range")]
    InvalidTimeout,
    #[error("invalid stream ID")]
    InvalidStreamId,
    #[error("stream ID equal or smaller than top item")]
    StreamIdTooSmall,
    #[error("stream ID must be greater than 0-0")]
    StreamIdZero,
    #[error("MULTI nested")]
    MultiNested,
    #[error("EXEC without MULTI")]
    ExecWithoutMulti,
    #[error("DISCARD without MULTI")]
    DiscardWithoutMulti,
    #[error("transaction aborted")]
    TransactionAborted,
    #[error("command '{0}' not allowed while subscribed")]
    SubscriberModeRestricted(String),
    #[error("write command on a read only replica")]
    ReplicaReadOnly,
    #[error("invalid glob pattern: {0}")]
    InvalidGlobPattern(String),
    #[error("invalid PSYNC replication ID")]
    InvalidPsyncReplicationId,
    #[error("invalid PSYNC offset")]
    InvalidPsyncOffset,
    #[error("WAIT is only available on a master")]
    WaitOnReplica,
    #[error("transaction state error")]
    State(#[from] StateError),
}

impl CommandError {
    /// The RESP error frame sent to the client.
    pub fn as_string(&self) -> String {
        let message = match self {
            CommandError::UnknownCommand(name) => {
                format!("ERR unknown command '{}'", name)
            }
            CommandError::WrongNumberOfArguments(name) => {
                format!(
                    "ERR wrong number of arguments for '{}' command",
                    name.to_lowercase()
                )
            }
            CommandError::SyntaxError => "ERR syntax error".to_string(),
            CommandError::WrongType => {
                "WRONGTYPE Operation against a key holding the wrong kind of value".to_string()
            }
            CommandError::NotAnInteger => {
                "ERR value is not an integer or out of range".to_string()
            }
            CommandError::NotAFloat => "ERR value is not a valid float".to_string(),
            CommandError::InvalidTimeout => {
                "ERR timeout is not a float or out of range".to_string()
            }
            CommandError::InvalidStreamId => {
                "ERR Invalid stream ID specified as stream command argument".to_string()
            }
            CommandError::StreamIdTooSmall => {
                "ERR The ID specified in XADD is equal or smaller than the target stream top item"
                    .to_string()
            }
            CommandError::StreamIdZero => {
                "ERR The ID specified in XADD must be greater than 0-0".to_string()
            }
            CommandError::MultiNested => "ERR MULTI calls can not be nested".to_string(),
            CommandError::ExecWithoutMulti => "ERR EXEC without MULTI".to_string(),
            CommandError::DiscardWithoutMulti => "ERR DISCARD without MULTI".to_string(),
            CommandError::TransactionAborted => {
                "EXECABORT Transaction discarded because of previous errors.".to_string()
            }
            CommandError::SubscriberModeRestricted(name) => {
                format!(
                    "ERR Can't execute '{}': only (P)SUBSCRIBE / (P)UNSUBSCRIBE / PING / QUIT are allowed in this context",
                    name.to_lowercase()
                )
            }
            CommandError::ReplicaReadOnly => {
                "READONLY You can't write against a read only replica.".to_string()
            }
            CommandError::InvalidGlobPattern(pattern) => {
                format!("ERR invalid pattern: {}", pattern)
            }
            CommandError::InvalidPsyncReplicationId => {
                "ERR invalid PSYNC replication ID".to_string()
            }
            CommandError::InvalidPsyncOffset => "ERR invalid PSYNC offset".to_string(),
            CommandError::WaitOnReplica => {
                "ERR WAIT is only available on a master instance".to_string()
            }
            CommandError::State(StateError::TransactionAlreadyStarted) => {
                "ERR MULTI calls can not be nested".to_string()
            }
            CommandError::State(StateError::TransactionNotStarted) => {
                "ERR EXEC without MULTI".to_string()
            }
        };

        RespValue::Error(message).encode()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_messages() {
        let test_cases = vec![
            (
                CommandError::UnknownCommand("FOO".to_string()),
                "-ERR unknown command 'FOO'\r\n",
            ),
            (
                CommandError::WrongNumberOfArguments("GET".to_string()),
                "-ERR wrong number of arguments for 'get' command\r\n",
            ),
            (CommandError::SyntaxError, "-ERR syntax error\r\n"),
            (
                CommandError::WrongType,
                "-WRONGTYPE Operation against a key holding the wrong kind of value\r\n",
            ),
            (
                CommandError::NotAnInteger,
                "-ERR value is not an integer or out of range\r\n",
            ),
            (
                CommandError::StreamIdTooSmall,
                "-ERR The ID specified in XADD is equal or smaller than the target stream top item\r\n",
            ),
            (
                CommandError::StreamIdZero,
                "-ERR The ID specified in XADD must be greater than 0-0\r\n",
            ),
            (
                CommandError::MultiNested,
                "-ERR MULTI calls can not be nested\r\n",
            ),
            (
                CommandError::ExecWithoutMulti,
                "-ERR EXEC without MULTI\r\n",
            ),
            (
                CommandError::DiscardWithoutMulti,
                "-ERR DISCARD without MULTI\r\n",
            ),
            (
                CommandError::TransactionAborted,
                "-EXECABORT Transaction discarded because of previous errors.\r\n",
            ),
            (
                CommandError::ReplicaReadOnly,
                "-READONLY You can't write against a read only replica.\r\n",
            ),
        ];

        for (error, expected) in test_cases {
            assert_eq!(error.as_string(), expected);
        }
    }

    #[test]
    fn test_subscriber_mode_message_names_the_command() {
        let error = CommandError::SubscriberModeRestricted("GET".to_string());
        assert!(error.as_string().contains("'get'"));
        assert!(error.as_string().starts_with("-ERR Can't execute"));
    }
}
