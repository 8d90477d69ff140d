use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;

use crate::commands::{CommandError, CommandResult};
use crate::replication::getack_frame;
use crate::resp::RespValue;
use crate::server::{ServerContext, ServerRole};

#[derive(Debug, PartialEq)]
pub struct WaitArguments {
    pub required_replicas: usize,
    pub timeout: Option<Duration>,
}

impl WaitArguments {
    /// `WAIT numreplicas timeout_ms`; a zero timeout waits forever.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("WAIT".to_string()));
        }

        let required_replicas = arguments[0]
            .parse::<usize>()
            .map_err(|_| CommandError::NotAnInteger)?;
        let timeout_ms = arguments[1]
            .parse::<u64>()
            .map_err(|_| CommandError::NotAnInteger)?;

        Ok(Self {
            required_replicas,
            timeout: match timeout_ms {
                0 => None,
                _ => Some(Duration::from_millis(timeout_ms)),
            },
        })
    }
}

/// Blocks until enough replicas have acknowledged the current offset or the
/// timeout passes, answering with the count actually achieved.
///
/// A GETACK probe goes out first so replicas that are idle still report
/// their position; each incoming ACK rings `ack_notify`.
pub async fn wait(
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let wait_arguments = WaitArguments::parse(arguments)?;

    if context.role().await != ServerRole::Master {
        return Err(CommandError::WaitOnReplica);
    }

    let target = {
        let registry = context.replicas.lock().await;
        let target = registry.repl_offset();

        let acknowledged = registry.acknowledged_count(target);
        if acknowledged >= wait_arguments.required_replicas
            || registry.replica_count() == 0
        {
            return Ok(CommandResult::Response(
                RespValue::Integer(acknowledged.min(registry.replica_count()) as i64).encode(),
            ));
        }

        registry.broadcast(getack_frame().as_bytes());
        target
    };

    let deadline = wait_arguments.timeout.map(|timeout| Instant::now() + timeout);

    loop {
        let notified = context.ack_notify.notified();
        tokio::pin!(notified);
        notified.as_mut().enable();

        let acknowledged = {
            let registry = context.replicas.lock().await;
            registry.acknowledged_count(target)
        };

        if acknowledged >= wait_arguments.required_replicas {
            return Ok(CommandResult::Response(
                RespValue::Integer(acknowledged as i64).encode(),
            ));
        }

        match deadline {
            None => notified.await,
            Some(deadline) => {
                if tokio::time::timeout_at(deadline, notified).await.is_err() {
                    let registry = context.replicas.lock().await;

                    return Ok(CommandResult::Response(
                        RespValue::Integer(registry.acknowledged_count(target) as i64).encode(),
                    ));
                }
            }
        }
    }
}

/// Immediate form used inside transactions: reports the ack count for the
/// current offset without blocking or probing.
pub async fn wait_immediate(
    context: &Arc<ServerContext>,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let _ = WaitArguments::parse(arguments)?;

    let registry = context.replicas.lock().await;
    let acknowledged = registry.acknowledged_count(registry.repl_offset());

    Ok(CommandResult::Response(
        RespValue::Integer(acknowledged as i64).encode(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        let parsed = WaitArguments::parse(vec!["2".to_string(), "500".to_string()]).unwrap();
        assert_eq!(parsed.required_replicas, 2);
        assert_eq!(parsed.timeout, Some(Duration::from_millis(500)));

        let parsed = WaitArguments::parse(vec!["0".to_string(), "0".to_string()]).unwrap();
        assert_eq!(parsed.timeout, None, "zero timeout means wait forever");

        assert_eq!(
            WaitArguments::parse(vec!["2".to_string()]),
            Err(CommandError::WrongNumberOfArguments("WAIT".to_string()))
        );
        assert_eq!(
            WaitArguments::parse(vec!["x".to_string(), "0".to_string()]),
            Err(CommandError::NotAnInteger)
        );
    }
}
