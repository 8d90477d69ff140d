use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, KeyValueStore};
use crate::resp::RespValue;

pub struct ExistsArguments {
    key: String,
}

impl ExistsArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("EXISTS".to_string()));
        }

        Ok(Self {
            key: arguments.remove(0),
        })
    }
}

pub fn exists(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let exists_arguments = ExistsArguments::parse(arguments)?;

    let found = live_entry(store, &exists_arguments.key).is_some();

    Ok(CommandResult::Response(
        RespValue::Integer(found as i64).encode(),
    ))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::time::Instant;

    use crate::key_value_store::{DataType, Value};

    use super::*;

    #[test]
    fn test_exists() {
        let mut store = KeyValueStore::new();
        store.insert("here".to_string(), Value::new(DataType::String("v".to_string())));

        assert_eq!(
            exists(&mut store, vec!["here".to_string()]).unwrap(),
            CommandResult::Response(":1\r\n".to_string())
        );
        assert_eq!(
            exists(&mut store, vec!["absent".to_string()]).unwrap(),
            CommandResult::Response(":0\r\n".to_string())
        );
    }

    #[tokio::test]
    async fn test_exists_expired_key_reports_zero() {
        let mut store = KeyValueStore::new();
        store.insert(
            "stale".to_string(),
            Value {
                data: DataType::String("v".to_string()),
                expiration: Some(Instant::now() - Duration::from_millis(1)),
            },
        );

        assert_eq!(
            exists(&mut store, vec!["stale".to_string()]).unwrap(),
            CommandResult::Response(":0\r\n".to_string())
        );
        assert!(store.is_empty());
    }
}
