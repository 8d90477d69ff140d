use crate::commands::zset_utils::{live_sorted_set, sorted_members};
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct ZrankArguments {
    key: String,
    member: String,
}

impl ZrankArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 2 {
            return Err(CommandError::WrongNumberOfArguments("ZRANK".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            member: arguments[1].clone(),
        })
    }
}

/// Zero-based position of the member in `(score, member-lex)` order; null
/// for a missing member or key.
pub fn zrank(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let zrank_arguments = ZrankArguments::parse(arguments)?;

    let Some(set) = live_sorted_set(store, &zrank_arguments.key)? else {
        return Ok(CommandResult::Response(RespValue::NullBulkString.encode()));
    };

    let rank = sorted_members(set)
        .iter()
        .position(|(member, _)| *member == zrank_arguments.member);

    let response = match rank {
        Some(rank) => RespValue::Integer(rank as i64).encode(),
        None => RespValue::NullBulkString.encode(),
    };

    Ok(CommandResult::Response(response))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::key_value_store::{DataType, Value};

    use super::*;

    #[test]
    fn test_zrank() {
        let mut store = KeyValueStore::new();
        store.insert(
            "z".to_string(),
            Value::new(DataType::SortedSet(HashMap::from([
                ("alice".to_string(), 2.0),
                ("bob".to_string(), 1.0),
                ("carol".to_string(), 2.0),
            ]))),
        );

        let test_cases = vec![
            ("bob", ":0\r\n"),
            // Equal scores fall back to member order.
            ("alice", ":1\r\n"),
            ("carol", ":2\r\n"),
            ("absent", "$-1\r\n"),
        ];

        for (member, expected) in test_cases {
            assert_eq!(
                zrank(&mut store, vec!["z".to_string(), member.to_string()]).unwrap(),
                CommandResult::Response(expected.to_string()),
                "member: {}",
                member
            );
        }

        assert_eq!(
            zrank(&mut store, vec!["missing".to_string(), "m".to_string()]).unwrap(),
            CommandResult::Response("$-1\r\n".to_string())
        );
    }
}
