use crate::commands::zset_utils::{live_sorted_set, sorted_members};
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct ZrangeArguments {
    key: String,
    start: i64,
    stop: i64,
}

impl ZrangeArguments {
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongNumberOfArguments("ZRANGE".to_string()));
        }

        let start = arguments[1]
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?;
        let stop = arguments[2]
            .parse::<i64>()
            .map_err(|_| CommandError::NotAnInteger)?;

        Ok(Self {
            key: arguments[0].clone(),
            start,
            stop,
        })
    }
}

/// Members by rank range; negative indexes count back from the highest
/// rank, bounds clamp like LRANGE.
pub fn zrange(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let zrange_arguments = ZrangeArguments::parse(arguments)?;

    let Some(set) = live_sorted_set(store, &zrange_arguments.key)? else {
        return Ok(CommandResult::Response(
            RespValue::Array(Vec::new()).encode(),
        ));
    };

    let members = sorted_members(set);
    let length = members.len() as i64;

    let normalize = |index: i64| if index < 0 { index + length } else { index };
    let start = normalize(zrange_arguments.start).max(0);
    let stop = normalize(zrange_arguments.stop).min(length - 1);

    if start > stop || start >= length {
        return Ok(CommandResult::Response(
            RespValue::Array(Vec::new()).encode(),
        ));
    }

    let slice = members[start as usize..=stop as usize]
        .iter()
        .map(|(member, _)| member.clone());

    Ok(CommandResult::Response(
        RespValue::encode_array_from_strings(slice),
    ))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::key_value_store::{DataType, Value};

    use super::*;

    fn store_with_set() -> KeyValueStore {
        let mut store = KeyValueStore::new();
        store.insert(
            "z".to_string(),
            Value::new(DataType::SortedSet(HashMap::from([
                ("a".to_string(), 1.0),
                ("b".to_string(), 2.0),
                ("c".to_string(), 3.0),
                ("d".to_string(), 4.0),
            ]))),
        );
        store
    }

    fn run(store: &mut KeyValueStore, start: &str, stop: &str) -> String {
        match zrange(
            store,
            vec!["z".to_string(), start.to_string(), stop.to_string()],
        )
        .unwrap()
        {
            CommandResult::Response(response) => response,
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_zrange_slices() {
        let mut store = store_with_set();

        let test_cases = vec![
            ("0", "-1", "*4\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n$1\r\nd\r\n"),
            ("1", "2", "*2\r\n$1\r\nb\r\n$1\r\nc\r\n"),
            ("-2", "-1", "*2\r\n$1\r\nc\r\n$1\r\nd\r\n"),
            ("0", "100", "*4\r\n$1\r\na\r\n$1\r\nb\r\n$1\r\nc\r\n$1\r\nd\r\n"),
            ("3", "1", "*0\r\n"),
            ("10", "20", "*0\r\n"),
        ];

        for (start, stop, expected) in test_cases {
            assert_eq!(run(&mut store, start, stop), expected, "range {} {}", start, stop);
        }
    }

    #[test]
    fn test_zrange_missing_key() {
        let mut store = KeyValueStore::new();
        assert_eq!(
            zrange(
                &mut store,
                vec!["nope".to_string(), "0".to_string(), "-1".to_string()]
            )
            .unwrap(),
            CommandResult::Response("*0\r\n".to_string())
        );
    }
}
