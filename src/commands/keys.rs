use globset::Glob;

use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;

pub struct KeysArguments {
    pattern: String,
}

impl KeysArguments {
    pub fn parse(mut arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 1 {
            return Err(CommandError::WrongNumberOfArguments("KEYS".to_string()));
        }

        Ok(Self {
            pattern: arguments.remove(0),
        })
    }
}

/// Glob-matches live keys: `*`, `?` and `[set]` are supported. Enumeration
/// order is unspecified.
pub fn keys(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let keys_arguments = KeysArguments::parse(arguments)?;

    let matcher = Glob::new(&keys_arguments.pattern)
        .map_err(|e| CommandError::InvalidGlobPattern(e.to_string()))?
        .compile_matcher();

    let mut matched = Vec::new();

    for key in store.keys() {
        if matcher.is_match(key) {
            matched.push(RespValue::BulkString(key.clone()));
        }
    }

    Ok(CommandResult::Response(RespValue::Array(matched).encode()))
}
