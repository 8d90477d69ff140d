use jiff::Timestamp;

use crate::commands::stream_utils::{parse_id_spec, resolve_id, IdSpec};
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore, Stream, Value};
use crate::resp::RespValue;

pub struct XaddArguments {
    key: String,
    id: IdSpec,
    fields: Vec<(String, String)>,
}

impl XaddArguments {
    /// `XADD key id field value [field value ...]`.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() < 4 || arguments[2..].len() % 2 != 0 {
            return Err(CommandError::WrongNumberOfArguments("XADD".to_string()));
        }

        let id = parse_id_spec(&arguments[1])?;

        Ok(Self {
            key: arguments[0].clone(),
            id,
            fields: arguments[2..]
                .chunks(2)
                .map(|chunk| (chunk[0].clone(), chunk[1].clone()))
                .collect(),
        })
    }
}

/// Appends an entry, resolving auto-generated ids against the stream's top
/// and the wall clock. The dispatcher wakes parked XREAD waiters after the
/// append commits.
pub fn xadd(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xadd_arguments = XaddArguments::parse(arguments)?;
    let now_ms = Timestamp::now().as_millisecond().max(0) as u64;

    let id = match live_entry(store, &xadd_arguments.key) {
        Some(value) => {
            let DataType::Stream(ref mut stream) = value.data else {
                return Err(CommandError::WrongType);
            };

            let id = resolve_id(stream, xadd_arguments.id, now_ms)?;
            stream.insert(id, xadd_arguments.fields);
            id
        }
        None => {
            let mut stream = Stream::new();
            let id = resolve_id(&stream, xadd_arguments.id, now_ms)?;
            stream.insert(id, xadd_arguments.fields);
            store.insert(xadd_arguments.key, Value::new(DataType::Stream(stream)));
            id
        }
    };

    Ok(CommandResult::Response(
        RespValue::BulkString(id.to_string()).encode(),
    ))
}
