use std::ops::Bound;

use crate::commands::stream_utils::{encode_stream_entries, parse_range_bound, RangeBound};
use crate::commands::{CommandError, CommandResult};
use crate::key_value_store::{live_entry, DataType, KeyValueStore};
use crate::resp::RespValue;

pub struct XrangeArguments {
    key: String,
    start: RangeBound,
    end: RangeBound,
}

impl XrangeArguments {
    /// `XRANGE key start end` where `-` and `+` mean the stream's extremes.
    pub fn parse(arguments: Vec<String>) -> Result<Self, CommandError> {
        if arguments.len() != 3 {
            return Err(CommandError::WrongNumberOfArguments("XRANGE".to_string()));
        }

        Ok(Self {
            key: arguments[0].clone(),
            start: parse_range_bound(&arguments[1], false)?,
            end: parse_range_bound(&arguments[2], true)?,
        })
    }
}

pub fn xrange(
    store: &mut KeyValueStore,
    arguments: Vec<String>,
) -> Result<CommandResult, CommandError> {
    let xrange_arguments = XrangeArguments::parse(arguments)?;

    let Some(value) = live_entry(store, &xrange_arguments.key) else {
        return Ok(CommandResult::Response(
            RespValue::Array(Vec::new()).encode(),
        ));
    };

    let DataType::Stream(ref stream) = value.data else {
        return Err(CommandError::WrongType);
    };

    let start = xrange_arguments.start.as_id();
    let end = xrange_arguments.end.as_id();

    if start > end {
        return Ok(CommandResult::Response(
            RespValue::Array(Vec::new()).encode(),
        ));
    }

    let entries = stream.range((Bound::Included(start), Bound::Included(end)));

    Ok(CommandResult::Response(
        encode_stream_entries(entries).encode(),
    ))
}
