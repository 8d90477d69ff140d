//! Shared stream id parsing and entry encoding.

use crate::commands::CommandError;
use crate::key_value_store::{Stream, StreamFields, StreamId};
use crate::resp::RespValue;

/// An id as written in XADD: fully explicit, an auto sequence for a fixed
/// millisecond, or fully auto.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum IdSpec {
    Auto,
    AutoSeq(u64),
    Explicit(StreamId),
}

pub fn parse_id_spec(input: &str) -> Result<IdSpec, CommandError> {
    if input == "*" {
        return Ok(IdSpec::Auto);
    }

    if let Some(ms_part) = input.strip_suffix("-*") {
        let ms = ms_part
            .parse::<u64>()
            .map_err(|_| CommandError::InvalidStreamId)?;

        return Ok(IdSpec::AutoSeq(ms));
    }

    input
        .parse::<StreamId>()
        .map(IdSpec::Explicit)
        .map_err(|_| CommandError::InvalidStreamId)
}

/// Resolves an id spec against the current top of the stream, enforcing the
/// strict ordering rules.
///
/// - `*`: ms is the larger of wall-clock time and the top ms; the sequence
///   continues within the same millisecond and restarts at zero otherwise.
/// - `ms-*`: same sequence rule for a caller-chosen millisecond; a
///   millisecond behind the top is rejected.
/// - explicit ids must be strictly greater than the top, and `0-0` is never
///   legal.
pub fn resolve_id(stream: &Stream, spec: IdSpec, now_ms: u64) -> Result<StreamId, CommandError> {
    let top = stream.keys().next_back().copied().unwrap_or(StreamId::new(0, 0));

    match spec {
        IdSpec::Auto => {
            let ms = now_ms.max(top.ms);
            let seq = if ms == top.ms { top.seq + 1 } else { 0 };

            Ok(StreamId::new(ms, seq))
        }
        IdSpec::AutoSeq(ms) => {
            if ms < top.ms {
                return Err(CommandError::StreamIdTooSmall);
            }

            let seq = if ms == top.ms { top.seq + 1 } else { 0 };

            Ok(StreamId::new(ms, seq))
        }
        IdSpec::Explicit(id) => {
            if id == StreamId::new(0, 0) {
                return Err(CommandError::StreamIdZero);
            }

            if id <= top && !stream.is_empty() {
                return Err(CommandError::StreamIdTooSmall);
            }

            Ok(id)
        }
    }
}

/// A bound of an XRANGE query. Partial ids expand towards the bound's side:
/// a bare `ms` start becomes `(ms, 0)`, a bare `ms` end becomes `(ms, max)`.
#[derive(Debug, PartialEq, Clone, Copy)]
pub enum RangeBound {
    Min,
    Max,
    Id(StreamId),
}

impl RangeBound {
    pub fn as_id(&self) -> StreamId {
        match self {
            RangeBound::Min => StreamId::new(0, 0),
            RangeBound::Max => StreamId::new(u64::MAX, u64::MAX),
            RangeBound::Id(id) => *id,
        }
    }
}

pub fn parse_range_bound(input: &str, is_end: bool) -> Result<RangeBound, CommandError> {
    match input {
        "-" => Ok(RangeBound::Min),
        "+" => Ok(RangeBound::Max),
        _ => {
            if let Ok(ms) = input.parse::<u64>() {
                let id = if is_end {
                    StreamId::new(ms, u64::MAX)
                } else {
                    StreamId::new(ms, 0)
                };
                return Ok(RangeBound::Id(id));
            }

            input
                .parse::<StreamId>()
                .map(RangeBound::Id)
                .map_err(|_| CommandError::InvalidStreamId)
        }
    }
}

/// An XREAD cursor: `$` resolves to the stream's top id at call time.
pub fn parse_cursor(input: &str, top: StreamId) -> Result<StreamId, CommandError> {
    if input == "$" {
        return Ok(top);
    }

    if let Ok(ms) = input.parse::<u64>() {
        return Ok(StreamId::new(ms, 0));
    }

    input
        .parse::<StreamId>()
        .map_err(|_| CommandError::InvalidStreamId)
}

/// Encodes entries as the nested `[id, [field, value, ...]]` arrays used by
/// XRANGE and XREAD replies.
pub fn encode_stream_entries<'a, I>(entries: I) -> RespValue
where
    I: IntoIterator<Item = (&'a StreamId, &'a StreamFields)>,
{
    let encoded = entries
        .into_iter()
        .map(|(id, fields)| {
            let mut flat = Vec::with_capacity(fields.len() * 2);

            for (name, value) in fields {
                flat.push(RespValue::BulkString(name.clone()));
                flat.push(RespValue::BulkString(value.clone()));
            }

            RespValue::Array(vec![
                RespValue::BulkString(id.to_string()),
                RespValue::Array(flat),
            ])
        })
        .collect();

    RespValue::Array(encoded)
}
