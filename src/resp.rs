//! RESP wire codec.
//!
//! The decoder is incremental: it reads one complete frame from the front of
//! a [`BytesMut`] buffer and reports how many bytes it consumed, or returns
//! `None` when the buffer ends mid-frame so the caller can keep the bytes and
//! read more from the socket. The consumed length is byte-exact because the
//! replication offset is counted in serialized command bytes.

use bytes::{Buf, BytesMut};
use thiserror::Error;

/// Upper bound on a single bulk string payload (matches the 512MB Redis cap).
const MAX_BULK_LENGTH: usize = 512 * 1024 * 1024;

/// Upper bound on the element count of a single array frame.
const MAX_ARRAY_LENGTH: usize = 1024 * 1024;

#[derive(Error, Debug, PartialEq)]
pub enum RespError {
    #[error("invalid UTF-8 sequence")]
    InvalidUtf8,
    #[error("unknown RESP type marker")]
    UnknownTypeMarker,
    #[error("failed to parse integer")]
    FailedToParseInteger,
    #[error("invalid bulk string")]
    InvalidBulkString,
    #[error("invalid array")]
    InvalidArray,
    #[error("frame exceeds maximum allowed size")]
    FrameTooLarge,
}

impl RespError {
    pub fn as_string(&self) -> String {
        RespValue::Error(format!("ERR Protocol error: {}", self)).encode()
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum RespValue {
    SimpleString(String),
    Error(String),
    Integer(i64),
    BulkString(String),
    NullBulkString,
    NullArray,
    Array(Vec<RespValue>),
}

impl RespValue {
    /// Decodes the first complete frame in `buffer`.
    ///
    /// Returns the frame and the number of bytes it occupied, after removing
    /// them from the buffer. `Ok(None)` means the frame is not complete yet
    /// and the buffer is left untouched.
    pub fn decode(buffer: &mut BytesMut) -> Result<Option<(RespValue, usize)>, RespError> {
        let Some((value, consumed)) = parse_frame(&buffer[..])? else {
            return Ok(None);
        };

        buffer.advance(consumed);

        Ok(Some((value, consumed)))
    }

    /// Decodes every complete frame currently buffered, leaving any partial
    /// trailing frame in place. Each entry carries its serialized length.
    pub fn decode_all(buffer: &mut BytesMut) -> Result<Vec<(RespValue, usize)>, RespError> {
        let mut frames = Vec::new();

        while let Some(frame) = Self::decode(buffer)? {
            frames.push(frame);
        }

        Ok(frames)
    }

    pub fn encode(&self) -> String {
        match self {
            RespValue::SimpleString(s) => format!("+{}\r\n", s),
            RespValue::Error(e) => format!("-{}\r\n", e),
            RespValue::Integer(i) => format!(":{}\r\n", i),
            RespValue::BulkString(s) => format!("${}\r\n{}\r\n", s.len(), s),
            RespValue::NullBulkString => "$-1\r\n".to_string(),
            RespValue::NullArray => "*-1\r\n".to_string(),
            RespValue::Array(elements) => {
                let mut encoded = format!("*{}\r\n", elements.len());

                for element in elements {
                    encoded.push_str(&element.encode());
                }

                encoded
            }
        }
    }

    /// Encodes a flat array of bulk strings, the shape of every client
    /// command and most multi-value replies.
    pub fn encode_array_from_strings<I, S>(values: I) -> String
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        RespValue::Array(
            values
                .into_iter()
                .map(|v| RespValue::BulkString(v.into()))
                .collect(),
        )
        .encode()
    }
}

fn parse_frame(input: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some(first) = input.first() else {
        return Ok(None);
    };

    match first {
        b'+' | b'-' | b':' => parse_line_frame(input),
        b'$' => parse_bulk_string(input),
        b'*' => parse_array(input),
        _ => Err(RespError::UnknownTypeMarker),
    }
}

/// Finds the `\r\n` terminator and returns the line body (marker excluded)
/// plus the total bytes up to and including the terminator.
fn split_line(input: &[u8]) -> Result<Option<(&str, usize)>, RespError> {
    let Some(position) = input.windows(2).position(|window| window == b"\r\n") else {
        return Ok(None);
    };

    let line = str::from_utf8(&input[1..position]).map_err(|_| RespError::InvalidUtf8)?;

    Ok(Some((line, position + 2)))
}

fn parse_line_frame(input: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some((line, consumed)) = split_line(input)? else {
        return Ok(None);
    };

    let value = match input[0] {
        b'+' => RespValue::SimpleString(line.to_string()),
        b'-' => RespValue::Error(line.to_string()),
        b':' => RespValue::Integer(
            line.parse::<i64>()
                .map_err(|_| RespError::FailedToParseInteger)?,
        ),
        _ => unreachable!(),
    };

    Ok(Some((value, consumed)))
}

fn parse_bulk_string(input: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some((header, header_length)) = split_line(input)? else {
        return Ok(None);
    };

    let declared_length = header
        .parse::<i64>()
        .map_err(|_| RespError::InvalidBulkString)?;

    if declared_length == -1 {
        return Ok(Some((RespValue::NullBulkString, header_length)));
    }

    if declared_length < 0 {
        return Err(RespError::InvalidBulkString);
    }

    let length = declared_length as usize;

    if length > MAX_BULK_LENGTH {
        return Err(RespError::FrameTooLarge);
    }

    let total = header_length + length + 2;

    if input.len() < total {
        return Ok(None);
    }

    let body = &input[header_length..header_length + length];

    if &input[header_length + length..total] != b"\r\n" {
        return Err(RespError::InvalidBulkString);
    }

    let content = str::from_utf8(body).map_err(|_| RespError::InvalidUtf8)?;

    Ok(Some((RespValue::BulkString(content.to_string()), total)))
}

fn parse_array(input: &[u8]) -> Result<Option<(RespValue, usize)>, RespError> {
    let Some((header, header_length)) = split_line(input)? else {
        return Ok(None);
    };

    let declared_count = header
        .parse::<i64>()
        .map_err(|_| RespError::InvalidArray)?;

    if declared_count == -1 {
        return Ok(Some((RespValue::NullArray, header_length)));
    }

    if declared_count < 0 {
        return Err(RespError::InvalidArray);
    }

    let count = declared_count as usize;

    if count > MAX_ARRAY_LENGTH {
        return Err(RespError::FrameTooLarge);
    }

    let mut elements = Vec::with_capacity(count);
    let mut consumed = header_length;

    for _ in 0..count {
        let Some((element, element_length)) = parse_frame(&input[consumed..])? else {
            return Ok(None);
        };

        elements.push(element);
        consumed += element_length;
    }

    Ok(Some((RespValue::Array(elements), consumed)))
}
