//! Typed keyspace entries.
//!
//! Every key owns a [`Value`]: a kind-tagged payload plus an optional
//! expiration deadline. A kind never changes in place; overwriting a key with
//! a different kind goes through remove + insert. Expiration is lazy: any
//! access that observes a past deadline removes the entry first.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;
use std::str::FromStr;

use tokio::time::Instant;

pub type KeyValueStore = HashMap<String, Value>;

/// A stream entry id, totally ordered by `(ms, seq)`.
///
/// Ids are compared numerically; the string form `"ms-seq"` is only a wire
/// representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 1 };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let parts = input.split('-').collect::<Vec<&str>>();

        if parts.len() != 2 {
            return Err("Invalid stream ID specified as stream command argument".to_string());
        }

        let ms = parts[0]
            .parse::<u64>()
            .map_err(|_| "Invalid stream ID specified as stream command argument".to_string())?;
        let seq = parts[1]
            .parse::<u64>()
            .map_err(|_| "Invalid stream ID specified as stream command argument".to_string())?;

        Ok(StreamId { ms, seq })
    }
}

/// One stream entry: the field-value pairs in the order the client sent them.
pub type StreamFields = Vec<(String, String)>;

pub type Stream = BTreeMap<StreamId, StreamFields>;

pub type SortedSet = HashMap<String, f64>;

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    String(String),
    List(VecDeque<String>),
    Stream(Stream),
    SortedSet(SortedSet),
}

impl DataType {
    /// The name reported by TYPE.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataType::String(_) => "string",
            DataType::List(_) => "list",
            DataType::Stream(_) => "stream",
            DataType::SortedSet(_) => "zset",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    pub data: DataType,
    pub expiration: Option<Instant>,
}

impl Value {
    pub fn new(data: DataType) -> Self {
        Value {
            data,
            expiration: None,
        }
    }

    fn is_expired(&self) -> bool {
        match self.expiration {
            Some(deadline) => Instant::now() >= deadline,
            None => false,
        }
    }
}

/// Looks a key up, removing it first if its deadline has passed.
pub fn live_entry<'a>(store: &'a mut KeyValueStore, key: &str) -> Option<&'a mut Value> {
    if store.get(key).is_some_and(|value| value.is_expired()) {
        store.remove(key);
        return None;
    }

    store.get_mut(key)
}

/// Removes the key outright, reporting whether a live entry was present.
pub fn remove_live_entry(store: &mut KeyValueStore, key: &str) -> bool {
    match store.remove(key) {
        Some(value) => !value.is_expired(),
        None => false,
    }
}
