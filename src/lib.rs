//! kestrel: an in-memory data server speaking RESP over TCP.
//!
//! Supported functionality:
//!
//! - String keys with lazy TTL expiration (GET, SET, DEL, EXISTS, INCR)
//! - Lists with blocking reads (LPUSH, RPUSH, LPOP, RPOP, LRANGE, BLPOP)
//! - Streams with auto-generated ids and blocking tail reads (XADD,
//!   XRANGE, XREAD)
//! - Sorted sets ordered by `(score, member)` (ZADD, ZRANK, ZRANGE, ...)
//! - Transactions (MULTI, EXEC, DISCARD) executed as atomic batches
//! - Publish/subscribe channels
//! - Master–replica replication with byte-exact offset tracking and WAIT
//!
//! Concurrency follows one task per connection on Tokio, with the keyspace
//! behind a single mutex and strictly ordered auxiliary locks for the
//! blocking coordinator, the pub/sub table and the replica registry.

pub mod commands;
pub mod connection;
pub mod key_value_store;
pub mod pubsub;
pub mod rdb;
pub mod replication;
pub mod resp;
pub mod server;
pub mod state;
