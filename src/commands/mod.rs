mod blpop;
mod command_dispatcher;
mod command_error;
mod command_handler;
mod config_get;
mod del;
mod echo;
mod exists;
mod get;
mod incr;
mod info;
mod keys;
mod llen;
mod lpop_and_rpop;
mod lrange;
mod ping;
mod psync;
mod pub_sub;
mod replconf;
mod rpush_and_lpush;
mod set;
mod stream_utils;
mod transactions;
mod type_command;
mod wait;
mod xadd;
mod xrange;
mod xread;
mod zadd;
mod zcard;
mod zrange;
mod zrank;
mod zrem;
mod zscore;
mod zset_utils;

pub use command_dispatcher::CommandDispatcher;
pub use command_error::CommandError;
pub use command_handler::{
    CommandHandler, CommandResult, NON_QUEUEABLE_COMMANDS, SUBSCRIBER_MODE_COMMANDS,
    WRITE_COMMANDS,
};
