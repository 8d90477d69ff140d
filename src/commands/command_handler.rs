use crate::commands::pub_sub::{PublishArguments, SubscribeArguments, UnsubscribeArguments};
use crate::commands::transactions::{DiscardArguments, ExecArguments, MultiArguments};
use crate::commands::{
    blpop, config_get, del, echo, exists, get, incr, keys, llen, lpop_and_rpop, lrange, ping,
    psync, replconf, rpush_and_lpush, set, type_command, wait, xadd, xrange, xread, zadd, zcard,
    zrange, zrank, zrem, zscore, CommandError,
};
use crate::key_value_store::KeyValueStore;
use crate::resp::RespValue;
use crate::server::ServerInfo;

/// Commands that mutate the keyspace; rejected from ordinary clients on a
/// replica and propagated to replicas on a master.
pub const WRITE_COMMANDS: &[&str] = &[
    "SET", "DEL", "INCR", "INCRBY", "RPUSH", "LPUSH", "LPOP", "RPOP", "BLPOP", "XADD", "ZADD",
    "ZREM",
];

/// The only commands accepted while a connection is in subscriber mode.
pub const SUBSCRIBER_MODE_COMMANDS: &[&str] = &["SUBSCRIBE", "UNSUBSCRIBE", "PING", "QUIT"];

/// Commands that make no sense inside a MULTI queue; trying to queue one is
/// a queue-time error.
pub const NON_QUEUEABLE_COMMANDS: &[&str] = &["SUBSCRIBE", "UNSUBSCRIBE", "PSYNC", "REPLCONF"];

/// What dispatching a command produced.
#[derive(Debug, PartialEq)]
pub enum CommandResult {
    /// RESP bytes to send back.
    Response(String),
    /// Nothing goes on the wire (replication ACKs).
    NoResponse,
    /// A FULLRESYNC header; the connection follows up with the snapshot and
    /// registers the peer as a replica.
    Sync(String),
    /// Final reply before the server closes the connection.
    CloseConnection(String),
}

/// A client request parsed into a command name and its arguments.
///
/// The original RESP array is kept alongside: masters re-encode it verbatim
/// when propagating writes to replicas.
#[derive(Debug, PartialEq, Clone)]
pub struct CommandHandler {
    pub name: String,
    pub arguments: Vec<String>,
    pub input: RespValue,
}

impl CommandHandler {
    /// Parses a RESP array of bulk strings into a command. Anything else is
    /// not a valid request frame.
    pub fn new(input: &RespValue) -> Result<Self, CommandError> {
        let RespValue::Array(elements) = input else {
            return Err(CommandError::UnknownCommand("".to_string()));
        };

        let name = match elements.first() {
            Some(RespValue::BulkString(s)) => s.to_uppercase(),
            _ => return Err(CommandError::UnknownCommand("".to_string())),
        };

        let mut arguments = Vec::with_capacity(elements.len().saturating_sub(1));

        for element in &elements[1..] {
            let RespValue::BulkString(argument) = element else {
                return Err(CommandError::UnknownCommand(name));
            };

            arguments.push(argument.clone());
        }

        Ok(Self {
            name,
            arguments,
            input: input.clone(),
        })
    }

    pub fn is_write_command(&self) -> bool {
        WRITE_COMMANDS.contains(&self.name.as_str())
    }

    /// The key a push or stream append targets; used for waiter wakeups.
    pub fn first_key(&self) -> Option<&str> {
        self.arguments.first().map(|key| key.as_str())
    }

    /// Validates arity and option syntax without executing, for queue-time
    /// checks inside MULTI.
    pub fn validate_arguments(&self) -> Option<CommandError> {
        let arguments = self.arguments.clone();

        match self.name.as_str() {
            "PING" => ping::PingArguments::parse(arguments).err(),
            "ECHO" => echo::EchoArguments::parse(arguments).err(),
            "GET" => get::GetArguments::parse(arguments).err(),
            "SET" => set::SetArguments::parse(arguments).err(),
            "DEL" => del::DelArguments::parse(arguments).err(),
            "EXISTS" => exists::ExistsArguments::parse(arguments).err(),
            "TYPE" => type_command::TypeArguments::parse(arguments).err(),
            "KEYS" => keys::KeysArguments::parse(arguments).err(),
            "CONFIG" => config_get::ConfigGetArguments::parse(arguments).err(),
            "INCR" => incr::IncrArguments::parse(arguments, false).err(),
            "INCRBY" => incr::IncrArguments::parse(arguments, true).err(),
            "RPUSH" => rpush_and_lpush::PushArguments::parse(arguments, false).err(),
            "LPUSH" => rpush_and_lpush::PushArguments::parse(arguments, true).err(),
            "LPOP" => lpop_and_rpop::PopArguments::parse(arguments, false).err(),
            "RPOP" => lpop_and_rpop::PopArguments::parse(arguments, true).err(),
            "LLEN" => llen::LlenArguments::parse(arguments).err(),
            "LRANGE" => lrange::LrangeArguments::parse(arguments).err(),
            "BLPOP" => blpop::BlpopArguments::parse(arguments).err(),
            "XADD" => xadd::XaddArguments::parse(arguments).err(),
            "XRANGE" => xrange::XrangeArguments::parse(arguments).err(),
            "XREAD" => xread::XreadArguments::parse(arguments).err(),
            "ZADD" => zadd::ZaddArguments::parse(arguments).err(),
            "ZRANK" => zrank::ZrankArguments::parse(arguments).err(),
            "ZRANGE" => zrange::ZrangeArguments::parse(arguments).err(),
            "ZSCORE" => zscore::ZscoreArguments::parse(arguments).err(),
            "ZCARD" => zcard::ZcardArguments::parse(arguments).err(),
            "ZREM" => zrem::ZremArguments::parse(arguments).err(),
            "MULTI" => MultiArguments::parse(arguments).err(),
            "EXEC" => ExecArguments::parse(arguments).err(),
            "DISCARD" => DiscardArguments::parse(arguments).err(),
            "SUBSCRIBE" => SubscribeArguments::parse(arguments).err(),
            "UNSUBSCRIBE" => UnsubscribeArguments::parse(arguments).err(),
            "PUBLISH" => PublishArguments::parse(arguments).err(),
            "INFO" => crate::commands::info::InfoArguments::parse(arguments).err(),
            "REPLCONF" => replconf::ReplconfArguments::parse(arguments).err(),
            "PSYNC" => psync::PsyncArguments::parse(arguments).err(),
            "WAIT" => wait::WaitArguments::parse(arguments).err(),
            "QUIT" => None,
            _ => Some(CommandError::UnknownCommand(self.name.clone())),
        }
    }

    /// Executes a keyspace-only command against the locked store.
    ///
    /// This is the single routing table shared by the normal dispatch path,
    /// the EXEC batch executor (which holds the store lock across the whole
    /// batch) and the replica's silent application of the master stream.
    /// Blocking commands run in their immediate forms here; the dispatcher
    /// intercepts them before this point on the normal path.
    pub fn execute_on_keyspace(
        &self,
        store: &mut KeyValueStore,
        info: &ServerInfo,
    ) -> Result<CommandResult, CommandError> {
        let arguments = self.arguments.clone();

        match self.name.as_str() {
            "PING" => ping::ping(arguments),
            "ECHO" => echo::echo(arguments),
            "GET" => get::get(store, arguments),
            "SET" => set::set(store, arguments),
            "DEL" => del::del(store, arguments),
            "EXISTS" => exists::exists(store, arguments),
            "TYPE" => type_command::type_command(store, arguments),
            "KEYS" => keys::keys(store, arguments),
            "CONFIG" => config_get::config_get(info, arguments),
            "INCR" => incr::incr(store, arguments),
            "INCRBY" => incr::incrby(store, arguments),
            "RPUSH" => rpush_and_lpush::rpush(store, arguments),
            "LPUSH" => rpush_and_lpush::lpush(store, arguments),
            "LPOP" => lpop_and_rpop::lpop(store, arguments),
            "RPOP" => lpop_and_rpop::rpop(store, arguments),
            "LLEN" => llen::llen(store, arguments),
            "LRANGE" => lrange::lrange(store, arguments),
            "BLPOP" => blpop::blpop_immediate(store, arguments),
            "XADD" => xadd::xadd(store, arguments),
            "XRANGE" => xrange::xrange(store, arguments),
            "XREAD" => xread::xread_immediate(store, arguments),
            "ZADD" => zadd::zadd(store, arguments),
            "ZRANK" => zrank::zrank(store, arguments),
            "ZRANGE" => zrange::zrange(store, arguments),
            "ZSCORE" => zscore::zscore(store, arguments),
            "ZCARD" => zcard::zcard(store, arguments),
            "ZREM" => zrem::zrem(store, arguments),
            _ => Err(CommandError::UnknownCommand(self.name.clone())),
        }
    }
}
