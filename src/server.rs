//! Server configuration and lifecycle.
//!
//! Command-line flags are parsed into a [`ServerConfig`]; the running server
//! owns a single [`ServerContext`] that every connection task receives by
//! shared reference. The context holds the keyspace, the blocking
//! coordinator, the pub/sub table and the replica registry, each behind its
//! own lock (acquired keyspace-first, see the module docs of `state`).

use std::collections::HashMap;
use std::sync::Arc;

use rand::distr::{Alphanumeric, SampleString};
use regex::Regex;
use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex, Notify, RwLock};
use tracing::{error, info, warn};

use crate::connection::{handle_client_connection, handle_master_connection};
use crate::key_value_store::KeyValueStore;
use crate::pubsub::PubSub;
use crate::rdb;
use crate::replication::{perform_handshake, ReplicaRegistry};
use crate::state::State;

/// Errors that can occur during command-line argument parsing.
#[derive(Error, Debug, PartialEq, Clone)]
pub enum CliError {
    #[error("Invalid command line flag")]
    InvalidCommandLineFlag,
    #[error("Invalid port flag value")]
    InvalidPortFlagValue,
    #[error("Invalid master address")]
    InvalidMasterAddress,
    #[error("Invalid master port")]
    InvalidMasterPort,
}

/// The replication role a server starts in.
#[derive(Debug, PartialEq, Clone)]
pub enum ServerRole {
    Master,
    /// A replica of the master at (host, port).
    Replica(String, u32),
}

impl ServerRole {
    /// The role name reported by INFO (replicas report the legacy "slave").
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerRole::Master => "master",
            ServerRole::Replica(_, _) => "slave",
        }
    }
}

/// Startup configuration distilled from the command line.
#[derive(Debug, PartialEq, Clone)]
pub struct ServerConfig {
    pub port: u32,
    pub role: ServerRole,
    pub dir: Option<String>,
    pub dbfilename: Option<String>,
}

impl ServerConfig {
    /// Parses `--port`, `--replicaof`, `--dir` and `--dbfilename`.
    ///
    /// The `--replicaof` value is a single `"host port"` argument; the host
    /// must be a valid IPv4 address or hostname.
    pub fn from_args<I: IntoIterator<Item = String>>(args: I) -> Result<Self, CliError> {
        let mut iter = args.into_iter().skip(1);
        let mut port: Option<u32> = None;
        let mut role: Option<ServerRole> = None;
        let mut dir: Option<String> = None;
        let mut dbfilename: Option<String> = None;

        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--port" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    port = Some(validate_port(&value, CliError::InvalidPortFlagValue)?);
                }
                "--replicaof" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    let (host, master_port) = validate_master_address(&value)?;
                    role = Some(ServerRole::Replica(host, master_port));
                }
                "--dir" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    dir = Some(value);
                }
                "--dbfilename" => {
                    let Some(value) = iter.next() else {
                        return Err(CliError::InvalidCommandLineFlag);
                    };

                    dbfilename = Some(value);
                }
                _ => return Err(CliError::InvalidCommandLineFlag),
            }
        }

        Ok(ServerConfig {
            port: port.unwrap_or(6379),
            role: role.unwrap_or(ServerRole::Master),
            dir,
            dbfilename,
        })
    }
}

/// Server identity, fixed at startup apart from the replication id a replica
/// adopts from its master.
#[derive(Debug, Clone)]
pub struct ServerInfo {
    pub port: u32,
    pub role: ServerRole,
    pub replication_id: String,
    pub dir: Option<String>,
    pub dbfilename: Option<String>,
}

/// The shared server state: one instance, handed to every connection task.
pub struct ServerContext {
    pub info: RwLock<ServerInfo>,
    /// Keyspace lock `K`.
    pub store: Mutex<KeyValueStore>,
    /// Coordinator lock `B`; only ever acquired after `K` when both are held.
    pub state: Mutex<State>,
    /// Pub/sub lock `P`.
    pub pub_sub: Mutex<PubSub>,
    /// Replica registry lock `R`, guarding the registry and `repl_offset`.
    pub replicas: Mutex<ReplicaRegistry>,
    /// Signalled whenever a replica acknowledgment arrives, for WAIT.
    pub ack_notify: Notify,
}

impl ServerContext {
    pub fn new(config: ServerConfig) -> Arc<Self> {
        let info = ServerInfo {
            port: config.port,
            role: config.role,
            replication_id: Alphanumeric.sample_string(&mut rand::rng(), 40),
            dir: config.dir,
            dbfilename: config.dbfilename,
        };

        Arc::new(ServerContext {
            info: RwLock::new(info),
            store: Mutex::new(HashMap::new()),
            state: Mutex::new(State::new()),
            pub_sub: Mutex::new(PubSub::new()),
            replicas: Mutex::new(ReplicaRegistry::new()),
            ack_notify: Notify::new(),
        })
    }

    /// The role fixed at startup.
    pub async fn role(&self) -> ServerRole {
        self.info.read().await.role.clone()
    }
}

/// Runs the server: optional snapshot load, the replica handshake when
/// configured as one, then the accept loop.
pub async fn run(context: Arc<ServerContext>) {
    load_startup_snapshot(&context).await;

    let (port, role) = {
        let info = context.info.read().await;
        (info.port, info.role.clone())
    };

    if let ServerRole::Replica(host, master_port) = role {
        let master_address = format!("{}:{}", host, master_port);

        let mut stream = match TcpStream::connect(&master_address).await {
            Ok(stream) => stream,
            Err(e) => {
                error!("failed to connect to master {}: {}", master_address, e);
                return;
            }
        };

        let (replication_id, leftover) = match perform_handshake(&mut stream, port).await {
            Ok(handshake) => handshake,
            Err(e) => {
                error!("replication handshake with {} failed: {}", master_address, e);
                return;
            }
        };

        context.info.write().await.replication_id = replication_id;
        info!("completed full resync with master {}", master_address);

        let replica_context = Arc::clone(&context);
        tokio::spawn(async move {
            handle_master_connection(stream, leftover, replica_context).await;
        });
    }

    let listener = match TcpListener::bind(format!("127.0.0.1:{}", port)).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind port {}: {}", port, e);
            return;
        }
    };

    info!("listening on port {}", port);

    loop {
        match listener.accept().await {
            Ok((stream, client_address)) => {
                let connection_context = Arc::clone(&context);

                tokio::spawn(async move {
                    handle_client_connection(
                        stream,
                        client_address.to_string(),
                        connection_context,
                    )
                    .await;
                });
            }
            Err(e) => {
                error!("accept failed: {}", e);
                break;
            }
        }
    }
}

async fn load_startup_snapshot(context: &Arc<ServerContext>) {
    let path = {
        let info = context.info.read().await;

        match (&info.dir, &info.dbfilename) {
            (Some(dir), Some(file)) => format!("{}/{}", dir, file),
            _ => return,
        }
    };

    let payload = match tokio::fs::read(&path).await {
        Ok(payload) => payload,
        Err(_) => {
            info!("no snapshot at {}, starting empty", path);
            return;
        }
    };

    match rdb::parse_snapshot(&payload) {
        Ok(entries) => {
            info!("loaded {} keys from {}", entries.len(), path);
            let mut store = context.store.lock().await;
            store.extend(entries);
        }
        Err(e) => {
            warn!("ignoring unreadable snapshot {}: {}", path, e);
        }
    }
}

fn validate_port(port: &str, error: CliError) -> Result<u32, CliError> {
    let port_number = port.parse::<u32>().map_err(|_| error.clone())?;

    if !(1..=65535).contains(&port_number) {
        return Err(error);
    }

    Ok(port_number)
}

/// Parses a `"host port"` master address; the host may be an IPv4 address or
/// a hostname.
fn validate_master_address(master_address: &str) -> Result<(String, u32), CliError> {
    let parts = master_address.split_whitespace().collect::<Vec<&str>>();

    if parts.len() != 2 {
        return Err(CliError::InvalidMasterAddress);
    }

    let host = parts[0];

    let valid_host = match ipv4_regex().captures(host) {
        Some(caps) => caps.iter().skip(1).all(|octet| {
            octet
                .map(|m| m.as_str().parse::<u16>().map(|v| v <= 255).unwrap_or(false))
                .unwrap_or(false)
        }),
        None => hostname_regex().is_match(host),
    };

    if !valid_host {
        return Err(CliError::InvalidMasterAddress);
    }

    let port = validate_port(parts[1], CliError::InvalidMasterPort)?;

    Ok((host.to_string(), port))
}

fn ipv4_regex() -> Regex {
    Regex::new(r"^(\d{1,3})\.(\d{1,3})\.(\d{1,3})\.(\d{1,3})$").unwrap()
}

fn hostname_regex() -> Regex {
    Regex::new(r"^[a-zA-Z0-9\-\.]+$").unwrap()
}
