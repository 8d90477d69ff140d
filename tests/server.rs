//! Socket-level tests: real TCP connections against the connection loop,
//! including the replication handshake and command propagation.

use std::sync::Arc;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;

use kestrel::connection::{handle_client_connection, handle_master_connection};
use kestrel::key_value_store::DataType;
use kestrel::replication::perform_handshake;
use kestrel::resp::RespValue;
use kestrel::server::{ServerConfig, ServerContext, ServerRole};

/// Binds an ephemeral port and serves connections against a fresh context.
async fn spawn_server(role: ServerRole) -> (Arc<ServerContext>, std::net::SocketAddr) {
    let context = ServerContext::new(ServerConfig {
        port: 0,
        role,
        dir: None,
        dbfilename: None,
    });

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();

    let accept_context = Arc::clone(&context);
    tokio::spawn(async move {
        loop {
            let Ok((stream, peer)) = listener.accept().await else {
                break;
            };

            let connection_context = Arc::clone(&accept_context);
            tokio::spawn(async move {
                handle_client_connection(stream, peer.to_string(), connection_context).await;
            });
        }
    });

    (context, address)
}

struct TestClient {
    stream: TcpStream,
    buffer: BytesMut,
}

impl TestClient {
    async fn connect(address: std::net::SocketAddr) -> Self {
        TestClient {
            stream: TcpStream::connect(address).await.unwrap(),
            buffer: BytesMut::with_capacity(4096),
        }
    }

    async fn send(&mut self, parts: &[&str]) {
        let frame = RespValue::encode_array_from_strings(parts.iter().copied());
        self.stream.write_all(frame.as_bytes()).await.unwrap();
        self.stream.flush().await.unwrap();
    }

    async fn read_frame(&mut self) -> RespValue {
        timeout(Duration::from_secs(2), async {
            loop {
                if let Some((frame, _)) = RespValue::decode(&mut self.buffer).unwrap() {
                    return frame;
                }

                let read = self.stream.read_buf(&mut self.buffer).await.unwrap();
                assert!(read > 0, "server closed the connection unexpectedly");
            }
        })
        .await
        .expect("timed out waiting for a reply")
    }

    async fn roundtrip(&mut self, parts: &[&str]) -> RespValue {
        self.send(parts).await;
        self.read_frame().await
    }
}

fn simple(value: &str) -> RespValue {
    RespValue::SimpleString(value.to_string())
}

fn bulk(value: &str) -> RespValue {
    RespValue::BulkString(value.to_string())
}

#[tokio::test]
async fn test_ping_echo_set_get_over_tcp() {
    let (_context, address) = spawn_server(ServerRole::Master).await;
    let mut client = TestClient::connect(address).await;

    assert_eq!(client.roundtrip(&["PING"]).await, simple("PONG"));
    assert_eq!(client.roundtrip(&["ECHO", "hey"]).await, bulk("hey"));
    assert_eq!(client.roundtrip(&["SET", "foo", "bar"]).await, simple("OK"));
    assert_eq!(client.roundtrip(&["GET", "foo"]).await, bulk("bar"));
    assert_eq!(client.roundtrip(&["GET", "nope"]).await, RespValue::NullBulkString);
}

#[tokio::test]
async fn test_command_split_across_tcp_segments() {
    let (_context, address) = spawn_server(ServerRole::Master).await;
    let mut client = TestClient::connect(address).await;

    // One SET command delivered in three fragments.
    let frame = RespValue::encode_array_from_strings(["SET", "frag", "mented"]);
    let bytes = frame.as_bytes();

    for chunk in bytes.chunks(7) {
        client.stream.write_all(chunk).await.unwrap();
        client.stream.flush().await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    assert_eq!(client.read_frame().await, simple("OK"));
    assert_eq!(client.roundtrip(&["GET", "frag"]).await, bulk("mented"));
}

#[tokio::test]
async fn test_pipelined_commands_answered_in_order() {
    let (_context, address) = spawn_server(ServerRole::Master).await;
    let mut client = TestClient::connect(address).await;

    let mut pipelined = String::new();
    pipelined.push_str(&RespValue::encode_array_from_strings(["SET", "a", "1"]));
    pipelined.push_str(&RespValue::encode_array_from_strings(["INCR", "a"]));
    pipelined.push_str(&RespValue::encode_array_from_strings(["GET", "a"]));

    client.stream.write_all(pipelined.as_bytes()).await.unwrap();

    assert_eq!(client.read_frame().await, simple("OK"));
    assert_eq!(client.read_frame().await, RespValue::Integer(2));
    assert_eq!(client.read_frame().await, bulk("2"));
}

#[tokio::test]
async fn test_blpop_handoff_between_tcp_clients() {
    let (_context, address) = spawn_server(ServerRole::Master).await;

    let mut blocked = TestClient::connect(address).await;
    blocked.send(&["BLPOP", "L", "0"]).await;

    // Give the first client time to park.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut pusher = TestClient::connect(address).await;
    assert_eq!(
        pusher.roundtrip(&["RPUSH", "L", "x"]).await,
        RespValue::Integer(1)
    );

    assert_eq!(
        blocked.read_frame().await,
        RespValue::Array(vec![bulk("L"), bulk("x")])
    );

    // The element was handed over, not left behind.
    assert_eq!(pusher.roundtrip(&["LLEN", "L"]).await, RespValue::Integer(0));
}

#[tokio::test]
async fn test_publish_reaches_subscriber() {
    let (_context, address) = spawn_server(ServerRole::Master).await;

    let mut subscriber = TestClient::connect(address).await;
    assert_eq!(
        subscriber.roundtrip(&["SUBSCRIBE", "news"]).await,
        RespValue::Array(vec![bulk("subscribe"), bulk("news"), RespValue::Integer(1)])
    );

    let mut publisher = TestClient::connect(address).await;
    assert_eq!(
        publisher.roundtrip(&["PUBLISH", "news", "hello"]).await,
        RespValue::Integer(1)
    );

    assert_eq!(
        subscriber.read_frame().await,
        RespValue::Array(vec![bulk("message"), bulk("news"), bulk("hello")])
    );

    // Publishing into silence delivers to nobody.
    assert_eq!(
        publisher.roundtrip(&["PUBLISH", "empty", "x"]).await,
        RespValue::Integer(0)
    );
}

#[tokio::test]
async fn test_malformed_frame_closes_connection() {
    let (_context, address) = spawn_server(ServerRole::Master).await;
    let mut client = TestClient::connect(address).await;

    client.stream.write_all(b"!garbage\r\n").await.unwrap();

    let frame = client.read_frame().await;
    let RespValue::Error(message) = frame else {
        panic!("expected an error frame, got {:?}", frame);
    };
    assert!(message.contains("Protocol error"), "{}", message);

    let mut probe = [0u8; 16];
    let read = timeout(Duration::from_secs(2), client.stream.read(&mut probe))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(read, 0, "connection must be closed after a protocol error");
}

/// Wires a replica context to a master over real sockets, mirroring what
/// `server::run` does for a `--replicaof` process.
async fn spawn_replica(
    master_address: std::net::SocketAddr,
) -> Arc<ServerContext> {
    let replica_context = ServerContext::new(ServerConfig {
        port: 0,
        role: ServerRole::Replica("127.0.0.1".to_string(), master_address.port() as u32),
        dir: None,
        dbfilename: None,
    });

    let mut stream = TcpStream::connect(master_address).await.unwrap();
    let (replication_id, leftover) = perform_handshake(&mut stream, 0).await.unwrap();
    assert_eq!(replication_id.len(), 40);

    let link_context = Arc::clone(&replica_context);
    tokio::spawn(async move {
        handle_master_connection(stream, leftover, link_context).await;
    });

    replica_context
}

#[tokio::test]
async fn test_replication_propagates_writes_and_tracks_offset() {
    let (_master_context, master_address) = spawn_server(ServerRole::Master).await;
    let replica_context = spawn_replica(master_address).await;

    let mut client = TestClient::connect(master_address).await;
    assert_eq!(client.roundtrip(&["SET", "k", "v"]).await, simple("OK"));

    // The write reaches the replica's keyspace within bounded time.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        {
            let store = replica_context.store.lock().await;
            if let Some(value) = store.get("k") {
                assert_eq!(value.data, DataType::String("v".to_string()));
                break;
            }
        }

        assert!(
            tokio::time::Instant::now() < deadline,
            "write never reached the replica"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // INFO reports the master role and an offset equal to the serialized
    // byte length of the propagated SET.
    let set_length = RespValue::encode_array_from_strings(["SET", "k", "v"]).len();
    let info = client.roundtrip(&["INFO", "replication"]).await;
    let RespValue::BulkString(section) = info else {
        panic!("INFO must answer with a bulk string");
    };

    assert!(section.contains("role:master"));
    assert!(section.contains("master_replid:"));
    assert!(
        section.contains(&format!("master_repl_offset:{}", set_length)),
        "offset must equal the propagated bytes: {}",
        section
    );
}

#[tokio::test]
async fn test_wait_counts_acknowledged_replicas() {
    let (_master_context, master_address) = spawn_server(ServerRole::Master).await;
    let _replica_context = spawn_replica(master_address).await;

    let mut client = TestClient::connect(master_address).await;

    // With no writes outstanding every replica is trivially caught up.
    assert_eq!(
        client.roundtrip(&["WAIT", "1", "500"]).await,
        RespValue::Integer(1)
    );

    assert_eq!(client.roundtrip(&["SET", "k", "v"]).await, simple("OK"));

    // The replica acknowledges the write after the GETACK probe.
    assert_eq!(
        client.roundtrip(&["WAIT", "1", "2000"]).await,
        RespValue::Integer(1)
    );

    // Asking for more replicas than exist times out with the achieved count.
    assert_eq!(client.roundtrip(&["SET", "k2", "v2"]).await, simple("OK"));
    assert_eq!(
        client.roundtrip(&["WAIT", "5", "200"]).await,
        RespValue::Integer(1)
    );
}

#[tokio::test]
async fn test_wait_with_no_replicas_is_zero() {
    let (_context, address) = spawn_server(ServerRole::Master).await;
    let mut client = TestClient::connect(address).await;

    assert_eq!(
        client.roundtrip(&["WAIT", "1", "100"]).await,
        RespValue::Integer(0)
    );
}

#[tokio::test]
async fn test_replica_serves_reads_and_rejects_writes() {
    let (_master_context, master_address) = spawn_server(ServerRole::Master).await;
    let replica_context = spawn_replica(master_address).await;

    // Expose the replica to clients on its own port.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let replica_address = listener.local_addr().unwrap();
    let accept_context = Arc::clone(&replica_context);
    tokio::spawn(async move {
        loop {
            let Ok((stream, peer)) = listener.accept().await else {
                break;
            };
            let connection_context = Arc::clone(&accept_context);
            tokio::spawn(async move {
                handle_client_connection(stream, peer.to_string(), connection_context).await;
            });
        }
    });

    let mut master_client = TestClient::connect(master_address).await;
    master_client.roundtrip(&["SET", "shared", "value"]).await;

    let mut replica_client = TestClient::connect(replica_address).await;

    // Reads are served once the write arrives.
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let reply = replica_client.roundtrip(&["GET", "shared"]).await;
        if reply == bulk("value") {
            break;
        }

        assert!(
            tokio::time::Instant::now() < deadline,
            "replica never served the replicated value"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    // Writes from ordinary clients are refused.
    let rejected = replica_client.roundtrip(&["SET", "local", "x"]).await;
    let RespValue::Error(message) = rejected else {
        panic!("replica must reject writes");
    };
    assert!(message.starts_with("READONLY"), "{}", message);

    // And its INFO reports the replica role.
    let RespValue::BulkString(section) =
        replica_client.roundtrip(&["INFO", "replication"]).await
    else {
        panic!("INFO must answer with a bulk string");
    };
    assert!(section.contains("role:slave"));
}
