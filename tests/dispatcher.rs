//! End-to-end command tests driven through the dispatcher, one simulated
//! client per dispatcher instance sharing a single server context.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::RwLock;
use tokio::time::timeout;

use kestrel::commands::{CommandDispatcher, CommandHandler, CommandResult};
use kestrel::connection::SharedWriter;
use kestrel::resp::RespValue;
use kestrel::server::{ServerConfig, ServerContext, ServerRole};

async fn test_writer() -> SharedWriter {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap();
    let (_incoming, stream) = tokio::join!(listener.accept(), TcpStream::connect(address));
    let (_reader, writer) = stream.unwrap().into_split();

    Arc::new(RwLock::new(writer))
}

fn test_context() -> Arc<ServerContext> {
    ServerContext::new(ServerConfig {
        port: 6379,
        role: ServerRole::Master,
        dir: None,
        dbfilename: None,
    })
}

async fn client(context: &Arc<ServerContext>, address: &str) -> CommandDispatcher {
    CommandDispatcher::new(address, test_writer().await, Arc::clone(context))
}

fn command(parts: &[&str]) -> CommandHandler {
    CommandHandler::new(&RespValue::Array(
        parts
            .iter()
            .map(|part| RespValue::BulkString(part.to_string()))
            .collect(),
    ))
    .unwrap()
}

async fn run(dispatcher: &CommandDispatcher, parts: &[&str]) -> String {
    match dispatcher.dispatch(command(parts)).await {
        Ok(CommandResult::Response(response)) => response,
        Ok(other) => panic!("unexpected result {:?}", other),
        Err(e) => e.as_string(),
    }
}

fn bulk(value: &str) -> String {
    format!("${}\r\n{}\r\n", value.len(), value)
}

fn array(values: &[&str]) -> String {
    let mut encoded = format!("*{}\r\n", values.len());
    for value in values {
        encoded.push_str(&bulk(value));
    }
    encoded
}

#[tokio::test]
async fn test_set_get_type_scenario() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    assert_eq!(run(&dispatcher, &["SET", "foo", "bar"]).await, "+OK\r\n");
    assert_eq!(run(&dispatcher, &["GET", "foo"]).await, bulk("bar"));
    assert_eq!(run(&dispatcher, &["TYPE", "foo"]).await, "+string\r\n");
}

#[tokio::test]
async fn test_list_scenario() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    assert_eq!(run(&dispatcher, &["RPUSH", "L", "a", "b", "c"]).await, ":3\r\n");
    assert_eq!(
        run(&dispatcher, &["LRANGE", "L", "0", "-1"]).await,
        array(&["a", "b", "c"])
    );
    assert_eq!(
        run(&dispatcher, &["LPOP", "L", "2"]).await,
        array(&["a", "b"])
    );
    assert_eq!(run(&dispatcher, &["LLEN", "L"]).await, ":1\r\n");
}

#[tokio::test]
async fn test_list_pop_sequence_is_fifo() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    for value in ["first", "second", "third"] {
        run(&dispatcher, &["RPUSH", "L", value]).await;
    }

    assert_eq!(run(&dispatcher, &["LPOP", "L"]).await, bulk("first"));
    assert_eq!(run(&dispatcher, &["LPOP", "L"]).await, bulk("second"));
    assert_eq!(run(&dispatcher, &["LPOP", "L"]).await, bulk("third"));
    assert_eq!(run(&dispatcher, &["LPOP", "L"]).await, "$-1\r\n");
    assert_eq!(run(&dispatcher, &["EXISTS", "L"]).await, ":0\r\n");
}

#[tokio::test]
async fn test_expiry_scenario() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    assert_eq!(
        run(&dispatcher, &["SET", "tmp", "v", "PX", "40"]).await,
        "+OK\r\n"
    );
    assert_eq!(run(&dispatcher, &["GET", "tmp"]).await, bulk("v"));

    tokio::time::sleep(Duration::from_millis(60)).await;

    assert_eq!(run(&dispatcher, &["GET", "tmp"]).await, "$-1\r\n");
    assert_eq!(run(&dispatcher, &["EXISTS", "tmp"]).await, ":0\r\n");
}

#[tokio::test]
async fn test_stream_scenario() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    assert_eq!(
        run(&dispatcher, &["XADD", "s", "1-1", "k", "v"]).await,
        bulk("1-1")
    );

    let duplicate = run(&dispatcher, &["XADD", "s", "1-1", "k", "v"]).await;
    assert!(
        duplicate.contains("equal or smaller"),
        "duplicate id must be rejected: {}",
        duplicate
    );

    let auto = run(&dispatcher, &["XADD", "s", "*", "k2", "v2"]).await;
    let auto_id = auto
        .split("\r\n")
        .nth(1)
        .unwrap()
        .parse::<kestrel::key_value_store::StreamId>()
        .unwrap();
    assert!(auto_id > kestrel::key_value_store::StreamId::new(1, 1));
}

#[tokio::test]
async fn test_stream_ids_strictly_increase_in_xrange() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    for id in ["1-1", "1-2", "2-0", "10-0"] {
        run(&dispatcher, &["XADD", "s", id, "k", "v"]).await;
    }

    let response = run(&dispatcher, &["XRANGE", "s", "-", "+"]).await;
    let ids: Vec<kestrel::key_value_store::StreamId> = response
        .split("\r\n")
        .filter_map(|line| line.parse().ok())
        .collect();

    assert_eq!(ids.len(), 4);
    assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn test_transaction_scenario() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    assert_eq!(run(&dispatcher, &["MULTI"]).await, "+OK\r\n");
    assert_eq!(run(&dispatcher, &["INCR", "n"]).await, "+QUEUED\r\n");
    assert_eq!(run(&dispatcher, &["INCR", "n"]).await, "+QUEUED\r\n");
    assert_eq!(run(&dispatcher, &["EXEC"]).await, "*2\r\n:1\r\n:2\r\n");
    assert_eq!(run(&dispatcher, &["GET", "n"]).await, bulk("2"));
}

#[tokio::test]
async fn test_sorted_set_rank_order() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    assert_eq!(run(&dispatcher, &["ZADD", "board", "2", "carol"]).await, ":1\r\n");
    assert_eq!(run(&dispatcher, &["ZADD", "board", "1", "bob"]).await, ":1\r\n");
    assert_eq!(run(&dispatcher, &["ZADD", "board", "2", "alice"]).await, ":1\r\n");

    // `(score, member-lex)` order: bob(1), alice(2), carol(2).
    assert_eq!(
        run(&dispatcher, &["ZRANGE", "board", "0", "-1"]).await,
        array(&["bob", "alice", "carol"])
    );
    assert_eq!(run(&dispatcher, &["ZRANK", "board", "bob"]).await, ":0\r\n");
    assert_eq!(run(&dispatcher, &["ZRANK", "board", "alice"]).await, ":1\r\n");
    assert_eq!(run(&dispatcher, &["ZRANK", "board", "carol"]).await, ":2\r\n");
    assert_eq!(run(&dispatcher, &["ZCARD", "board"]).await, ":3\r\n");
    assert_eq!(run(&dispatcher, &["ZSCORE", "board", "alice"]).await, bulk("2"));
    assert_eq!(run(&dispatcher, &["ZREM", "board", "alice"]).await, ":1\r\n");
    assert_eq!(
        run(&dispatcher, &["ZRANGE", "board", "0", "-1"]).await,
        array(&["bob", "carol"])
    );
    assert_eq!(run(&dispatcher, &["TYPE", "board"]).await, "+zset\r\n");
}

#[tokio::test]
async fn test_concurrent_incr_is_linearizable() {
    let context = test_context();
    let dispatcher = client(&context, "seed").await;
    run(&dispatcher, &["SET", "counter", "0"]).await;

    let mut tasks = Vec::new();

    for i in 0..20 {
        let context = Arc::clone(&context);

        tasks.push(tokio::spawn(async move {
            let dispatcher = client(&context, &format!("client-{}", i)).await;
            run(&dispatcher, &["INCR", "counter"]).await
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    assert_eq!(run(&dispatcher, &["GET", "counter"]).await, bulk("20"));
}

#[tokio::test]
async fn test_blpop_receives_pushed_element() {
    let context = test_context();

    let blocked_context = Arc::clone(&context);
    let blocked = tokio::spawn(async move {
        let dispatcher = client(&blocked_context, "blocked").await;
        run(&dispatcher, &["BLPOP", "jobs", "5"]).await
    });

    // Let the reader park first.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pusher = client(&context, "pusher").await;
    assert_eq!(run(&pusher, &["RPUSH", "jobs", "task-1"]).await, ":1\r\n");

    let reply = timeout(Duration::from_secs(2), blocked)
        .await
        .expect("BLPOP must wake up")
        .unwrap();
    assert_eq!(reply, array(&["jobs", "task-1"]));

    // The handed-off element is gone from the keyspace.
    assert_eq!(run(&pusher, &["EXISTS", "jobs"]).await, ":0\r\n");
}

#[tokio::test]
async fn test_blpop_timeout_returns_null_array() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    let started = tokio::time::Instant::now();
    assert_eq!(run(&dispatcher, &["BLPOP", "nothing", "0.05"]).await, "*-1\r\n");
    assert!(started.elapsed() >= Duration::from_millis(40));
}

#[tokio::test]
async fn test_blpop_waiters_are_served_fifo() {
    let context = test_context();

    let first_context = Arc::clone(&context);
    let first = tokio::spawn(async move {
        let dispatcher = client(&first_context, "first").await;
        run(&dispatcher, &["BLPOP", "q", "5"]).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let second_context = Arc::clone(&context);
    let second = tokio::spawn(async move {
        let dispatcher = client(&second_context, "second").await;
        run(&dispatcher, &["BLPOP", "q", "5"]).await
    });
    tokio::time::sleep(Duration::from_millis(100)).await;

    let pusher = client(&context, "pusher").await;
    run(&pusher, &["RPUSH", "q", "one"]).await;

    let first_reply = timeout(Duration::from_secs(2), first).await.unwrap().unwrap();
    assert_eq!(first_reply, array(&["q", "one"]), "first waiter wins");

    run(&pusher, &["RPUSH", "q", "two"]).await;
    let second_reply = timeout(Duration::from_secs(2), second).await.unwrap().unwrap();
    assert_eq!(second_reply, array(&["q", "two"]));
}

#[tokio::test]
async fn test_one_push_wakes_exactly_one_waiter() {
    let context = test_context();
    let mut tasks = Vec::new();

    for i in 0..3 {
        let waiter_context = Arc::clone(&context);

        tasks.push(tokio::spawn(async move {
            let dispatcher = client(&waiter_context, &format!("waiter-{}", i)).await;
            run(&dispatcher, &["BLPOP", "q", "0.5"]).await
        }));
    }

    tokio::time::sleep(Duration::from_millis(100)).await;

    let pusher = client(&context, "pusher").await;
    run(&pusher, &["RPUSH", "q", "only"]).await;

    let mut winners = 0;

    for task in tasks {
        let reply = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
        if reply.contains("only") {
            winners += 1;
        } else {
            assert_eq!(reply, "*-1\r\n", "losers time out with a null array");
        }
    }

    assert_eq!(winners, 1, "exactly one waiter takes the element");
}

#[tokio::test]
async fn test_xread_block_wakes_on_xadd() {
    let context = test_context();
    let setup = client(&context, "setup").await;
    run(&setup, &["XADD", "events", "1-1", "k", "v"]).await;

    let reader_context = Arc::clone(&context);
    let reader = tokio::spawn(async move {
        let dispatcher = client(&reader_context, "reader").await;
        run(
            &dispatcher,
            &["XREAD", "BLOCK", "5000", "STREAMS", "events", "$"],
        )
        .await
    });

    tokio::time::sleep(Duration::from_millis(100)).await;

    let writer = client(&context, "writer").await;
    run(&writer, &["XADD", "events", "2-1", "temp", "37"]).await;

    let reply = timeout(Duration::from_secs(2), reader).await.unwrap().unwrap();
    assert!(reply.contains("events"), "reply names the stream: {}", reply);
    assert!(reply.contains("2-1"), "only the new entry arrives: {}", reply);
    assert!(!reply.contains("1-1"), "entries at or before $ are skipped");
}

#[tokio::test]
async fn test_xread_block_timeout_returns_null_array() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    assert_eq!(
        run(
            &dispatcher,
            &["XREAD", "BLOCK", "50", "STREAMS", "quiet", "$"]
        )
        .await,
        "*-1\r\n"
    );
}

#[tokio::test]
async fn test_keys_glob_patterns() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    for key in ["user:1", "user:2", "session:9"] {
        run(&dispatcher, &["SET", key, "x"]).await;
    }

    let reply = run(&dispatcher, &["KEYS", "user:?"]).await;
    assert!(reply.starts_with("*2\r\n"), "{}", reply);
    assert!(reply.contains("user:1") && reply.contains("user:2"));
    assert!(!reply.contains("session:9"));
}

#[tokio::test]
async fn test_del_and_exists() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    run(&dispatcher, &["SET", "a", "1"]).await;
    run(&dispatcher, &["SET", "b", "2"]).await;

    assert_eq!(run(&dispatcher, &["EXISTS", "a"]).await, ":1\r\n");
    assert_eq!(run(&dispatcher, &["DEL", "a", "b", "c"]).await, ":2\r\n");
    assert_eq!(run(&dispatcher, &["EXISTS", "a"]).await, ":0\r\n");
}

#[tokio::test]
async fn test_wrongtype_across_kinds() {
    let context = test_context();
    let dispatcher = client(&context, "c1").await;

    run(&dispatcher, &["RPUSH", "L", "x"]).await;
    run(&dispatcher, &["SET", "s", "v"]).await;

    let wrongtype = "-WRONGTYPE Operation against a key holding the wrong kind of value\r\n";

    assert_eq!(run(&dispatcher, &["GET", "L"]).await, wrongtype);
    assert_eq!(run(&dispatcher, &["RPUSH", "s", "x"]).await, wrongtype);
    assert_eq!(run(&dispatcher, &["XADD", "s", "*", "k", "v"]).await, wrongtype);
    assert_eq!(run(&dispatcher, &["ZADD", "L", "1", "m"]).await, wrongtype);
}
