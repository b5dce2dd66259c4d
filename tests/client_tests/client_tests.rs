//! Tests for Client
//!
//! These tests verify:
//! - Typed string and hash commands
//! - Absent vs empty vs failed results
//! - Binary payloads with embedded zero bytes
//! - Engine failure mapping
//! - CommandFuture waiting, polling and awaiting

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures::executor::block_on;
use kvbridge::{
    BridgeError, Client, Command, Config, MemoryEngine, RequestErrorType, RequestType, Route,
    StatusCode, Value,
};

// =============================================================================
// Helper Functions
// =============================================================================

fn setup_client() -> (Arc<MemoryEngine>, Client) {
    let engine = Arc::new(MemoryEngine::new());
    let client = Client::connect(engine.clone(), &Config::default()).unwrap();
    (engine, client)
}

// =============================================================================
// String Commands
// =============================================================================

#[test]
fn test_set_then_get() {
    let (_engine, client) = setup_client();

    assert!(client.set("greeting", "hello").get().unwrap());
    assert_eq!(
        client.get("greeting").get().unwrap(),
        Some(Bytes::from_static(b"hello"))
    );
    assert_eq!(
        client.get_string("greeting").get().unwrap().as_deref(),
        Some("hello")
    );
}

#[test]
fn test_get_missing_key_is_none() {
    let (_engine, client) = setup_client();
    assert_eq!(client.get("missing").get().unwrap(), None);
}

#[test]
fn test_empty_value_is_not_absent() {
    let (_engine, client) = setup_client();

    client.set("empty", "").get().unwrap();
    assert_eq!(client.get("empty").get().unwrap(), Some(Bytes::new()));
}

#[test]
fn test_set_overwrites() {
    let (_engine, client) = setup_client();

    client.set("k", "one").get().unwrap();
    client.set("k", "two").get().unwrap();
    assert_eq!(client.get_string("k").get().unwrap().as_deref(), Some("two"));
}

#[test]
fn test_getdel_returns_prior_value_then_absent() {
    let (engine, client) = setup_client();

    client.set("session", "abc123").get().unwrap();
    assert_eq!(
        client.getdel_string("session").get().unwrap().as_deref(),
        Some("abc123")
    );
    assert_eq!(client.get("session").get().unwrap(), None);
    assert_eq!(client.getdel("session").get().unwrap(), None);
    assert_eq!(engine.key_count(0), 0);
}

#[test]
fn test_binary_value_with_zero_bytes() {
    let (_engine, client) = setup_client();
    let key = b"bin\x00key";
    let value = b"\x00\x01\x00\xFF\x00";

    assert!(client.set(key, value).get().unwrap());
    let read = client.get(key).get().unwrap().unwrap();

    assert_eq!(read.len(), 5);
    assert_eq!(&read[..], &value[..]);
    assert_eq!(client.strlen(key).get().unwrap(), 5);
}

#[test]
fn test_counters() {
    let (_engine, client) = setup_client();

    assert_eq!(client.incr("hits").get().unwrap(), 1);
    assert_eq!(client.incr_by("hits", 41).get().unwrap(), 42);
    assert_eq!(client.incr_by("hits", -2).get().unwrap(), 40);
    assert_eq!(client.get_string("hits").get().unwrap().as_deref(), Some("40"));
}

#[test]
fn test_incr_non_integer_fails() {
    let (_engine, client) = setup_client();

    client.set("name", "ada").get().unwrap();
    match client.incr("name").get() {
        Err(BridgeError::UnknownEngineError(msg)) => assert!(msg.contains("not an integer")),
        other => panic!("Expected engine error, got {:?}", other),
    }
}

#[test]
fn test_append_and_strlen() {
    let (_engine, client) = setup_client();

    assert_eq!(client.append("log", "ab").get().unwrap(), 2);
    assert_eq!(client.append("log", "cde").get().unwrap(), 5);
    assert_eq!(client.strlen("log").get().unwrap(), 5);
    assert_eq!(client.strlen("nothing").get().unwrap(), 0);
}

#[test]
fn test_mget() {
    let (_engine, client) = setup_client();

    client.set("a", "1").get().unwrap();
    client.set("c", "3").get().unwrap();

    let values = client.mget(["a", "b", "c"]).get().unwrap();
    assert_eq!(
        values,
        vec![
            Some(Bytes::from_static(b"1")),
            None,
            Some(Bytes::from_static(b"3")),
        ]
    );
}

#[test]
fn test_del_and_exists() {
    let (_engine, client) = setup_client();

    client.set("x", "1").get().unwrap();
    client.set("y", "2").get().unwrap();

    assert_eq!(client.exists(["x", "y", "z"]).get().unwrap(), 2);
    assert_eq!(client.del(["x", "z"]).get().unwrap(), 1);
    assert_eq!(client.exists(["x"]).get().unwrap(), 0);
}

// =============================================================================
// Hash Commands
// =============================================================================

#[test]
fn test_hset_then_hget() {
    let (_engine, client) = setup_client();

    let mut fields = HashMap::new();
    fields.insert("f1", "v1");
    fields.insert("f2", "v2");

    assert_eq!(client.hset("profile", fields).get().unwrap(), 2);
    assert_eq!(client.hget_string("profile", "f1").get().unwrap().as_deref(), Some("v1"));
    assert_eq!(client.hget_string("profile", "f2").get().unwrap().as_deref(), Some("v2"));
    assert_eq!(client.hget("profile", "f3").get().unwrap(), None);
    assert_eq!(client.hget("nobody", "f1").get().unwrap(), None);
}

#[test]
fn test_hset_counts_only_new_fields() {
    let (_engine, client) = setup_client();

    assert_eq!(client.hset("h", [("a", "1")]).get().unwrap(), 1);
    assert_eq!(client.hset("h", [("a", "2"), ("b", "3")]).get().unwrap(), 1);
    assert_eq!(client.hget_string("h", "a").get().unwrap().as_deref(), Some("2"));
}

#[test]
fn test_hgetall_hdel_hexists() {
    let (engine, client) = setup_client();

    client.hset("h", [("a", "1"), ("b", "2")]).get().unwrap();
    assert!(client.hexists("h", "a").get().unwrap());

    let all = client.hgetall("h").get().unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[&Bytes::from_static(b"b")], Bytes::from_static(b"2"));

    assert_eq!(client.hdel("h", ["a", "b", "c"]).get().unwrap(), 2);
    assert!(!client.hexists("h", "a").get().unwrap());
    assert!(client.hgetall("h").get().unwrap().is_empty());
    assert_eq!(engine.key_count(0), 0);
}

#[test]
fn test_wrong_type_is_reported() {
    let (_engine, client) = setup_client();

    client.hset("h", [("f", "v")]).get().unwrap();
    match client.get("h").get() {
        Err(BridgeError::UnknownEngineError(msg)) => assert!(msg.starts_with("WRONGTYPE")),
        other => panic!("Expected WRONGTYPE, got {:?}", other),
    }
}

// =============================================================================
// Generic Submission
// =============================================================================

#[test]
fn test_ping() {
    let (_engine, client) = setup_client();

    assert_eq!(client.ping().get().unwrap(), "PONG");
    assert_eq!(
        client.ping_with("echo").get().unwrap(),
        Bytes::from_static(b"echo")
    );
}

#[test]
fn test_custom_command() {
    let (_engine, client) = setup_client();

    let ok: Value = client.custom_command(["SET", "cc", "1"]).get().unwrap();
    assert_eq!(ok, Value::Ok);

    let read: Option<String> = client.custom_command(["get", "cc"]).get().unwrap();
    assert_eq!(read.as_deref(), Some("1"));

    match client.custom_command::<Value, _>(["FLUSHEVERYTHING"]).get() {
        Err(BridgeError::UnknownEngineError(msg)) => assert!(msg.contains("unknown command")),
        other => panic!("Expected unknown command, got {:?}", other),
    }
}

#[test]
fn test_send_with_route() {
    let (_engine, client) = setup_client();

    let pong: String = client
        .send_with(RequestType::Ping, Vec::<&str>::new(), Some(Route::AllPrimaries))
        .get()
        .unwrap();
    assert_eq!(pong, "PONG");

    let command = Command::new(RequestType::Set)
        .arg("routed")
        .arg("yes")
        .route(Route::SlotKey {
            key: "routed".to_string(),
            replica: false,
        });
    assert!(client.send::<bool>(command).get().unwrap());
}

#[test]
fn test_wrong_arity() {
    let (_engine, client) = setup_client();

    let result = client.send::<Value>(Command::new(RequestType::Get)).get();
    match result {
        Err(BridgeError::UnknownEngineError(msg)) => {
            assert!(msg.contains("wrong number of arguments for 'get'"))
        }
        other => panic!("Expected arity error, got {:?}", other),
    }
}

#[test]
fn test_unexpected_response_type() {
    let (_engine, client) = setup_client();

    client.set("n", "5").get().unwrap();
    let result = client.send::<Vec<i64>>(Command::new(RequestType::Get).arg("n")).get();
    assert!(matches!(
        result,
        Err(BridgeError::UnexpectedResponse { expected: "Array", actual: "String" })
    ));
}

// =============================================================================
// Error Mapping
// =============================================================================

#[test]
fn test_engine_failures_map_to_status() {
    let (engine, client) = setup_client();

    let cases = [
        (RequestErrorType::ExecAbort, StatusCode::Aborted),
        (RequestErrorType::Timeout, StatusCode::DeadlineExceeded),
        (RequestErrorType::Disconnect, StatusCode::Unavailable),
        (RequestErrorType::Unspecified, StatusCode::Unknown),
    ];

    for (kind, code) in cases {
        engine.fail_next(kind, format!("injected {:?}", kind));
        let error = client.get("k").get().unwrap_err();
        assert_eq!(error.status_code(), code);
        assert!(error.is_command_failure());
        assert!(error.to_string().contains("injected"));
    }

    // Failures are never coerced into values
    engine.fail_next(RequestErrorType::Timeout, "slow");
    assert!(matches!(
        client.get("k").get(),
        Err(BridgeError::CommandTimeout(msg)) if msg == "slow"
    ));
    assert_eq!(client.get("k").get().unwrap(), None);
}

#[test]
fn test_failure_message_with_nul_byte_is_kept() {
    let (engine, client) = setup_client();

    engine.fail_next(RequestErrorType::Unspecified, "bad\0byte here");
    match client.get("k").get() {
        Err(BridgeError::UnknownEngineError(msg)) => assert_eq!(msg, "bad\\0byte here"),
        other => panic!("Expected UnknownEngineError, got {:?}", other),
    }
}

// =============================================================================
// CommandFuture
// =============================================================================

#[test]
fn test_submission_does_not_block() {
    let engine = Arc::new(MemoryEngine::new());
    let client = Client::connect(engine.clone(), &Config::default()).unwrap();
    engine.pause();

    let started = Instant::now();
    let future = client.set("k", "v");
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(!future.is_ready());

    engine.resume();
    assert!(future.get().unwrap());
}

#[test]
fn test_bounded_wait_then_get() {
    let engine = Arc::new(MemoryEngine::new());
    let client = Client::connect(engine.clone(), &Config::default()).unwrap();
    client.set("k", "v").get().unwrap();

    engine.pause();
    let future = client.get_string("k");
    assert!(!future.wait_for(Duration::from_millis(30)));
    assert!(!future.wait_until(Instant::now() + Duration::from_millis(10)));

    let future = match future.try_get() {
        Ok(result) => panic!("Resolved while paused: {:?}", result),
        Err(future) => future,
    };

    engine.resume();
    assert!(future.wait_for(Duration::from_secs(5)));
    assert!(future.is_ready());
    assert_eq!(future.try_get().unwrap().unwrap().as_deref(), Some("v"));
}

#[test]
fn test_future_can_be_awaited() {
    let (_engine, client) = setup_client();

    let value = block_on(async {
        client.set("async", "yes").await?;
        client.get_string("async").await
    })
    .unwrap();

    assert_eq!(value.as_deref(), Some("yes"));
}

#[test]
fn test_awaiting_delayed_completion() {
    let engine = Arc::new(
        MemoryEngine::builder()
            .latency(Duration::from_millis(20))
            .build(),
    );
    let client = Client::connect(engine.clone(), &Config::default()).unwrap();

    let started = Instant::now();
    let pong = block_on(client.ping()).unwrap();
    assert_eq!(pong, "PONG");
    assert!(started.elapsed() >= Duration::from_millis(20));
}

#[test]
fn test_dropped_future_releases_response() {
    let (engine, client) = setup_client();

    client.set("k", "v").get().unwrap();
    let future = client.get("k");
    future.wait();
    drop(future);

    assert_eq!(engine.stats().responses_outstanding(), 0);
}

#[test]
fn test_future_dropped_before_completion() {
    let engine = Arc::new(MemoryEngine::new());
    let client = Client::connect(engine.clone(), &Config::default()).unwrap();

    engine.pause();
    drop(client.set("late", "write"));
    engine.resume();

    // The engine still completes into a live channel
    assert_eq!(client.get_string("late").get().unwrap().as_deref(), Some("write"));
    let deadline = Instant::now() + Duration::from_secs(5);
    while engine.stats().responses_outstanding() > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(engine.stats().responses_outstanding(), 0);
}
