//! Tests for the wire response model
//!
//! These tests verify:
//! - Copying engine-allocated trees into `Value`
//! - Single release of owned responses
//! - Typed conversion through `FromResponse`

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use kvbridge::engine::Engine;
use kvbridge::response::{CommandResponse, OwnedResponse, ResponseType};
use kvbridge::{BridgeError, FromResponse, MemoryEngine, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn string(s: &str) -> Value {
    Value::String(Bytes::copy_from_slice(s.as_bytes()))
}

/// Allocate `value` through the engine and copy it back
fn round_trip(engine: &Arc<MemoryEngine>, value: Value) -> Value {
    let raw = engine.allocate_response(value);
    let owned = unsafe { OwnedResponse::from_raw(raw, engine.clone()) }.unwrap();
    owned.to_value().unwrap()
}

// =============================================================================
// Raw Tree Tests
// =============================================================================

#[test]
fn test_scalar_kinds() {
    let engine = Arc::new(MemoryEngine::new());

    assert_eq!(round_trip(&engine, Value::Null), Value::Null);
    assert_eq!(round_trip(&engine, Value::Int(-42)), Value::Int(-42));
    assert_eq!(round_trip(&engine, Value::Float(2.5)), Value::Float(2.5));
    assert_eq!(round_trip(&engine, Value::Bool(true)), Value::Bool(true));
    assert_eq!(round_trip(&engine, Value::Ok), Value::Ok);
    assert_eq!(
        round_trip(&engine, Value::Error("ERR boom".to_string())),
        Value::Error("ERR boom".to_string())
    );
}

#[test]
fn test_string_exact_length_with_zero_bytes() {
    let engine = Arc::new(MemoryEngine::new());
    let payload = Bytes::from_static(b"\x00head\x00tail\x00");

    assert_eq!(
        round_trip(&engine, Value::String(payload.clone())),
        Value::String(payload)
    );
    assert_eq!(
        round_trip(&engine, Value::String(Bytes::new())),
        Value::String(Bytes::new())
    );
}

#[test]
fn test_nested_tree() {
    let engine = Arc::new(MemoryEngine::new());
    let value = Value::Array(vec![
        Value::Int(1),
        Value::Null,
        Value::Map(vec![
            (string("k1"), Value::Array(vec![string("a"), string("b")])),
            (string("k2"), Value::Set(vec![Value::Int(7)])),
        ]),
        Value::Array(Vec::new()),
    ]);

    assert_eq!(round_trip(&engine, value.clone()), value);
}

#[test]
fn test_owned_response_released_once() {
    let engine = Arc::new(MemoryEngine::new());
    let raw = engine.allocate_response(Value::Array(vec![string("x"), string("y")]));

    let owned = unsafe { OwnedResponse::from_raw(raw, engine.clone()) }.unwrap();
    assert_eq!(owned.kind(), Some(ResponseType::Array));
    assert_eq!(engine.stats().responses_outstanding(), 1);

    drop(owned);
    assert_eq!(engine.stats().command_responses_freed(), 1);
    assert_eq!(engine.stats().responses_outstanding(), 0);
}

#[test]
fn test_owned_response_from_null() {
    let engine: Arc<dyn Engine> = Arc::new(MemoryEngine::new());
    assert!(unsafe { OwnedResponse::from_raw(std::ptr::null_mut(), engine) }.is_none());
}

#[test]
fn test_unknown_response_type() {
    let raw = CommandResponse {
        response_type: 77,
        ..CommandResponse::default()
    };
    assert!(matches!(
        unsafe { Value::from_raw(&raw) },
        Err(BridgeError::Protocol(_))
    ));
}

#[test]
fn test_null_pointer_with_length_rejected() {
    let raw = CommandResponse {
        response_type: ResponseType::String as u32,
        string_value_len: 3,
        ..CommandResponse::default()
    };
    assert!(matches!(
        unsafe { Value::from_raw(&raw) },
        Err(BridgeError::Protocol(_))
    ));
}

// =============================================================================
// FromResponse Tests
// =============================================================================

#[test]
fn test_option_distinguishes_absent_from_empty() {
    assert_eq!(Option::<Bytes>::from_response(Value::Null).unwrap(), None);
    assert_eq!(
        Option::<Bytes>::from_response(Value::String(Bytes::new())).unwrap(),
        Some(Bytes::new())
    );
}

#[test]
fn test_bool_conversions() {
    assert!(bool::from_response(Value::Ok).unwrap());
    assert!(bool::from_response(Value::Bool(true)).unwrap());
    assert!(bool::from_response(Value::Int(1)).unwrap());
    assert!(!bool::from_response(Value::Int(0)).unwrap());
    assert!(bool::from_response(string("yes")).is_err());
}

#[test]
fn test_integer_conversions() {
    assert_eq!(i64::from_response(Value::Int(5)).unwrap(), 5);
    assert_eq!(i64::from_response(string("-12")).unwrap(), -12);

    match i64::from_response(string("twelve")) {
        Err(BridgeError::UnexpectedResponse { expected, actual }) => {
            assert_eq!(expected, "Int");
            assert_eq!(actual, "String");
        }
        other => panic!("Expected UnexpectedResponse, got {:?}", other),
    }
}

#[test]
fn test_float_conversions() {
    assert_eq!(f64::from_response(Value::Float(1.5)).unwrap(), 1.5);
    assert_eq!(f64::from_response(Value::Int(3)).unwrap(), 3.0);
    assert_eq!(f64::from_response(string("0.25")).unwrap(), 0.25);
}

#[test]
fn test_string_conversions() {
    assert_eq!(String::from_response(string("héllo")).unwrap(), "héllo");
    assert_eq!(String::from_response(Value::Ok).unwrap(), "OK");
    assert!(matches!(
        String::from_response(Value::String(Bytes::from_static(&[0xFF]))),
        Err(BridgeError::Protocol(_))
    ));
    assert!(matches!(
        String::from_response(Value::Int(1)),
        Err(BridgeError::UnexpectedResponse { .. })
    ));
}

#[test]
fn test_vec_conversions() {
    let values = Vec::<Option<String>>::from_response(Value::Array(vec![
        string("a"),
        Value::Null,
        string("c"),
    ]))
    .unwrap();
    assert_eq!(values, vec![Some("a".to_string()), None, Some("c".to_string())]);

    let set = Vec::<i64>::from_response(Value::Set(vec![Value::Int(1), Value::Int(2)])).unwrap();
    assert_eq!(set, vec![1, 2]);
}

#[test]
fn test_map_conversions() {
    let map = HashMap::<String, String>::from_response(Value::Map(vec![
        (string("f1"), string("v1")),
        (string("f2"), string("v2")),
    ]))
    .unwrap();
    assert_eq!(map.len(), 2);
    assert_eq!(map["f1"], "v1");

    let flat = HashMap::<String, i64>::from_response(Value::Array(vec![
        string("a"),
        Value::Int(1),
        string("b"),
        Value::Int(2),
    ]))
    .unwrap();
    assert_eq!(flat["b"], 2);

    assert!(HashMap::<String, String>::from_response(Value::Array(vec![string("odd")])).is_err());
}

#[test]
fn test_display() {
    let value = Value::Array(vec![Value::Int(1), string("a"), Value::Null]);
    assert_eq!(value.to_string(), "[(integer) 1, \"a\", (nil)]");
    assert_eq!(Value::Ok.to_string(), "OK");
}
