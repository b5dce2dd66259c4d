//! Route Tests
//!
//! Tests for route byte encoding.

use kvbridge::protocol::{Command, RequestType, Route, Routes};
use kvbridge::BridgeError;
use protobuf::Message;

#[test]
fn test_simple_routes() {
    for route in [Route::AllNodes, Route::AllPrimaries, Route::Random] {
        let encoded = route.encode().unwrap();
        assert!(!encoded.is_empty());
        assert_eq!(Route::decode(&encoded).unwrap(), route);
    }
}

#[test]
fn test_all_nodes_is_written_explicitly() {
    // zero-valued enum, must not collapse to "no route"
    let encoded = Route::AllNodes.encode().unwrap();
    assert_eq!(&encoded[..], &[0x08, 0x00]);
}

#[test]
fn test_slot_key_route() {
    let route = Route::SlotKey {
        key: "user:{42}".to_string(),
        replica: true,
    };
    let encoded = route.encode().unwrap();
    assert_eq!(Route::decode(&encoded).unwrap(), route);

    let primary = Route::SlotKey {
        key: "user:{42}".to_string(),
        replica: false,
    };
    assert_eq!(Route::decode(&primary.encode().unwrap()).unwrap(), primary);
}

#[test]
fn test_slot_id_route() {
    let route = Route::SlotId { id: 16383, replica: false };
    assert_eq!(Route::decode(&route.encode().unwrap()).unwrap(), route);

    let slot_zero = Route::SlotId { id: 0, replica: true };
    assert_eq!(Route::decode(&slot_zero.encode().unwrap()).unwrap(), slot_zero);
}

#[test]
fn test_by_address_route() {
    let route = Route::ByAddress {
        host: "10.0.0.7".to_string(),
        port: 6379,
    };
    assert_eq!(Route::decode(&route.encode().unwrap()).unwrap(), route);
}

#[test]
fn test_encoded_bytes_match_routes_message() {
    let route = Route::SlotKey {
        key: "orders".to_string(),
        replica: false,
    };
    let encoded = route.encode().unwrap();

    let message = Routes::parse_from_bytes(&encoded).unwrap();
    assert_eq!(message, route.to_message());
    assert_eq!(Route::from_message(&message).unwrap(), route);
}

#[test]
fn test_truncated_bytes_are_rejected() {
    // slot key route claiming ten bytes but carrying two
    assert!(matches!(
        Route::decode(&[0x12, 0x0A, 0x08, 0x01]),
        Err(BridgeError::Protocol(_))
    ));
}

#[test]
fn test_empty_bytes_carry_no_route() {
    assert!(matches!(Route::decode(&[]), Err(BridgeError::Protocol(_))));
}

#[test]
fn test_unknown_simple_route() {
    assert!(matches!(Route::decode(&[0x08, 0x07]), Err(BridgeError::Protocol(_))));
}

#[test]
fn test_command_carries_route() {
    let command = Command::new(RequestType::Ping).route(Route::AllPrimaries);
    assert_eq!(command.routing(), Some(&Route::AllPrimaries));
}
