//! Command Tests
//!
//! Tests for the request type table and command building.

use kvbridge::protocol::{Command, RequestType, ToArg};

// =============================================================================
// Request Type Tests
// =============================================================================

#[test]
fn test_request_type_discriminants() {
    assert_eq!(RequestType::CustomCommand as u32, 1);
    assert_eq!(RequestType::Get as u32, 1504);
    assert_eq!(RequestType::GetDel as u32, 1505);
    assert_eq!(RequestType::Set as u32, 1517);
    assert_eq!(RequestType::HGet as u32, 603);
    assert_eq!(RequestType::HSet as u32, 613);
}

#[test]
fn test_request_type_from_raw() {
    assert_eq!(RequestType::from_raw(1517), Some(RequestType::Set));
    assert_eq!(RequestType::from_raw(9999), None);
}

#[test]
fn test_request_type_by_name_case_insensitive() {
    assert_eq!(RequestType::from_command_name(b"get"), Some(RequestType::Get));
    assert_eq!(RequestType::from_command_name(b"HgEtAlL"), Some(RequestType::HGetAll));
    assert_eq!(RequestType::from_command_name(b"NOPE"), None);
    assert_eq!(RequestType::CustomCommand.command_name(), None);
}

// =============================================================================
// Command Building Tests
// =============================================================================

#[test]
fn test_command_arguments_in_order() {
    let command = Command::new(RequestType::HSet)
        .arg("user:1")
        .args([("name", "ada"), ("lang", "rust")].iter().flat_map(|(f, v)| [*f, *v]));

    let args: Vec<Vec<u8>> = command.arguments().iter().map(|a| a.to_vec()).collect();
    assert_eq!(
        args,
        vec![
            b"user:1".to_vec(),
            b"name".to_vec(),
            b"ada".to_vec(),
            b"lang".to_vec(),
            b"rust".to_vec(),
        ]
    );
    assert!(command.routing().is_none());
}

#[test]
fn test_text_and_binary_args_share_encoding() {
    assert_eq!("abc".to_arg(), b"abc".to_arg());
    assert_eq!(String::from("abc").to_arg(), vec![b'a', b'b', b'c'].to_arg());
    assert_eq!(42i64.to_arg(), "42".to_arg());
    assert_eq!((&b"\x00\x01"[..]).to_arg().len(), 2);
}

#[test]
fn test_zero_bytes_survive_in_arguments() {
    let command = Command::new(RequestType::Set).arg("k").arg(&b"a\x00b"[..]);
    assert_eq!(&command.arguments()[1][..], b"a\x00b");
}
