//! Wire Response Model
//!
//! The tagged, recursively-structured result the engine delivers for every
//! successful command, plus an owned copy (`Value`) and the conversion of
//! that copy into typed results.
//!
//! ## Ownership
//! The engine allocates the `CommandResponse` tree. Exactly one call to the
//! engine's free primitive releases the whole tree; `OwnedResponse` is the
//! single owner that makes that call.

use std::collections::HashMap;
use std::ffi::c_char;
use std::fmt;
use std::hash::Hash;
use std::os::raw::c_long;
use std::ptr::NonNull;
use std::sync::Arc;

use bytes::Bytes;

use crate::engine::Engine;
use crate::error::{BridgeError, Result};

/// Active kind of a `CommandResponse`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ResponseType {
    Null = 0,
    Int = 1,
    Float = 2,
    Bool = 3,
    String = 4,
    Array = 5,
    Map = 6,
    Sets = 7,
    Ok = 8,
    Error = 9,
}

impl ResponseType {
    pub fn from_raw(raw: u32) -> Option<Self> {
        let kind = match raw {
            0 => ResponseType::Null,
            1 => ResponseType::Int,
            2 => ResponseType::Float,
            3 => ResponseType::Bool,
            4 => ResponseType::String,
            5 => ResponseType::Array,
            6 => ResponseType::Map,
            7 => ResponseType::Sets,
            8 => ResponseType::Ok,
            9 => ResponseType::Error,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ResponseType::Null => "Null",
            ResponseType::Int => "Int",
            ResponseType::Float => "Float",
            ResponseType::Bool => "Bool",
            ResponseType::String => "String",
            ResponseType::Array => "Array",
            ResponseType::Map => "Map",
            ResponseType::Sets => "Sets",
            ResponseType::Ok => "Ok",
            ResponseType::Error => "Error",
        }
    }
}

/// Engine-allocated command result
///
/// Only the fields matching `response_type` carry meaning.
/// - `String` / `Error`: `string_value` + `string_value_len`
/// - `Array`: `array_value` + `array_value_len`
/// - `Map`: `array_value` + `array_value_len`, each entry holding
///   `map_key` and `map_value`
/// - `Sets`: `sets_value` + `sets_value_len`
#[repr(C)]
#[derive(Debug)]
pub struct CommandResponse {
    pub response_type: u32,
    pub int_value: i64,
    pub float_value: f64,
    pub bool_value: bool,

    pub string_value: *mut c_char,
    pub string_value_len: c_long,

    pub array_value: *mut CommandResponse,
    pub array_value_len: c_long,

    pub map_key: *mut CommandResponse,
    pub map_value: *mut CommandResponse,

    pub sets_value: *mut CommandResponse,
    pub sets_value_len: c_long,
}

impl Default for CommandResponse {
    fn default() -> Self {
        Self {
            response_type: ResponseType::Null as u32,
            int_value: 0,
            float_value: 0.0,
            bool_value: false,
            string_value: std::ptr::null_mut(),
            string_value_len: 0,
            array_value: std::ptr::null_mut(),
            array_value_len: 0,
            map_key: std::ptr::null_mut(),
            map_value: std::ptr::null_mut(),
            sets_value: std::ptr::null_mut(),
            sets_value_len: 0,
        }
    }
}

// =============================================================================
// Owned value tree
// =============================================================================

/// Owned copy of a wire response
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Float(f64),
    Bool(bool),
    /// Byte string of exact length; may contain zero bytes
    String(Bytes),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Set(Vec<Value>),
    /// Status acknowledgement ("OK")
    Ok,
    /// Error reply embedded in a successful response
    Error(String),
}

impl Value {
    pub fn kind(&self) -> ResponseType {
        match self {
            Value::Null => ResponseType::Null,
            Value::Int(_) => ResponseType::Int,
            Value::Float(_) => ResponseType::Float,
            Value::Bool(_) => ResponseType::Bool,
            Value::String(_) => ResponseType::String,
            Value::Array(_) => ResponseType::Array,
            Value::Map(_) => ResponseType::Map,
            Value::Set(_) => ResponseType::Sets,
            Value::Ok => ResponseType::Ok,
            Value::Error(_) => ResponseType::Error,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Copy an engine-allocated tree
    ///
    /// # Safety
    ///
    /// `response` and every pointer reachable from it must be valid for the
    /// kind-specific lengths it declares.
    pub unsafe fn from_raw(response: &CommandResponse) -> Result<Value> {
        let kind = ResponseType::from_raw(response.response_type).ok_or_else(|| {
            BridgeError::Protocol(format!("Unknown response type: {}", response.response_type))
        })?;

        let value = match kind {
            ResponseType::Null => Value::Null,
            ResponseType::Int => Value::Int(response.int_value),
            ResponseType::Float => Value::Float(response.float_value),
            ResponseType::Bool => Value::Bool(response.bool_value),
            ResponseType::Ok => Value::Ok,
            ResponseType::String => {
                let bytes = unsafe {
                    raw_slice(response.string_value as *const u8, response.string_value_len)?
                };
                Value::String(Bytes::copy_from_slice(bytes))
            }
            ResponseType::Error => {
                let bytes = unsafe {
                    raw_slice(response.string_value as *const u8, response.string_value_len)?
                };
                Value::Error(String::from_utf8_lossy(bytes).into_owned())
            }
            ResponseType::Array => {
                let items = unsafe { raw_slice(response.array_value, response.array_value_len)? };
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(unsafe { Value::from_raw(item)? });
                }
                Value::Array(values)
            }
            ResponseType::Sets => {
                let items = unsafe { raw_slice(response.sets_value, response.sets_value_len)? };
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(unsafe { Value::from_raw(item)? });
                }
                Value::Set(values)
            }
            ResponseType::Map => {
                let entries = unsafe { raw_slice(response.array_value, response.array_value_len)? };
                let mut pairs = Vec::with_capacity(entries.len());
                for entry in entries {
                    let key = unsafe { entry.map_key.as_ref() }
                        .ok_or_else(|| BridgeError::Protocol("Map entry without key".to_string()))?;
                    let value = unsafe { entry.map_value.as_ref() }.ok_or_else(|| {
                        BridgeError::Protocol("Map entry without value".to_string())
                    })?;
                    pairs.push(unsafe { (Value::from_raw(key)?, Value::from_raw(value)?) });
                }
                Value::Map(pairs)
            }
        };

        Ok(value)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("(nil)"),
            Value::Int(i) => write!(f, "(integer) {}", i),
            Value::Float(v) => write!(f, "(double) {}", v),
            Value::Bool(b) => write!(f, "(boolean) {}", b),
            Value::String(b) => write!(f, "\"{}\"", String::from_utf8_lossy(b).escape_debug()),
            Value::Ok => f.write_str("OK"),
            Value::Error(e) => write!(f, "(error) {}", e),
            Value::Array(items) | Value::Set(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
            Value::Map(pairs) => {
                f.write_str("{")?;
                for (i, (k, v)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                f.write_str("}")
            }
        }
    }
}

/// View a (pointer, length) pair as a slice
///
/// A null pointer is only accepted together with a zero length.
unsafe fn raw_slice<'a, T>(ptr: *const T, len: c_long) -> Result<&'a [T]> {
    if len < 0 {
        return Err(BridgeError::Protocol(format!("Negative length: {}", len)));
    }
    if ptr.is_null() {
        if len == 0 {
            return Ok(&[]);
        }
        return Err(BridgeError::Protocol(format!(
            "Null pointer with length {}",
            len
        )));
    }
    Ok(unsafe { std::slice::from_raw_parts(ptr, len as usize) })
}

// =============================================================================
// Single-owner handle over an engine-allocated response
// =============================================================================

/// Uniquely-owned engine response; released exactly once on drop
pub struct OwnedResponse {
    ptr: NonNull<CommandResponse>,
    engine: Arc<dyn Engine>,
}

// The tree is immutable once delivered and released through the engine,
// which is itself Send + Sync.
unsafe impl Send for OwnedResponse {}
unsafe impl Sync for OwnedResponse {}

impl OwnedResponse {
    /// Take ownership of a delivered response
    ///
    /// # Safety
    ///
    /// `ptr` must come from `engine` and must not be released by anyone else.
    pub unsafe fn from_raw(ptr: *mut CommandResponse, engine: Arc<dyn Engine>) -> Option<Self> {
        NonNull::new(ptr).map(|ptr| Self { ptr, engine })
    }

    pub fn kind(&self) -> Option<ResponseType> {
        ResponseType::from_raw(self.raw().response_type)
    }

    pub fn raw(&self) -> &CommandResponse {
        // Valid until drop; we are the only owner.
        unsafe { self.ptr.as_ref() }
    }

    /// Copy into an owned `Value`
    pub fn to_value(&self) -> Result<Value> {
        unsafe { Value::from_raw(self.raw()) }
    }
}

impl fmt::Debug for OwnedResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnedResponse")
            .field("ptr", &self.ptr)
            .field("kind", &self.kind())
            .finish()
    }
}

impl Drop for OwnedResponse {
    fn drop(&mut self) {
        unsafe { self.engine.free_command_response(self.ptr.as_ptr()) };
    }
}

// =============================================================================
// Typed conversion
// =============================================================================

/// Conversion from a response value into a typed result
pub trait FromResponse: Sized {
    fn from_response(value: Value) -> Result<Self>;
}

fn unexpected(expected: &'static str, value: &Value) -> BridgeError {
    BridgeError::UnexpectedResponse {
        expected,
        actual: value.kind().name(),
    }
}

impl FromResponse for Value {
    fn from_response(value: Value) -> Result<Self> {
        Ok(value)
    }
}

impl FromResponse for () {
    fn from_response(_value: Value) -> Result<Self> {
        Ok(())
    }
}

impl FromResponse for bool {
    fn from_response(value: Value) -> Result<Self> {
        match value {
            Value::Bool(b) => Ok(b),
            Value::Ok => Ok(true),
            Value::Int(i) => Ok(i != 0),
            other => Err(unexpected("Bool", &other)),
        }
    }
}

impl FromResponse for i64 {
    fn from_response(value: Value) -> Result<Self> {
        match value {
            Value::Int(i) => Ok(i),
            Value::String(ref b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| unexpected("Int", &value)),
            other => Err(unexpected("Int", &other)),
        }
    }
}

impl FromResponse for f64 {
    fn from_response(value: Value) -> Result<Self> {
        match value {
            Value::Float(v) => Ok(v),
            Value::Int(i) => Ok(i as f64),
            Value::String(ref b) => std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| unexpected("Float", &value)),
            other => Err(unexpected("Float", &other)),
        }
    }
}

impl FromResponse for Bytes {
    fn from_response(value: Value) -> Result<Self> {
        match value {
            Value::String(b) => Ok(b),
            Value::Ok => Ok(Bytes::from_static(b"OK")),
            other => Err(unexpected("String", &other)),
        }
    }
}

impl FromResponse for String {
    fn from_response(value: Value) -> Result<Self> {
        let bytes = Bytes::from_response(value)?;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| BridgeError::Protocol(format!("String response is not UTF-8: {}", e)))
    }
}

impl<T: FromResponse> FromResponse for Option<T> {
    fn from_response(value: Value) -> Result<Self> {
        match value {
            Value::Null => Ok(None),
            other => T::from_response(other).map(Some),
        }
    }
}

impl<T: FromResponse> FromResponse for Vec<T> {
    fn from_response(value: Value) -> Result<Self> {
        match value {
            Value::Array(items) | Value::Set(items) => {
                items.into_iter().map(T::from_response).collect()
            }
            other => Err(unexpected("Array", &other)),
        }
    }
}

impl<K, V> FromResponse for HashMap<K, V>
where
    K: FromResponse + Eq + Hash,
    V: FromResponse,
{
    fn from_response(value: Value) -> Result<Self> {
        match value {
            Value::Map(pairs) => pairs
                .into_iter()
                .map(|(k, v)| Ok((K::from_response(k)?, V::from_response(v)?)))
                .collect(),
            // Flat [k1, v1, k2, v2, ...] replies
            Value::Array(items) if items.len() % 2 == 0 => {
                let mut map = HashMap::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                    map.insert(K::from_response(k)?, V::from_response(v)?);
                }
                Ok(map)
            }
            other => Err(unexpected("Map", &other)),
        }
    }
}
