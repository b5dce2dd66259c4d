//! Engine Module
//!
//! The C-compatible command engine behind every connection.
//!
//! ## Primitives
//! ```text
//! create_client(config bytes, on_success, on_failure) -> *ConnectionResponse
//! free_connection_response(*ConnectionResponse)
//! close_client(conn)
//! command(conn, token, request type, args, route bytes)    (async)
//! free_command_response(*CommandResponse)
//! ```
//!
//! Exactly one of the two callbacks fires per submitted command, on an
//! engine-owned thread, carrying the token it was submitted with.
//!
//! ## Implementations
//! - `MemoryEngine`: in-process key space with a worker pool
//! - `NativeEngine`: the shared `glide_ffi` library (feature `native`)

use std::ffi::{c_char, c_void};
use std::os::raw::c_ulong;

use crate::response::CommandResponse;

mod memory;
#[cfg(feature = "native")]
mod native;

pub use memory::{EngineStats, MemoryEngine, MemoryEngineBuilder, DEFAULT_WORKERS};
#[cfg(feature = "native")]
pub use native::NativeEngine;

/// Success notification: `(token, response or null)`
///
/// Ownership of the response passes to the receiver, who must hand it back
/// through `free_command_response` exactly once.
pub type SuccessCallback = unsafe extern "C" fn(token: usize, response: *const CommandResponse);

/// Failure notification: `(token, message, error kind)`
///
/// The message is only valid for the duration of the call.
pub type FailureCallback =
    unsafe extern "C" fn(token: usize, error_message: *const c_char, error_type: u32);

/// Envelope returned by `create_client`
///
/// Exactly one of the two pointers is non-null.
#[repr(C)]
#[derive(Debug)]
pub struct ConnectionResponse {
    pub conn_ptr: *const c_void,
    pub connection_error_message: *const c_char,
}

/// The command engine's primitive operations
pub trait Engine: Send + Sync + 'static {
    /// Create a client from a serialized `ConnectionRequest`
    ///
    /// The returned envelope must be released with `free_connection_response`.
    fn create_client(
        &self,
        request: &[u8],
        success_callback: SuccessCallback,
        failure_callback: FailureCallback,
    ) -> *const ConnectionResponse;

    /// Close a client created by this engine
    ///
    /// # Safety
    ///
    /// `client` must be a `conn_ptr` from this engine, closed at most once.
    unsafe fn close_client(&self, client: *const c_void);

    /// Release an envelope returned by `create_client`
    ///
    /// # Safety
    ///
    /// `response` must come from this engine and be released at most once.
    unsafe fn free_connection_response(&self, response: *mut ConnectionResponse);

    /// Submit a command; completion arrives through a callback
    ///
    /// # Safety
    ///
    /// `args` and `args_len` must each point at `arg_count` entries (or be
    /// null with a zero count) and stay valid until this call returns. The
    /// same holds for `route` and `route_len`.
    #[allow(clippy::too_many_arguments)]
    unsafe fn command(
        &self,
        client: *const c_void,
        token: usize,
        request_type: u32,
        arg_count: c_ulong,
        args: *const usize,
        args_len: *const c_ulong,
        route: *const u8,
        route_len: usize,
    );

    /// Release a response delivered through the success callback
    ///
    /// # Safety
    ///
    /// `response` must come from this engine and be released at most once.
    unsafe fn free_command_response(&self, response: *mut CommandResponse);
}
