//! Native Engine
//!
//! Thin binding over the `glide_ffi` shared library.

use std::ffi::c_void;
use std::os::raw::c_ulong;

use super::{ConnectionResponse, Engine, FailureCallback, SuccessCallback};
use crate::response::CommandResponse;

#[link(name = "glide_ffi")]
extern "C" {
    fn create_client(
        connection_request_bytes: *const u8,
        connection_request_len: usize,
        success_callback: SuccessCallback,
        failure_callback: FailureCallback,
    ) -> *const ConnectionResponse;

    fn close_client(client_adapter_ptr: *const c_void);

    fn free_connection_response(connection_response_ptr: *mut ConnectionResponse);

    fn command(
        client_adapter_ptr: *const c_void,
        channel: usize,
        command_type: u32,
        arg_count: c_ulong,
        args: *const usize,
        args_len: *const c_ulong,
        route_bytes: *const u8,
        route_bytes_len: usize,
    );

    fn free_command_response(command_response_ptr: *mut CommandResponse);
}

/// The shared-library command engine
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeEngine;

impl NativeEngine {
    pub fn new() -> Self {
        NativeEngine
    }
}

impl Engine for NativeEngine {
    fn create_client(
        &self,
        request: &[u8],
        success_callback: SuccessCallback,
        failure_callback: FailureCallback,
    ) -> *const ConnectionResponse {
        unsafe {
            create_client(
                request.as_ptr(),
                request.len(),
                success_callback,
                failure_callback,
            )
        }
    }

    unsafe fn close_client(&self, client: *const c_void) {
        unsafe { close_client(client) }
    }

    unsafe fn free_connection_response(&self, response: *mut ConnectionResponse) {
        unsafe { free_connection_response(response) }
    }

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
    ) {
        unsafe {
            command(
                client,
                token,
                request_type,
                arg_count,
                args,
                args_len,
                route,
                route_len,
            )
        }
    }

    unsafe fn free_command_response(&self, response: *mut CommandResponse) {
        unsafe { free_command_response(response) }
    }
}
