//! # kvbridge
//!
//! Typed, asynchronous Redis/Valkey client core over a C-compatible command
//! engine:
//! - Configuration compiled to the engine's binary connection payload
//! - Single-owner connection handle with one-time teardown
//! - Non-blocking command submission with per-command completion channels
//! - Structured error mapping for engine-reported failures
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Client (typed commands)                     │
//! │        set / get / getdel / hset / hget / custom ...        │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │ Command { request type, args, route }
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                  Connection (conn_ptr)                      │
//! │       token = Arc<ResponseChannel> ──▶ engine.command       │
//! └─────────────────────┬───────────────────────────────────────┘
//!                       │
//! ┌─────────────────────▼───────────────────────────────────────┐
//! │                 Engine (engine threads)                     │
//! │          MemoryEngine  │  NativeEngine (glide_ffi)          │
//! └──────────┬──────────────────────────────────┬───────────────┘
//!            │ on_success(token, response)      │ on_failure(token, msg, kind)
//!            ▼                                  ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │   ResponseChannel (Mutex + Condvar + Waker)         │
//!   └──────────────────────┬──────────────────────────────┘
//!                          ▼
//!   ┌─────────────────────────────────────────────────────┐
//!   │   CommandFuture<T>: wait / get / .await             │
//!   └─────────────────────────────────────────────────────┘
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

// Generated from src/protobuf/*.proto: `connection_request`, `command_request`
include!(concat!(env!("OUT_DIR"), "/protobuf/mod.rs"));

pub mod error;
pub mod config;
pub mod status;

pub mod protocol;
pub mod response;
pub mod channel;
pub mod engine;
pub mod connection;
pub mod client;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{BridgeError, Result};
pub use config::Config;
pub use status::{RequestErrorType, Status, StatusCode};
pub use protocol::{Command, RequestType, Route, ToArg};
pub use response::{FromResponse, Value};
pub use engine::{Engine, MemoryEngine};
pub use connection::Connection;
pub use client::{Client, CommandFuture};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of kvbridge
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
