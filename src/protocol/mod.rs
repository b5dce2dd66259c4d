//! Protocol Module
//!
//! Defines the byte-level contract with the command engine.
//!
//! ## Configuration Payload
//! A protobuf `ConnectionRequest` message (generated into
//! `crate::connection_request`) handed to the engine's create-client
//! primitive.
//!
//! ## Command Submission
//! ```text
//! ┌──────────────┬───────────┬────────────────────────┬──────────────┐
//! │ Request type │ Arg count │ Arg pointers + lengths │ Route bytes  │
//! └──────────────┴───────────┴────────────────────────┴──────────────┘
//! ```
//! Arguments are raw byte strings; embedded zero bytes are preserved.
//!
//! ### Route Bytes
//! A protobuf `Routes` message (generated into `crate::command_request`):
//! - absent:           null pointer, zero length
//! - simple routes:    AllNodes / AllPrimaries / Random
//! - slot key / id:    primary or replica
//! - by address:       host + port

mod command;
mod route;

pub use command::{Command, RequestType, ToArg};
pub use route::Route;

pub use crate::command_request::Routes;
pub use crate::connection_request::{
    AuthenticationInfo, ConnectionRequest, ConnectionRetryStrategy, ProtocolVersion, ReadFrom,
    TlsMode,
};
