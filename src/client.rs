//! Client
//!
//! Typed commands over a shared connection. Every command returns a
//! `CommandFuture` immediately; the engine completes it from its own thread.
//!
//! ## Argument Layout
//! - `set`:           [key, value]
//! - `get`, `getdel`: [key]
//! - `hset`:          [key, field1, value1, field2, value2, ...]
//! - `hget`:          [key, field]
//!
//! Text and binary arguments share one encoding; embedded zero bytes are
//! preserved.

use std::collections::HashMap;
use std::future::Future;
use std::marker::PhantomData;
use std::os::raw::c_ulong;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::channel::{Completion, ResponseChannel};
use crate::config::Config;
use crate::connection::Connection;
use crate::engine::Engine;
use crate::error::{BridgeError, Result};
use crate::protocol::{Command, RequestType, Route, ToArg};
use crate::response::{FromResponse, Value};
use crate::status::to_status;

/// Handle for issuing commands; cheap to clone and share across threads
#[derive(Debug, Clone)]
pub struct Client {
    connection: Arc<Connection>,
}

impl Client {
    /// Connect through `engine`
    pub fn connect(engine: Arc<dyn Engine>, config: &Config) -> Result<Self> {
        Connection::connect(engine, config).map(Self::from_connection)
    }

    pub fn from_connection(connection: Connection) -> Self {
        Self {
            connection: Arc::new(connection),
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    // =========================================================================
    // Generic submission
    // =========================================================================

    /// Submit a command; never blocks
    pub fn send<T: FromResponse>(&self, command: Command) -> CommandFuture<T> {
        let engine = self.connection.engine();

        let route = match command.routing().map(Route::encode).transpose() {
            Ok(route) => route,
            Err(e) => return CommandFuture::failed(e),
        };

        let args = command.arguments();
        let (arg_ptrs, arg_lens): (Vec<usize>, Vec<c_ulong>) = args
            .iter()
            .map(|arg| (arg.as_ptr() as usize, arg.len() as c_ulong))
            .unzip();
        let (args_ptr, lens_ptr) = if args.is_empty() {
            (std::ptr::null(), std::ptr::null())
        } else {
            (arg_ptrs.as_ptr(), arg_lens.as_ptr())
        };
        let (route_ptr, route_len) = match &route {
            Some(bytes) => (bytes.as_ptr(), bytes.len()),
            None => (std::ptr::null(), 0),
        };

        let channel = ResponseChannel::new(Arc::clone(engine));
        let token = ResponseChannel::into_token(Arc::clone(&channel));

        tracing::trace!(
            request_type = ?command.request_type(),
            args = args.len(),
            token,
            "Submitting command"
        );

        // Arguments and route bytes stay alive until `command` returns.
        unsafe {
            engine.command(
                self.connection.raw_client(),
                token,
                command.request_type() as u32,
                args.len() as c_ulong,
                args_ptr,
                lens_ptr,
                route_ptr,
                route_len,
            );
        }

        CommandFuture::pending(channel)
    }

    /// Submit `request_type` with arguments and an optional route
    pub fn send_with<T, I>(&self, request_type: RequestType, args: I, route: Option<Route>) -> CommandFuture<T>
    where
        T: FromResponse,
        I: IntoIterator,
        I::Item: ToArg,
    {
        let command = Command::new(request_type).args(args);
        match route {
            Some(route) => self.send(command.route(route)),
            None => self.send(command),
        }
    }

    /// Any server command, given as its full argument list (name first)
    pub fn custom_command<T, I>(&self, args: I) -> CommandFuture<T>
    where
        T: FromResponse,
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.send(Command::new(RequestType::CustomCommand).args(args))
    }

    // =========================================================================
    // Strings
    // =========================================================================

    /// SET key value; resolves to true on acknowledgement
    pub fn set<K, V>(&self, key: &K, value: &V) -> CommandFuture<bool>
    where
        K: ToArg + ?Sized,
        V: ToArg + ?Sized,
    {
        self.send(Command::new(RequestType::Set).arg(key).arg(value))
    }

    /// GET key; `None` when the key does not exist
    pub fn get<K: ToArg + ?Sized>(&self, key: &K) -> CommandFuture<Option<Bytes>> {
        self.send(Command::new(RequestType::Get).arg(key))
    }

    /// GET key, decoded as UTF-8 text
    pub fn get_string<K: ToArg + ?Sized>(&self, key: &K) -> CommandFuture<Option<String>> {
        self.send(Command::new(RequestType::Get).arg(key))
    }

    /// GETDEL key; the prior value, or `None`
    pub fn getdel<K: ToArg + ?Sized>(&self, key: &K) -> CommandFuture<Option<Bytes>> {
        self.send(Command::new(RequestType::GetDel).arg(key))
    }

    pub fn getdel_string<K: ToArg + ?Sized>(&self, key: &K) -> CommandFuture<Option<String>> {
        self.send(Command::new(RequestType::GetDel).arg(key))
    }

    pub fn mget<I>(&self, keys: I) -> CommandFuture<Vec<Option<Bytes>>>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.send(Command::new(RequestType::MGet).args(keys))
    }

    pub fn append<K, V>(&self, key: &K, value: &V) -> CommandFuture<i64>
    where
        K: ToArg + ?Sized,
        V: ToArg + ?Sized,
    {
        self.send(Command::new(RequestType::Append).arg(key).arg(value))
    }

    pub fn strlen<K: ToArg + ?Sized>(&self, key: &K) -> CommandFuture<i64> {
        self.send(Command::new(RequestType::Strlen).arg(key))
    }

    pub fn incr<K: ToArg + ?Sized>(&self, key: &K) -> CommandFuture<i64> {
        self.send(Command::new(RequestType::Incr).arg(key))
    }

    pub fn incr_by<K: ToArg + ?Sized>(&self, key: &K, delta: i64) -> CommandFuture<i64> {
        self.send(Command::new(RequestType::IncrBy).arg(key).arg(&delta))
    }

    // =========================================================================
    // Keys
    // =========================================================================

    /// DEL keys...; number of keys removed
    pub fn del<I>(&self, keys: I) -> CommandFuture<i64>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.send(Command::new(RequestType::Del).args(keys))
    }

    /// EXISTS keys...; number of keys present
    pub fn exists<I>(&self, keys: I) -> CommandFuture<i64>
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.send(Command::new(RequestType::Exists).args(keys))
    }

    // =========================================================================
    // Hashes
    // =========================================================================

    /// HSET key field value [field value ...]; number of fields added
    ///
    /// Pairs are sent in iteration order.
    pub fn hset<K, I, F, V>(&self, key: &K, fields: I) -> CommandFuture<i64>
    where
        K: ToArg + ?Sized,
        I: IntoIterator<Item = (F, V)>,
        F: ToArg,
        V: ToArg,
    {
        let mut command = Command::new(RequestType::HSet).arg(key);
        for (field, value) in fields {
            command = command.arg(&field).arg(&value);
        }
        self.send(command)
    }

    /// HGET key field; `None` when the key or field does not exist
    pub fn hget<K, F>(&self, key: &K, field: &F) -> CommandFuture<Option<Bytes>>
    where
        K: ToArg + ?Sized,
        F: ToArg + ?Sized,
    {
        self.send(Command::new(RequestType::HGet).arg(key).arg(field))
    }

    pub fn hget_string<K, F>(&self, key: &K, field: &F) -> CommandFuture<Option<String>>
    where
        K: ToArg + ?Sized,
        F: ToArg + ?Sized,
    {
        self.send(Command::new(RequestType::HGet).arg(key).arg(field))
    }

    pub fn hdel<K, I>(&self, key: &K, fields: I) -> CommandFuture<i64>
    where
        K: ToArg + ?Sized,
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.send(Command::new(RequestType::HDel).arg(key).args(fields))
    }

    pub fn hexists<K, F>(&self, key: &K, field: &F) -> CommandFuture<bool>
    where
        K: ToArg + ?Sized,
        F: ToArg + ?Sized,
    {
        self.send(Command::new(RequestType::HExists).arg(key).arg(field))
    }

    pub fn hgetall<K: ToArg + ?Sized>(&self, key: &K) -> CommandFuture<HashMap<Bytes, Bytes>> {
        self.send(Command::new(RequestType::HGetAll).arg(key))
    }

    // =========================================================================
    // Connection
    // =========================================================================

    /// PING; resolves to "PONG"
    pub fn ping(&self) -> CommandFuture<String> {
        self.send(Command::new(RequestType::Ping))
    }

    /// PING message; echoes the message
    pub fn ping_with<M: ToArg + ?Sized>(&self, message: &M) -> CommandFuture<Bytes> {
        self.send(Command::new(RequestType::Ping).arg(message))
    }
}

// =============================================================================
// Result object
// =============================================================================

enum State {
    /// Waiting on (or holding) the engine's completion
    Pending(Arc<ResponseChannel>),

    /// Failed before reaching the engine
    Failed(Option<BridgeError>),
}

/// Not-yet-resolved result of a submitted command
///
/// Resolves exactly once. Waiting never consumes the result; `get`,
/// `try_get` or awaiting the future does.
pub struct CommandFuture<T> {
    state: State,
    _output: PhantomData<fn() -> T>,
}

impl<T: FromResponse> CommandFuture<T> {
    fn pending(channel: Arc<ResponseChannel>) -> Self {
        Self {
            state: State::Pending(channel),
            _output: PhantomData,
        }
    }

    fn failed(error: BridgeError) -> Self {
        Self {
            state: State::Failed(Some(error)),
            _output: PhantomData,
        }
    }

    pub fn is_ready(&self) -> bool {
        match &self.state {
            State::Pending(channel) => channel.is_ready(),
            State::Failed(_) => true,
        }
    }

    /// Block until resolved
    pub fn wait(&self) {
        if let State::Pending(channel) = &self.state {
            channel.wait();
        }
    }

    /// Block for at most `timeout`; true if resolved
    ///
    /// Timing out does not cancel the command.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        match &self.state {
            State::Pending(channel) => channel.wait_for(timeout),
            State::Failed(_) => true,
        }
    }

    /// Block until `deadline` at the latest; true if resolved
    pub fn wait_until(&self, deadline: Instant) -> bool {
        match &self.state {
            State::Pending(channel) => channel.wait_until(deadline),
            State::Failed(_) => true,
        }
    }

    /// Block until resolved and convert the result
    pub fn get(mut self) -> Result<T> {
        self.wait();
        self.take_result()
    }

    /// Convert the result if resolved; hands the future back otherwise
    pub fn try_get(mut self) -> std::result::Result<Result<T>, Self> {
        if self.is_ready() {
            Ok(self.take_result())
        } else {
            Err(self)
        }
    }

    fn take_result(&mut self) -> Result<T> {
        match &mut self.state {
            State::Pending(channel) => resolve(channel.take()),
            State::Failed(error) => Err(error.take().unwrap_or_else(already_taken)),
        }
    }
}

impl<T: FromResponse> Future for CommandFuture<T> {
    type Output = Result<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        match &mut this.state {
            State::Pending(channel) => channel.poll_take(cx).map(resolve),
            State::Failed(error) => Poll::Ready(Err(error.take().unwrap_or_else(already_taken))),
        }
    }
}

impl<T> std::fmt::Debug for CommandFuture<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = match &self.state {
            State::Pending(channel) if channel.is_ready() => "ready",
            State::Pending(_) => "pending",
            State::Failed(_) => "failed",
        };
        f.debug_struct("CommandFuture").field("state", &state).finish()
    }
}

fn already_taken() -> BridgeError {
    BridgeError::Protocol("Result already retrieved".to_string())
}

/// Convert a channel completion into the caller's output type
///
/// The owned response is released once copied.
fn resolve<T: FromResponse>(completion: Option<Completion>) -> Result<T> {
    match completion {
        None => Err(already_taken()),
        Some(Completion::Failed { kind, message }) => Err(to_status(kind, message).into()),
        Some(Completion::Response(None)) => T::from_response(Value::Null),
        Some(Completion::Response(Some(response))) => match response.to_value()? {
            Value::Error(message) => Err(BridgeError::ServerError(message)),
            value => T::from_response(value),
        },
    }
}
