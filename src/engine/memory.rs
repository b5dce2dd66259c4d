//! In-Memory Engine
//!
//! A self-contained command engine: a per-database key space of strings and
//! hashes behind a `RwLock`, with completions delivered from a pool of
//! worker threads through the same callback contract as the native engine.
//!
//! Commands execute on the submitting thread, so one client's commands take
//! effect in submission order. Only the callback delivery is deferred.

use std::collections::{HashMap, VecDeque};
use std::ffi::{c_char, c_void, CString};
use std::os::raw::{c_long, c_ulong};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use bytes::Bytes;
use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::{Condvar, Mutex, RwLock};
use protobuf::Message;

use super::{ConnectionResponse, Engine, FailureCallback, SuccessCallback};
use crate::config::Credential;
use crate::protocol::{ConnectionRequest, RequestType, Route};
use crate::response::{CommandResponse, Value};
use crate::status::RequestErrorType;

/// Default number of delivery workers
pub const DEFAULT_WORKERS: usize = 4;

// =============================================================================
// Statistics
// =============================================================================

/// Counters of primitive calls made against the engine
#[derive(Debug, Default)]
pub struct EngineStats {
    clients_created: AtomicUsize,
    clients_rejected: AtomicUsize,
    clients_closed: AtomicUsize,
    connection_responses_freed: AtomicUsize,
    commands_submitted: AtomicUsize,
    responses_delivered: AtomicUsize,
    failures_delivered: AtomicUsize,
    command_responses_freed: AtomicUsize,
}

impl EngineStats {
    /// Successful `create_client` calls
    pub fn clients_created(&self) -> usize {
        self.clients_created.load(Ordering::SeqCst)
    }

    /// `create_client` calls answered with an error envelope
    pub fn clients_rejected(&self) -> usize {
        self.clients_rejected.load(Ordering::SeqCst)
    }

    pub fn clients_closed(&self) -> usize {
        self.clients_closed.load(Ordering::SeqCst)
    }

    pub fn connection_responses_freed(&self) -> usize {
        self.connection_responses_freed.load(Ordering::SeqCst)
    }

    pub fn commands_submitted(&self) -> usize {
        self.commands_submitted.load(Ordering::SeqCst)
    }

    /// Non-null responses handed to success callbacks
    pub fn responses_delivered(&self) -> usize {
        self.responses_delivered.load(Ordering::SeqCst)
    }

    pub fn failures_delivered(&self) -> usize {
        self.failures_delivered.load(Ordering::SeqCst)
    }

    pub fn command_responses_freed(&self) -> usize {
        self.command_responses_freed.load(Ordering::SeqCst)
    }

    /// Delivered responses not yet returned through `free_command_response`
    pub fn responses_outstanding(&self) -> usize {
        self.responses_delivered()
            .saturating_sub(self.command_responses_freed())
    }
}

// =============================================================================
// Builder
// =============================================================================

/// Builder for `MemoryEngine`
#[derive(Debug, Clone)]
pub struct MemoryEngineBuilder {
    workers: usize,
    credential: Option<Credential>,
    latency: Duration,
}

impl Default for MemoryEngineBuilder {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            credential: None,
            latency: Duration::ZERO,
        }
    }
}

impl MemoryEngineBuilder {
    /// Number of delivery threads (at least one)
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers.max(1);
        self
    }

    /// Reject clients that do not present this username and password
    pub fn require_auth(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::new(username, password));
        self
    }

    /// Delay applied before each completion is delivered
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn build(self) -> MemoryEngine {
        let (sender, receiver) = channel::unbounded::<Delivery>();
        let stats = Arc::new(EngineStats::default());
        let gate = Arc::new(Gate::new());

        let workers = (0..self.workers)
            .map(|id| {
                let receiver = receiver.clone();
                let stats = Arc::clone(&stats);
                let gate = Arc::clone(&gate);
                let latency = self.latency;
                thread::Builder::new()
                    .name(format!("kvbridge-engine-{}", id))
                    .spawn(move || delivery_loop(receiver, stats, gate, latency))
            })
            .filter_map(|spawned| match spawned {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::error!("Failed to spawn engine worker: {}", e);
                    None
                }
            })
            .collect();

        MemoryEngine {
            keyspace: Keyspace::default(),
            credential: self.credential,
            faults: Mutex::new(VecDeque::new()),
            sender: Some(sender),
            workers: Mutex::new(workers),
            gate,
            stats,
        }
    }
}

// =============================================================================
// Engine
// =============================================================================

/// In-process command engine
pub struct MemoryEngine {
    keyspace: Keyspace,
    credential: Option<Credential>,

    /// Failures injected into upcoming commands, consumed in order
    faults: Mutex<VecDeque<(RequestErrorType, String)>>,

    sender: Option<Sender<Delivery>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    gate: Arc<Gate>,
    stats: Arc<EngineStats>,
}

impl Default for MemoryEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryEngine {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> MemoryEngineBuilder {
        MemoryEngineBuilder::default()
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Hold every completion until `resume` is called
    pub fn pause(&self) {
        self.gate.set_open(false);
    }

    pub fn resume(&self) {
        self.gate.set_open(true);
    }

    /// Fail the next submitted command with the given kind and message
    pub fn fail_next(&self, kind: RequestErrorType, message: impl Into<String>) {
        self.faults.lock().push_back((kind, message.into()));
    }

    /// Number of keys in a database
    pub fn key_count(&self, database_id: u32) -> usize {
        self.keyspace.len(database_id)
    }

    /// Remove every key from every database
    pub fn flush_all(&self) {
        self.keyspace.clear();
    }

    /// Allocate a response tree as if it were being delivered
    ///
    /// The caller owns the result and must release it through
    /// `free_command_response`.
    pub fn allocate_response(&self, value: Value) -> *mut CommandResponse {
        self.stats.responses_delivered.fetch_add(1, Ordering::SeqCst);
        into_raw_response(value) as *mut CommandResponse
    }

    fn reject(&self, message: String) -> *const ConnectionResponse {
        tracing::warn!("Rejecting client: {}", message);
        self.stats.clients_rejected.fetch_add(1, Ordering::SeqCst);

        let message = to_c_message(message);
        Box::into_raw(Box::new(ConnectionResponse {
            conn_ptr: std::ptr::null(),
            connection_error_message: message.into_raw(),
        }))
    }

    fn dispatch(&self, delivery: Delivery) {
        match &self.sender {
            Some(sender) => {
                if let Err(e) = sender.send(delivery) {
                    // Workers are gone; complete inline so the caller is not left waiting.
                    deliver(e.into_inner(), &self.stats);
                }
            }
            None => deliver(delivery, &self.stats),
        }
    }
}

impl Engine for MemoryEngine {
    fn create_client(
        &self,
        request: &[u8],
        success_callback: SuccessCallback,
        failure_callback: FailureCallback,
    ) -> *const ConnectionResponse {
        let request = match ConnectionRequest::parse_from_bytes(request) {
            Ok(request) => request,
            Err(e) => return self.reject(format!("Invalid connection request: {}", e)),
        };

        if request.addresses.is_empty() {
            return self.reject("No addresses provided".to_string());
        }

        if let Some(required) = &self.credential {
            match request.authentication_info.as_ref() {
                Some(given)
                    if given.username == required.username
                        && given.password == required.password => {}
                Some(_) => {
                    return self.reject(
                        "WRONGPASS invalid username-password pair or user is disabled."
                            .to_string(),
                    )
                }
                None => return self.reject("NOAUTH Authentication required.".to_string()),
            }
        }

        let client = Arc::new(ClientState {
            database_id: request.database_id,
            success_callback,
            failure_callback,
        });

        self.stats.clients_created.fetch_add(1, Ordering::SeqCst);
        tracing::debug!(
            "Client created for {}:{} (db {})",
            request.addresses[0].host,
            request.addresses[0].port,
            request.database_id
        );

        Box::into_raw(Box::new(ConnectionResponse {
            conn_ptr: Arc::into_raw(client) as *const c_void,
            connection_error_message: std::ptr::null(),
        }))
    }

    unsafe fn close_client(&self, client: *const c_void) {
        if client.is_null() {
            return;
        }
        // Queued deliveries hold their own reference.
        drop(unsafe { Arc::from_raw(client as *const ClientState) });
        self.stats.clients_closed.fetch_add(1, Ordering::SeqCst);
        tracing::debug!("Client closed");
    }

    unsafe fn free_connection_response(&self, response: *mut ConnectionResponse) {
        if response.is_null() {
            return;
        }
        let response = unsafe { Box::from_raw(response) };
        if !response.connection_error_message.is_null() {
            drop(unsafe { CString::from_raw(response.connection_error_message as *mut c_char) });
        }
        self.stats
            .connection_responses_freed
            .fetch_add(1, Ordering::SeqCst);
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
        self.stats.commands_submitted.fetch_add(1, Ordering::SeqCst);

        let client = unsafe {
            Arc::increment_strong_count(client as *const ClientState);
            Arc::from_raw(client as *const ClientState)
        };
        let args = unsafe { copy_args(arg_count, args, args_len) };

        let fault = self.faults.lock().pop_front();
        let outcome = if let Some((kind, message)) = fault {
            Err((kind, message))
        } else if let Err(e) = unsafe { check_route(route, route_len) } {
            Err((RequestErrorType::Unspecified, e))
        } else {
            match RequestType::from_raw(request_type) {
                Some(request_type) => {
                    tracing::trace!(?request_type, args = args.len(), "Executing");
                    self.keyspace
                        .execute(client.database_id, request_type, &args)
                        .map_err(|message| (RequestErrorType::Unspecified, message))
                }
                None => Err((
                    RequestErrorType::Unspecified,
                    format!("Received invalid request type: {}", request_type),
                )),
            }
        };

        self.dispatch(Delivery {
            client,
            token,
            outcome,
        });
    }

    unsafe fn free_command_response(&self, response: *mut CommandResponse) {
        if response.is_null() {
            return;
        }
        unsafe { free_tree(response) };
        self.stats
            .command_responses_freed
            .fetch_add(1, Ordering::SeqCst);
    }
}

impl Drop for MemoryEngine {
    fn drop(&mut self) {
        // Closing the queue ends the workers once it drains.
        self.sender.take();
        self.gate.set_open(true);

        let current = thread::current().id();
        for handle in self.workers.get_mut().drain(..) {
            // The last reference can be released from inside a callback.
            if handle.thread().id() != current {
                let _ = handle.join();
            }
        }
    }
}

impl std::fmt::Debug for MemoryEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryEngine")
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Delivery
// =============================================================================

/// Per-client state referenced by `conn_ptr`
struct ClientState {
    database_id: u32,
    success_callback: SuccessCallback,
    failure_callback: FailureCallback,
}

struct Delivery {
    client: Arc<ClientState>,
    token: usize,
    outcome: std::result::Result<Value, (RequestErrorType, String)>,
}

fn delivery_loop(
    receiver: Receiver<Delivery>,
    stats: Arc<EngineStats>,
    gate: Arc<Gate>,
    latency: Duration,
) {
    tracing::debug!("Engine worker started");
    while let Ok(delivery) = receiver.recv() {
        gate.wait_open();
        if !latency.is_zero() {
            thread::sleep(latency);
        }
        deliver(delivery, &stats);
    }
    tracing::debug!("Engine worker stopped");
}

fn deliver(delivery: Delivery, stats: &EngineStats) {
    let Delivery {
        client,
        token,
        outcome,
    } = delivery;

    match outcome {
        Ok(value) => {
            let response = into_raw_response(value);
            stats.responses_delivered.fetch_add(1, Ordering::SeqCst);
            unsafe { (client.success_callback)(token, response) };
        }
        Err((kind, message)) => {
            let message = to_c_message(message);
            stats.failures_delivered.fetch_add(1, Ordering::SeqCst);
            // The message is released after the callback returns.
            unsafe { (client.failure_callback)(token, message.as_ptr(), kind as u32) };
        }
    }
}

/// Message as a C string; interior NUL bytes are written as `\0`
fn to_c_message(message: String) -> CString {
    match CString::new(message) {
        Ok(message) => message,
        Err(e) => {
            let escaped = String::from_utf8_lossy(&e.into_vec()).replace('\0', "\\0");
            CString::new(escaped).unwrap_or_default()
        }
    }
}

/// Open/closed latch the workers wait on before delivering
struct Gate {
    open: Mutex<bool>,
    changed: Condvar,
}

impl Gate {
    fn new() -> Self {
        Self {
            open: Mutex::new(true),
            changed: Condvar::new(),
        }
    }

    fn set_open(&self, open: bool) {
        *self.open.lock() = open;
        self.changed.notify_all();
    }

    fn wait_open(&self) {
        let mut open = self.open.lock();
        while !*open {
            self.changed.wait(&mut open);
        }
    }
}

unsafe fn copy_args(count: c_ulong, args: *const usize, args_len: *const c_ulong) -> Vec<Bytes> {
    if count == 0 || args.is_null() || args_len.is_null() {
        return Vec::new();
    }
    let count = count as usize;
    let (ptrs, lens) = unsafe {
        (
            std::slice::from_raw_parts(args, count),
            std::slice::from_raw_parts(args_len, count),
        )
    };
    ptrs.iter()
        .zip(lens)
        .map(|(&ptr, &len)| {
            if len == 0 {
                Bytes::new()
            } else {
                Bytes::copy_from_slice(unsafe {
                    std::slice::from_raw_parts(ptr as *const u8, len as usize)
                })
            }
        })
        .collect()
}

unsafe fn check_route(route: *const u8, route_len: usize) -> std::result::Result<(), String> {
    if route.is_null() || route_len == 0 {
        return Ok(());
    }
    let bytes = unsafe { std::slice::from_raw_parts(route, route_len) };
    Route::decode(bytes)
        .map(|_| ())
        .map_err(|e| format!("Invalid route: {}", e))
}

// =============================================================================
// Key space
// =============================================================================

#[derive(Debug, Clone)]
enum Entry {
    Str(Bytes),
    Hash(HashMap<Bytes, Bytes>),
}

type Database = HashMap<Bytes, Entry>;
type CommandResult = std::result::Result<Value, String>;

const WRONGTYPE: &str = "WRONGTYPE Operation against a key holding the wrong kind of value";
const NOT_INTEGER: &str = "ERR value is not an integer or out of range";

#[derive(Default)]
struct Keyspace {
    databases: RwLock<HashMap<u32, Database>>,
}

impl Keyspace {
    fn len(&self, database_id: u32) -> usize {
        self.databases
            .read()
            .get(&database_id)
            .map_or(0, HashMap::len)
    }

    fn clear(&self) {
        self.databases.write().clear();
    }

    fn execute(&self, db: u32, request_type: RequestType, args: &[Bytes]) -> CommandResult {
        match request_type {
            RequestType::InvalidRequest => Err("ERR invalid request".to_string()),
            RequestType::CustomCommand => {
                let (name, rest) = args
                    .split_first()
                    .ok_or_else(|| "ERR empty command".to_string())?;
                match RequestType::from_command_name(name) {
                    Some(request_type) => self.execute(db, request_type, rest),
                    None => Err(format!(
                        "ERR unknown command '{}'",
                        String::from_utf8_lossy(name)
                    )),
                }
            }
            RequestType::Ping => match args {
                [] => Ok(Value::String(Bytes::from_static(b"PONG"))),
                [message] => Ok(Value::String(message.clone())),
                _ => Err(arity(request_type)),
            },
            RequestType::Get => {
                let [key] = args else {
                    return Err(arity(request_type));
                };
                self.read(db, |data| match data.get(key) {
                    Some(Entry::Str(value)) => Ok(Value::String(value.clone())),
                    Some(Entry::Hash(_)) => Err(WRONGTYPE.to_string()),
                    None => Ok(Value::Null),
                })
            }
            RequestType::Set => match args {
                [key, value] => self.write(db, |data| {
                    data.insert(key.clone(), Entry::Str(value.clone()));
                    Ok(Value::Ok)
                }),
                [_, _, ..] => Err("ERR syntax error".to_string()),
                _ => Err(arity(request_type)),
            },
            RequestType::GetDel => {
                let [key] = args else {
                    return Err(arity(request_type));
                };
                self.write(db, |data| {
                    if let Some(Entry::Hash(_)) = data.get(key) {
                        return Err(WRONGTYPE.to_string());
                    }
                    match data.remove(key) {
                        Some(Entry::Str(value)) => Ok(Value::String(value)),
                        _ => Ok(Value::Null),
                    }
                })
            }
            RequestType::Del => {
                if args.is_empty() {
                    return Err(arity(request_type));
                }
                self.write(db, |data| {
                    let removed = args.iter().filter(|key| data.remove(*key).is_some()).count();
                    Ok(Value::Int(removed as i64))
                })
            }
            RequestType::Exists => {
                if args.is_empty() {
                    return Err(arity(request_type));
                }
                self.read(db, |data| {
                    let found = args.iter().filter(|key| data.contains_key(*key)).count();
                    Ok(Value::Int(found as i64))
                })
            }
            RequestType::Incr => {
                let [key] = args else {
                    return Err(arity(request_type));
                };
                self.write(db, |data| increment(data, key, 1))
            }
            RequestType::IncrBy => {
                let [key, delta] = args else {
                    return Err(arity(request_type));
                };
                let delta = parse_int(delta).ok_or_else(|| NOT_INTEGER.to_string())?;
                self.write(db, |data| increment(data, key, delta))
            }
            RequestType::Append => {
                let [key, suffix] = args else {
                    return Err(arity(request_type));
                };
                self.write(db, |data| {
                    let appended = match data.get(key) {
                        Some(Entry::Hash(_)) => return Err(WRONGTYPE.to_string()),
                        Some(Entry::Str(current)) => {
                            let mut joined = Vec::with_capacity(current.len() + suffix.len());
                            joined.extend_from_slice(current);
                            joined.extend_from_slice(suffix);
                            Bytes::from(joined)
                        }
                        None => suffix.clone(),
                    };
                    let len = appended.len();
                    data.insert(key.clone(), Entry::Str(appended));
                    Ok(Value::Int(len as i64))
                })
            }
            RequestType::Strlen => {
                let [key] = args else {
                    return Err(arity(request_type));
                };
                self.read(db, |data| match data.get(key) {
                    Some(Entry::Str(value)) => Ok(Value::Int(value.len() as i64)),
                    Some(Entry::Hash(_)) => Err(WRONGTYPE.to_string()),
                    None => Ok(Value::Int(0)),
                })
            }
            RequestType::MGet => {
                if args.is_empty() {
                    return Err(arity(request_type));
                }
                self.read(db, |data| {
                    let values = args
                        .iter()
                        .map(|key| match data.get(key) {
                            Some(Entry::Str(value)) => Value::String(value.clone()),
                            _ => Value::Null,
                        })
                        .collect();
                    Ok(Value::Array(values))
                })
            }
            RequestType::HSet => {
                if args.len() < 3 || args.len() % 2 == 0 {
                    return Err(arity(request_type));
                }
                let (key, pairs) = (&args[0], &args[1..]);
                self.write(db, |data| {
                    let entry = data
                        .entry(key.clone())
                        .or_insert_with(|| Entry::Hash(HashMap::new()));
                    let Entry::Hash(fields) = entry else {
                        return Err(WRONGTYPE.to_string());
                    };
                    let added = pairs
                        .chunks_exact(2)
                        .filter(|pair| fields.insert(pair[0].clone(), pair[1].clone()).is_none())
                        .count();
                    Ok(Value::Int(added as i64))
                })
            }
            RequestType::HGet => {
                let [key, field] = args else {
                    return Err(arity(request_type));
                };
                self.read(db, |data| match data.get(key) {
                    Some(Entry::Hash(fields)) => Ok(fields
                        .get(field)
                        .map_or(Value::Null, |v| Value::String(v.clone()))),
                    Some(Entry::Str(_)) => Err(WRONGTYPE.to_string()),
                    None => Ok(Value::Null),
                })
            }
            RequestType::HExists => {
                let [key, field] = args else {
                    return Err(arity(request_type));
                };
                self.read(db, |data| match data.get(key) {
                    Some(Entry::Hash(fields)) => Ok(Value::Int(fields.contains_key(field) as i64)),
                    Some(Entry::Str(_)) => Err(WRONGTYPE.to_string()),
                    None => Ok(Value::Int(0)),
                })
            }
            RequestType::HDel => {
                if args.len() < 2 {
                    return Err(arity(request_type));
                }
                let (key, fields) = (&args[0], &args[1..]);
                self.write(db, |data| {
                    let (removed, now_empty) = match data.get_mut(key) {
                        Some(Entry::Hash(existing)) => {
                            let removed = fields
                                .iter()
                                .filter(|field| existing.remove(*field).is_some())
                                .count();
                            (removed, existing.is_empty())
                        }
                        Some(Entry::Str(_)) => return Err(WRONGTYPE.to_string()),
                        None => (0, false),
                    };
                    if now_empty {
                        data.remove(key);
                    }
                    Ok(Value::Int(removed as i64))
                })
            }
            RequestType::HGetAll => {
                let [key] = args else {
                    return Err(arity(request_type));
                };
                self.read(db, |data| match data.get(key) {
                    Some(Entry::Hash(fields)) => Ok(Value::Map(
                        fields
                            .iter()
                            .map(|(f, v)| (Value::String(f.clone()), Value::String(v.clone())))
                            .collect(),
                    )),
                    Some(Entry::Str(_)) => Err(WRONGTYPE.to_string()),
                    None => Ok(Value::Map(Vec::new())),
                })
            }
        }
    }

    fn read<F>(&self, db: u32, f: F) -> CommandResult
    where
        F: FnOnce(&Database) -> CommandResult,
    {
        let databases = self.databases.read();
        match databases.get(&db) {
            Some(data) => f(data),
            None => f(&Database::new()),
        }
    }

    fn write<F>(&self, db: u32, f: F) -> CommandResult
    where
        F: FnOnce(&mut Database) -> CommandResult,
    {
        let mut databases = self.databases.write();
        f(databases.entry(db).or_default())
    }
}

fn arity(request_type: RequestType) -> String {
    format!(
        "ERR wrong number of arguments for '{}' command",
        request_type
            .command_name()
            .unwrap_or("unknown")
            .to_ascii_lowercase()
    )
}

fn parse_int(bytes: &[u8]) -> Option<i64> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

fn increment(data: &mut Database, key: &Bytes, delta: i64) -> CommandResult {
    let current = match data.get(key) {
        Some(Entry::Str(value)) => parse_int(value).ok_or_else(|| NOT_INTEGER.to_string())?,
        Some(Entry::Hash(_)) => return Err(WRONGTYPE.to_string()),
        None => 0,
    };
    let next = current
        .checked_add(delta)
        .ok_or_else(|| "ERR increment or decrement would overflow".to_string())?;
    data.insert(key.clone(), Entry::Str(Bytes::from(next.to_string())));
    Ok(Value::Int(next))
}

// =============================================================================
// Response allocation
// =============================================================================

/// Allocate an engine-owned response tree; released by `free_tree`
fn into_raw_response(value: Value) -> *const CommandResponse {
    Box::into_raw(Box::new(build_response(value)))
}

fn build_response(value: Value) -> CommandResponse {
    let mut response = CommandResponse {
        response_type: value.kind() as u32,
        ..CommandResponse::default()
    };

    match value {
        Value::Null | Value::Ok => {}
        Value::Int(i) => response.int_value = i,
        Value::Float(v) => response.float_value = v,
        Value::Bool(b) => response.bool_value = b,
        Value::String(bytes) => {
            let (ptr, len) = leak_slice(bytes.to_vec());
            response.string_value = ptr as *mut c_char;
            response.string_value_len = len;
        }
        Value::Error(message) => {
            let (ptr, len) = leak_slice(message.into_bytes());
            response.string_value = ptr as *mut c_char;
            response.string_value_len = len;
        }
        Value::Array(items) => {
            let (ptr, len) = leak_slice(items.into_iter().map(build_response).collect());
            response.array_value = ptr;
            response.array_value_len = len;
        }
        Value::Set(items) => {
            let (ptr, len) = leak_slice(items.into_iter().map(build_response).collect());
            response.sets_value = ptr;
            response.sets_value_len = len;
        }
        Value::Map(pairs) => {
            let entries = pairs
                .into_iter()
                .map(|(key, value)| CommandResponse {
                    map_key: Box::into_raw(Box::new(build_response(key))),
                    map_value: Box::into_raw(Box::new(build_response(value))),
                    ..CommandResponse::default()
                })
                .collect();
            let (ptr, len) = leak_slice(entries);
            response.array_value = ptr;
            response.array_value_len = len;
        }
    }

    response
}

fn leak_slice<T>(items: Vec<T>) -> (*mut T, c_long) {
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let boxed = items.into_boxed_slice();
    let len = boxed.len() as c_long;
    (Box::into_raw(boxed) as *mut T, len)
}

unsafe fn free_tree(response: *mut CommandResponse) {
    let response = unsafe { Box::from_raw(response) };
    unsafe { release_children(&response) };
}

unsafe fn release_children(response: &CommandResponse) {
    unsafe {
        release_slice(response.string_value as *mut u8, response.string_value_len);

        let nested = [
            (response.array_value, response.array_value_len),
            (response.sets_value, response.sets_value_len),
        ];
        for (ptr, len) in nested {
            if let Some(children) = release_slice(ptr, len) {
                for child in children.iter() {
                    release_children(child);
                }
            }
        }

        if !response.map_key.is_null() {
            free_tree(response.map_key);
        }
        if !response.map_value.is_null() {
            free_tree(response.map_value);
        }
    }
}

unsafe fn release_slice<T>(ptr: *mut T, len: c_long) -> Option<Box<[T]>> {
    if ptr.is_null() || len <= 0 {
        return None;
    }
    Some(unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len as usize)) })
}
