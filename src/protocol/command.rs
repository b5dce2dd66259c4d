//! Command definitions
//!
//! A command is a request type plus a flat, order-preserving list of
//! byte-string arguments. Text and binary payloads share one encoding.

use bytes::Bytes;

use super::Route;

/// Request types understood by the engine
///
/// Discriminants are the engine's numeric request identifiers. Only the
/// commands issued by this crate are listed; anything else goes through
/// `CustomCommand` with the command name as the first argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum RequestType {
    InvalidRequest = 0,
    CustomCommand = 1,
    Ping = 322,
    Del = 402,
    Exists = 404,
    HDel = 601,
    HExists = 602,
    HGet = 603,
    HGetAll = 604,
    HSet = 613,
    Append = 1501,
    Get = 1504,
    GetDel = 1505,
    Incr = 1509,
    IncrBy = 1510,
    MGet = 1513,
    Set = 1517,
    Strlen = 1521,
}

impl RequestType {
    /// Decode a raw request identifier
    pub fn from_raw(raw: u32) -> Option<Self> {
        let request_type = match raw {
            0 => RequestType::InvalidRequest,
            1 => RequestType::CustomCommand,
            322 => RequestType::Ping,
            402 => RequestType::Del,
            404 => RequestType::Exists,
            601 => RequestType::HDel,
            602 => RequestType::HExists,
            603 => RequestType::HGet,
            604 => RequestType::HGetAll,
            613 => RequestType::HSet,
            1501 => RequestType::Append,
            1504 => RequestType::Get,
            1505 => RequestType::GetDel,
            1509 => RequestType::Incr,
            1510 => RequestType::IncrBy,
            1513 => RequestType::MGet,
            1517 => RequestType::Set,
            1521 => RequestType::Strlen,
            _ => return None,
        };
        Some(request_type)
    }

    /// Server command name
    pub fn command_name(&self) -> Option<&'static str> {
        let name = match self {
            RequestType::InvalidRequest | RequestType::CustomCommand => return None,
            RequestType::Ping => "PING",
            RequestType::Del => "DEL",
            RequestType::Exists => "EXISTS",
            RequestType::HDel => "HDEL",
            RequestType::HExists => "HEXISTS",
            RequestType::HGet => "HGET",
            RequestType::HGetAll => "HGETALL",
            RequestType::HSet => "HSET",
            RequestType::Append => "APPEND",
            RequestType::Get => "GET",
            RequestType::GetDel => "GETDEL",
            RequestType::Incr => "INCR",
            RequestType::IncrBy => "INCRBY",
            RequestType::MGet => "MGET",
            RequestType::Set => "SET",
            RequestType::Strlen => "STRLEN",
        };
        Some(name)
    }

    /// Resolve a server command name (case-insensitive)
    pub fn from_command_name(name: &[u8]) -> Option<Self> {
        const ALL: [RequestType; 16] = [
            RequestType::Ping,
            RequestType::Del,
            RequestType::Exists,
            RequestType::HDel,
            RequestType::HExists,
            RequestType::HGet,
            RequestType::HGetAll,
            RequestType::HSet,
            RequestType::Append,
            RequestType::Get,
            RequestType::GetDel,
            RequestType::Incr,
            RequestType::IncrBy,
            RequestType::MGet,
            RequestType::Set,
            RequestType::Strlen,
        ];
        ALL.into_iter().find(|request_type| {
            request_type
                .command_name()
                .is_some_and(|n| n.as_bytes().eq_ignore_ascii_case(name))
        })
    }
}

/// Conversion of a value into a single command argument
pub trait ToArg {
    fn to_arg(&self) -> Bytes;
}

impl ToArg for [u8] {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self)
    }
}

impl ToArg for str {
    fn to_arg(&self) -> Bytes {
        Bytes::copy_from_slice(self.as_bytes())
    }
}

impl ToArg for String {
    fn to_arg(&self) -> Bytes {
        self.as_str().to_arg()
    }
}

impl ToArg for Vec<u8> {
    fn to_arg(&self) -> Bytes {
        self.as_slice().to_arg()
    }
}

impl<const N: usize> ToArg for [u8; N] {
    fn to_arg(&self) -> Bytes {
        self.as_slice().to_arg()
    }
}

impl ToArg for Bytes {
    fn to_arg(&self) -> Bytes {
        self.clone()
    }
}

impl<T: ToArg + ?Sized> ToArg for &T {
    fn to_arg(&self) -> Bytes {
        (**self).to_arg()
    }
}

macro_rules! numeric_to_arg {
    ($($t:ty),*) => {
        $(
            impl ToArg for $t {
                fn to_arg(&self) -> Bytes {
                    Bytes::from(self.to_string())
                }
            }
        )*
    };
}

numeric_to_arg!(i32, i64, u32, u64, usize, f64);

/// A command ready for submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    request_type: RequestType,
    args: Vec<Bytes>,
    route: Option<Route>,
}

impl Command {
    pub fn new(request_type: RequestType) -> Self {
        Self {
            request_type,
            args: Vec::new(),
            route: None,
        }
    }

    /// Append one argument
    pub fn arg<A: ToArg + ?Sized>(mut self, arg: &A) -> Self {
        self.args.push(arg.to_arg());
        self
    }

    /// Append arguments in iteration order
    pub fn args<I>(mut self, args: I) -> Self
    where
        I: IntoIterator,
        I::Item: ToArg,
    {
        self.args.extend(args.into_iter().map(|a| a.to_arg()));
        self
    }

    /// Target a specific part of the cluster
    pub fn route(mut self, route: Route) -> Self {
        self.route = Some(route);
        self
    }

    pub fn request_type(&self) -> RequestType {
        self.request_type
    }

    pub fn arguments(&self) -> &[Bytes] {
        &self.args
    }

    pub fn routing(&self) -> Option<&Route> {
        self.route.as_ref()
    }
}
