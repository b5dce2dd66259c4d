//! Error Mapping
//!
//! Classifies engine-reported error categories into a generic status.
//!
//! | Engine error kind | Status code        |
//! |-------------------|--------------------|
//! | `ExecAbort`       | `Aborted`          |
//! | `Timeout`         | `DeadlineExceeded` |
//! | `Disconnect`      | `Unavailable`      |
//! | `Unspecified`     | `Unknown`          |

use std::fmt;

/// Error category reported by the engine's failure callback
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestErrorType {
    Unspecified = 0,
    ExecAbort = 1,
    Timeout = 2,
    Disconnect = 3,
}

impl RequestErrorType {
    /// Decode a raw discriminant; anything unrecognised is `Unspecified`
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            1 => RequestErrorType::ExecAbort,
            2 => RequestErrorType::Timeout,
            3 => RequestErrorType::Disconnect,
            _ => RequestErrorType::Unspecified,
        }
    }
}

/// Generic status taxonomy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Ok,
    Aborted,
    DeadlineExceeded,
    Unavailable,
    InvalidArgument,
    Unknown,
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StatusCode::Ok => "OK",
            StatusCode::Aborted => "ABORTED",
            StatusCode::DeadlineExceeded => "DEADLINE_EXCEEDED",
            StatusCode::Unavailable => "UNAVAILABLE",
            StatusCode::InvalidArgument => "INVALID_ARGUMENT",
            StatusCode::Unknown => "UNKNOWN",
        };
        f.write_str(name)
    }
}

/// A status code paired with a human-readable message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Status {
    pub code: StatusCode,
    pub message: String,
}

impl Status {
    pub fn new(code: StatusCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.code == StatusCode::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

/// Map an engine error kind and message to a generic status
pub fn to_status(kind: RequestErrorType, message: impl Into<String>) -> Status {
    let code = match kind {
        RequestErrorType::ExecAbort => StatusCode::Aborted,
        RequestErrorType::Timeout => StatusCode::DeadlineExceeded,
        RequestErrorType::Disconnect => StatusCode::Unavailable,
        RequestErrorType::Unspecified => StatusCode::Unknown,
    };
    Status::new(code, message)
}
