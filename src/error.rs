//! Error types for kvbridge
//!
//! Provides a unified error type for connection, command and codec failures.

use thiserror::Error;

use crate::status::{Status, StatusCode};

/// Result type alias using BridgeError
pub type Result<T> = std::result::Result<T, BridgeError>;

/// Unified error type for kvbridge operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    // -------------------------------------------------------------------------
    // Connection Errors
    // -------------------------------------------------------------------------
    /// Serialization or engine-level connect failure. No engine resource is held.
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    // -------------------------------------------------------------------------
    // Command Errors (delivered through the failure callback)
    // -------------------------------------------------------------------------
    #[error("Command aborted: {0}")]
    CommandAborted(String),

    #[error("Command timed out: {0}")]
    CommandTimeout(String),

    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Engine error: {0}")]
    UnknownEngineError(String),

    /// The engine delivered an Error-kind wire response
    #[error("Server error: {0}")]
    ServerError(String),

    // -------------------------------------------------------------------------
    // Decoding Errors
    // -------------------------------------------------------------------------
    #[error("Unexpected response: expected {expected}, got {actual}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BridgeError {
    /// Generic status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            BridgeError::CommandAborted(_) => StatusCode::Aborted,
            BridgeError::CommandTimeout(_) => StatusCode::DeadlineExceeded,
            BridgeError::ConnectionLost(_) | BridgeError::ConnectionFailed(_) => {
                StatusCode::Unavailable
            }
            BridgeError::Config(_) => StatusCode::InvalidArgument,
            BridgeError::UnknownEngineError(_)
            | BridgeError::ServerError(_)
            | BridgeError::UnexpectedResponse { .. }
            | BridgeError::Serialization(_)
            | BridgeError::Protocol(_) => StatusCode::Unknown,
        }
    }

    /// Whether the error came back from an issued command (as opposed to
    /// the connection never being established)
    pub fn is_command_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::CommandAborted(_)
                | BridgeError::CommandTimeout(_)
                | BridgeError::ConnectionLost(_)
                | BridgeError::UnknownEngineError(_)
                | BridgeError::ServerError(_)
        )
    }
}

impl From<Status> for BridgeError {
    fn from(status: Status) -> Self {
        let Status { code, message } = status;
        match code {
            StatusCode::Aborted => BridgeError::CommandAborted(message),
            StatusCode::DeadlineExceeded => BridgeError::CommandTimeout(message),
            StatusCode::Unavailable => BridgeError::ConnectionLost(message),
            StatusCode::InvalidArgument => BridgeError::Config(message),
            StatusCode::Ok | StatusCode::Unknown => BridgeError::UnknownEngineError(message),
        }
    }
}
