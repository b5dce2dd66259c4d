//! Connection Handle
//!
//! Owns one engine-side client for its whole lifetime.
//!
//! ## Lifecycle
//! ```text
//! connect(config)
//!   ├─ serialize config        ── fails ──▶ Err, engine never called
//!   ├─ engine.create_client
//!   │    └─ error envelope     ──────────▶ copy message, free envelope, Err
//!   └─ Connection (open)
//! drop
//!   ├─ free_connection_response
//!   └─ close_client
//! ```

use std::ffi::{c_void, CStr};
use std::fmt;
use std::ptr::NonNull;
use std::sync::Arc;

use crate::channel::{on_failure, on_success};
use crate::config::Config;
use crate::engine::{ConnectionResponse, Engine};
use crate::error::{BridgeError, Result};

/// An open engine client
///
/// Not `Clone`: exactly one handle owns the engine client. Share it behind
/// an `Arc` (as `Client` does).
pub struct Connection {
    engine: Arc<dyn Engine>,

    /// Envelope returned by `create_client`, released on drop
    envelope: NonNull<ConnectionResponse>,

    /// Engine client; valid until `close_client`
    client: NonNull<c_void>,
}

// The engine client is safe to drive from any thread concurrently; the
// handle itself is never mutated after construction.
unsafe impl Send for Connection {}
unsafe impl Sync for Connection {}

impl Connection {
    /// Create an engine client for `config`
    pub fn connect(engine: Arc<dyn Engine>, config: &Config) -> Result<Self> {
        let request = config
            .serialize()
            .map_err(|e| BridgeError::ConnectionFailed(format!("Invalid configuration: {}", e)))?;

        let nodes = config.cluster_nodes();
        tracing::info!(
            "Connecting to {} node(s), first {}:{} (tls {:?})",
            nodes.len(),
            nodes.first().map_or("-", |n| n.host.as_str()),
            nodes.first().map_or(0, |n| n.port),
            config.tls_mode()
        );

        let response = engine.create_client(&request, on_success, on_failure);
        let envelope = NonNull::new(response as *mut ConnectionResponse).ok_or_else(|| {
            BridgeError::ConnectionFailed("Engine returned no connection response".to_string())
        })?;

        let (conn_ptr, error_message) = unsafe {
            let envelope = envelope.as_ref();
            (envelope.conn_ptr, envelope.connection_error_message)
        };

        match NonNull::new(conn_ptr as *mut c_void) {
            Some(client) => {
                tracing::info!("Connected");
                Ok(Self {
                    engine,
                    envelope,
                    client,
                })
            }
            None => {
                let message = if error_message.is_null() {
                    "Unknown connection error".to_string()
                } else {
                    unsafe { CStr::from_ptr(error_message) }
                        .to_string_lossy()
                        .into_owned()
                };
                unsafe { engine.free_connection_response(envelope.as_ptr()) };
                tracing::warn!("Connection failed: {}", message);
                Err(BridgeError::ConnectionFailed(message))
            }
        }
    }

    pub fn engine(&self) -> &Arc<dyn Engine> {
        &self.engine
    }

    pub(crate) fn raw_client(&self) -> *const c_void {
        self.client.as_ptr()
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("client", &self.client)
            .finish()
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        tracing::debug!("Closing connection");
        // Envelope first, then the client it refers to.
        unsafe {
            self.engine.free_connection_response(self.envelope.as_ptr());
            self.engine.close_client(self.client.as_ptr());
        }
    }
}
