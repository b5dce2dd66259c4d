//! Configuration for kvbridge
//!
//! Describes the target nodes, credentials, TLS mode, timeouts and read
//! preference of a connection. Built with chained `with_*` mutators and
//! serialized into the engine's `ConnectionRequest` payload.

use std::time::Duration;

use bytes::Bytes;
use protobuf::{Message, MessageField};

use crate::connection_request::{self, AuthenticationInfo, ConnectionRequest, ConnectionRetryStrategy};
use crate::error::{BridgeError, Result};

pub use crate::protocol::{ProtocolVersion, ReadFrom, TlsMode};

/// Default host for the client connection
pub const DEFAULT_HOST: &str = "localhost";

/// Default port for the client connection
pub const DEFAULT_PORT: u32 = 6379;

/// Default request timeout (milliseconds)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u32 = 1000;

/// A server address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NodeAddress {
    pub host: String,
    pub port: u32,
}

impl NodeAddress {
    pub fn new(host: impl Into<String>, port: u32) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    fn to_message(&self) -> connection_request::NodeAddress {
        let mut address = connection_request::NodeAddress::new();
        address.host = self.host.clone();
        address.port = self.port;
        address
    }
}

/// Username/password pair used to authenticate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub username: String,
    pub password: String,
}

impl Credential {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Reconnection backoff handed to the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffStrategy {
    pub number_of_retries: u32,
    pub factor: u32,
    pub exponent_base: u32,
    pub jitter_percent: Option<u32>,
}

impl BackoffStrategy {
    pub fn new(number_of_retries: u32, factor: u32, exponent_base: u32) -> Self {
        Self {
            number_of_retries,
            factor,
            exponent_base,
            jitter_percent: None,
        }
    }

    pub fn with_jitter_percent(mut self, jitter: u32) -> Self {
        self.jitter_percent = Some(jitter);
        self
    }
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Topology
    // -------------------------------------------------------------------------
    /// Seed nodes, in the order given
    cluster_nodes: Vec<NodeAddress>,

    /// Whether the nodes form a cluster
    cluster_mode_enabled: bool,

    /// Preferred node to read from
    read_from: ReadFrom,

    /// Availability zone of the client, used by `ReadFrom::AZAffinity`
    client_az: Option<String>,

    // -------------------------------------------------------------------------
    // Security
    // -------------------------------------------------------------------------
    credential: Option<Credential>,
    tls_mode: TlsMode,

    // -------------------------------------------------------------------------
    // Session
    // -------------------------------------------------------------------------
    database_id: u32,
    client_name: Option<String>,
    protocol: ProtocolVersion,

    // -------------------------------------------------------------------------
    // Timeouts and limits
    // -------------------------------------------------------------------------
    /// Per-request timeout (milliseconds)
    request_timeout_ms: u32,

    /// Connection establishment timeout (milliseconds)
    connection_timeout_ms: Option<u32>,

    /// Max commands in flight per connection
    inflight_requests_limit: Option<u32>,

    reconnect_strategy: Option<BackoffStrategy>,
}

impl Default for Config {
    fn default() -> Self {
        Self::new(DEFAULT_HOST, DEFAULT_PORT)
    }
}

impl Config {
    /// Configuration for a single node
    pub fn new(host: impl Into<String>, port: u32) -> Self {
        Self::with_nodes(vec![NodeAddress::new(host, port)])
    }

    /// Configuration for several seed nodes
    pub fn with_nodes(cluster_nodes: Vec<NodeAddress>) -> Self {
        Self {
            cluster_nodes,
            cluster_mode_enabled: false,
            read_from: ReadFrom::Primary,
            client_az: None,
            credential: None,
            tls_mode: TlsMode::NoTls,
            database_id: 0,
            client_name: None,
            protocol: ProtocolVersion::Resp3,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            connection_timeout_ms: None,
            inflight_requests_limit: None,
            reconnect_strategy: None,
        }
    }

    /// Append a seed node
    pub fn with_node(mut self, host: impl Into<String>, port: u32) -> Self {
        self.cluster_nodes.push(NodeAddress::new(host, port));
        self
    }

    /// Use TLS with certificate verification
    pub fn with_secure_tls(mut self) -> Self {
        self.tls_mode = TlsMode::SecureTls;
        self
    }

    /// Use TLS without certificate verification
    pub fn with_insecure_tls(mut self) -> Self {
        self.tls_mode = TlsMode::InsecureTls;
        self
    }

    pub fn with_tls_mode(mut self, tls_mode: TlsMode) -> Self {
        self.tls_mode = tls_mode;
        self
    }

    pub fn with_database(mut self, database_id: u32) -> Self {
        self.database_id = database_id;
        self
    }

    pub fn with_credential(mut self, username: impl Into<String>, password: impl Into<String>) -> Self {
        self.credential = Some(Credential::new(username, password));
        self
    }

    /// Set the request timeout
    ///
    /// Any granularity is accepted (`Duration::from_secs`, `from_millis`,
    /// `from_nanos`); it is stored as whole milliseconds, saturating at
    /// `u32::MAX`.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout_ms = duration_to_millis(timeout);
        self
    }

    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout_ms = Some(duration_to_millis(timeout));
        self
    }

    pub fn with_client_name(mut self, client_name: impl Into<String>) -> Self {
        self.client_name = Some(client_name.into());
        self
    }

    pub fn with_read_from(mut self, read_from: ReadFrom) -> Self {
        self.read_from = read_from;
        self
    }

    pub fn with_client_az(mut self, client_az: impl Into<String>) -> Self {
        self.client_az = Some(client_az.into());
        self
    }

    pub fn with_cluster_mode(mut self, enabled: bool) -> Self {
        self.cluster_mode_enabled = enabled;
        self
    }

    pub fn with_protocol(mut self, protocol: ProtocolVersion) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn with_inflight_requests_limit(mut self, limit: u32) -> Self {
        self.inflight_requests_limit = Some(limit);
        self
    }

    pub fn with_reconnect_strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.reconnect_strategy = Some(strategy);
        self
    }

    // =========================================================================
    // Serialization
    // =========================================================================

    /// Build the wire message for this configuration
    ///
    /// Fails only when no node is configured. Unset optional fields are left
    /// out of the message.
    pub fn to_connection_request(&self) -> Result<ConnectionRequest> {
        if self.cluster_nodes.is_empty() {
            return Err(BridgeError::Config(
                "at least one cluster node is required".to_string(),
            ));
        }

        let mut request = ConnectionRequest::new();
        request.addresses = self.cluster_nodes.iter().map(NodeAddress::to_message).collect();
        request.tls_mode = self.tls_mode.into();
        request.cluster_mode_enabled = self.cluster_mode_enabled;
        request.request_timeout = self.request_timeout_ms;
        request.read_from = self.read_from.into();
        request.connection_retry_strategy =
            MessageField::from_option(self.reconnect_strategy.map(|s| {
                let mut strategy = ConnectionRetryStrategy::new();
                strategy.number_of_retries = s.number_of_retries;
                strategy.factor = s.factor;
                strategy.exponent_base = s.exponent_base;
                strategy.jitter_percent = s.jitter_percent;
                strategy
            }));
        request.authentication_info = MessageField::from_option(self.credential.as_ref().map(|c| {
            let mut info = AuthenticationInfo::new();
            info.username = c.username.clone();
            info.password = c.password.clone();
            info
        }));
        request.database_id = self.database_id;
        request.protocol = self.protocol.into();
        request.client_name = self.client_name.clone();
        request.inflight_requests_limit = self.inflight_requests_limit;
        request.client_az = self.client_az.clone();
        request.connection_timeout = self.connection_timeout_ms;

        Ok(request)
    }

    /// Serialize into the engine's configuration payload
    ///
    /// Does not modify the configuration; repeated calls yield identical bytes.
    pub fn serialize(&self) -> Result<Bytes> {
        self.to_connection_request()?
            .write_to_bytes()
            .map(Bytes::from)
            .map_err(|e| BridgeError::Serialization(format!("ConnectionRequest: {}", e)))
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn cluster_nodes(&self) -> &[NodeAddress] {
        &self.cluster_nodes
    }

    pub fn tls_mode(&self) -> TlsMode {
        self.tls_mode
    }

    pub fn database_id(&self) -> u32 {
        self.database_id
    }

    pub fn credential(&self) -> Option<&Credential> {
        self.credential.as_ref()
    }

    /// Request timeout in milliseconds
    pub fn request_timeout_ms(&self) -> u32 {
        self.request_timeout_ms
    }

    pub fn client_name(&self) -> Option<&str> {
        self.client_name.as_deref()
    }

    pub fn read_from(&self) -> ReadFrom {
        self.read_from
    }

    pub fn is_cluster_mode(&self) -> bool {
        self.cluster_mode_enabled
    }
}

fn duration_to_millis(duration: Duration) -> u32 {
    u32::try_from(duration.as_millis()).unwrap_or(u32::MAX)
}
