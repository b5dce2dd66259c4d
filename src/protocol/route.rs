//! Route definitions
//!
//! Optional cluster-targeting metadata attached to a command, carried to the
//! engine as a serialized `Routes` message.

use bytes::Bytes;
use protobuf::Message;

use crate::command_request::{
    routes, ByAddressRoute, Routes, SimpleRoutes, SlotIdRoute, SlotKeyRoute, SlotTypes,
};
use crate::error::{BridgeError, Result};

/// Where in a cluster a command should be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// Every node in the cluster
    AllNodes,

    /// Every primary in the cluster
    AllPrimaries,

    /// Any single node
    Random,

    /// The node owning the slot of `key`
    SlotKey { key: String, replica: bool },

    /// The node owning slot `id`
    SlotId { id: i32, replica: bool },

    /// A specific node
    ByAddress { host: String, port: i32 },
}

impl Route {
    /// Build the `Routes` message for this route
    pub fn to_message(&self) -> Routes {
        let value = match self {
            Route::AllNodes => routes::Value::SimpleRoutes(SimpleRoutes::AllNodes.into()),
            Route::AllPrimaries => routes::Value::SimpleRoutes(SimpleRoutes::AllPrimaries.into()),
            Route::Random => routes::Value::SimpleRoutes(SimpleRoutes::Random.into()),
            Route::SlotKey { key, replica } => {
                let mut route = SlotKeyRoute::new();
                route.slot_type = slot_type(*replica).into();
                route.slot_key = key.clone();
                routes::Value::SlotKeyRoute(route)
            }
            Route::SlotId { id, replica } => {
                let mut route = SlotIdRoute::new();
                route.slot_type = slot_type(*replica).into();
                route.slot_id = *id;
                routes::Value::SlotIdRoute(route)
            }
            Route::ByAddress { host, port } => {
                let mut route = ByAddressRoute::new();
                route.host = host.clone();
                route.port = *port;
                routes::Value::ByAddressRoute(route)
            }
        };

        let mut message = Routes::new();
        message.value = Some(value);
        message
    }

    /// Read a route back from a `Routes` message
    pub fn from_message(message: &Routes) -> Result<Self> {
        let value = message
            .value
            .as_ref()
            .ok_or_else(|| BridgeError::Protocol("Route bytes carry no route".to_string()))?;

        let route = match value {
            routes::Value::SimpleRoutes(simple) => match simple.enum_value() {
                Ok(SimpleRoutes::AllNodes) => Route::AllNodes,
                Ok(SimpleRoutes::AllPrimaries) => Route::AllPrimaries,
                Ok(SimpleRoutes::Random) => Route::Random,
                Err(other) => {
                    return Err(BridgeError::Protocol(format!(
                        "Unknown simple route: {}",
                        other
                    )))
                }
            },
            routes::Value::SlotKeyRoute(route) => Route::SlotKey {
                key: route.slot_key.clone(),
                replica: is_replica(route.slot_type)?,
            },
            routes::Value::SlotIdRoute(route) => Route::SlotId {
                id: route.slot_id,
                replica: is_replica(route.slot_type)?,
            },
            routes::Value::ByAddressRoute(route) => Route::ByAddress {
                host: route.host.clone(),
                port: route.port,
            },
        };

        Ok(route)
    }

    /// Encode to the engine's route bytes
    pub fn encode(&self) -> Result<Bytes> {
        self.to_message()
            .write_to_bytes()
            .map(Bytes::from)
            .map_err(|e| BridgeError::Serialization(format!("Route: {}", e)))
    }

    /// Decode route bytes
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let message = Routes::parse_from_bytes(bytes)
            .map_err(|e| BridgeError::Protocol(format!("Invalid route bytes: {}", e)))?;
        Self::from_message(&message)
    }
}

fn slot_type(replica: bool) -> SlotTypes {
    if replica {
        SlotTypes::Replica
    } else {
        SlotTypes::Primary
    }
}

fn is_replica(slot_type: protobuf::EnumOrUnknown<SlotTypes>) -> Result<bool> {
    match slot_type.enum_value() {
        Ok(SlotTypes::Primary) => Ok(false),
        Ok(SlotTypes::Replica) => Ok(true),
        Err(other) => Err(BridgeError::Protocol(format!("Unknown slot type: {}", other))),
    }
}
