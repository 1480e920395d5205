//! Engine.IO / Socket.IO Packet Codec
//!
//! Text framing for the live channel. Every WebSocket text frame is one
//! Engine.IO v4 packet; Engine.IO `message` packets carry Socket.IO v5
//! packets.
//!
//! ```text
//! Engine.IO:  <type>[data]                          e.g. 2, 3, 4...
//! Socket.IO:  <type>[<nsp>,][<ack id>][json]        e.g. 40, 42["result",{...}]
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;

/// Namespace used when a packet names none
pub const DEFAULT_NAMESPACE: &str = "/";

/// Engine.IO protocol revision spoken by this client
pub const ENGINE_PROTOCOL: u8 = 4;

/// Engine.IO open handshake payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    pub sid: String,
    #[serde(default)]
    pub upgrades: Vec<String>,
    pub ping_interval: u64,
    pub ping_timeout: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_payload: Option<u64>,
}

impl Handshake {
    /// How long the connection may stay silent before it is considered dead
    pub fn liveness_window(&self) -> Duration {
        Duration::from_millis(self.ping_interval + self.ping_timeout)
    }
}

/// Engine.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum EnginePacket {
    Open(Handshake),
    Close,
    Ping(String),
    Pong(String),
    Message(String),
    Upgrade,
    Noop,
}

impl EnginePacket {
    /// Decode one text frame
    pub fn decode(frame: &str) -> Result<Self, PacketError> {
        let mut chars = frame.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let data = chars.as_str();

        match kind {
            '0' => serde_json::from_str(data)
                .map(EnginePacket::Open)
                .map_err(|e| PacketError::InvalidJson(e.to_string())),
            '1' => Ok(EnginePacket::Close),
            '2' => Ok(EnginePacket::Ping(data.to_string())),
            '3' => Ok(EnginePacket::Pong(data.to_string())),
            '4' => Ok(EnginePacket::Message(data.to_string())),
            '5' => Ok(EnginePacket::Upgrade),
            '6' => Ok(EnginePacket::Noop),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    /// Encode as one text frame
    pub fn encode(&self) -> String {
        match self {
            EnginePacket::Open(handshake) => {
                // Handshake holds only strings and integers
                format!("0{}", serde_json::to_string(handshake).unwrap_or_default())
            }
            EnginePacket::Close => "1".to_string(),
            EnginePacket::Ping(data) => format!("2{}", data),
            EnginePacket::Pong(data) => format!("3{}", data),
            EnginePacket::Message(data) => format!("4{}", data),
            EnginePacket::Upgrade => "5".to_string(),
            EnginePacket::Noop => "6".to_string(),
        }
    }
}

/// Socket.IO packet
#[derive(Debug, Clone, PartialEq)]
pub enum SocketPacket {
    Connect {
        namespace: String,
        payload: Option<Value>,
    },
    Disconnect {
        namespace: String,
    },
    Event {
        namespace: String,
        ack_id: Option<u64>,
        name: String,
        args: Vec<Value>,
    },
    Ack {
        namespace: String,
        ack_id: u64,
        args: Vec<Value>,
    },
    ConnectError {
        namespace: String,
        payload: Option<Value>,
    },
}

impl SocketPacket {
    /// Namespace join request sent by the client
    pub fn connect(namespace: &str) -> Self {
        SocketPacket::Connect {
            namespace: namespace.to_string(),
            payload: None,
        }
    }

    /// Namespace leave request sent by the client
    pub fn disconnect(namespace: &str) -> Self {
        SocketPacket::Disconnect {
            namespace: namespace.to_string(),
        }
    }

    /// Build an event packet
    #[cfg(test)]
    pub fn event(namespace: &str, name: &str, args: Vec<Value>) -> Self {
        SocketPacket::Event {
            namespace: namespace.to_string(),
            ack_id: None,
            name: name.to_string(),
            args,
        }
    }

    pub fn namespace(&self) -> &str {
        match self {
            SocketPacket::Connect { namespace, .. }
            | SocketPacket::Disconnect { namespace }
            | SocketPacket::Event { namespace, .. }
            | SocketPacket::Ack { namespace, .. }
            | SocketPacket::ConnectError { namespace, .. } => namespace,
        }
    }

    /// Decode the payload of an Engine.IO message packet
    pub fn decode(data: &str) -> Result<Self, PacketError> {
        let mut chars = data.chars();
        let kind = chars.next().ok_or(PacketError::Empty)?;
        let mut rest = chars.as_str();

        if matches!(kind, '5' | '6') {
            return Err(PacketError::UnsupportedBinary);
        }

        let namespace = if rest.starts_with('/') {
            match rest.find(',') {
                Some(end) => {
                    let namespace = &rest[..end];
                    rest = &rest[end + 1..];
                    namespace.to_string()
                }
                None => {
                    let namespace = rest.to_string();
                    rest = "";
                    namespace
                }
            }
        } else {
            DEFAULT_NAMESPACE.to_string()
        };

        let digits = rest.bytes().take_while(u8::is_ascii_digit).count();
        let ack_id = if digits > 0 {
            let id = rest[..digits]
                .parse::<u64>()
                .map_err(|_| PacketError::InvalidAckId)?;
            rest = &rest[digits..];
            Some(id)
        } else {
            None
        };

        let payload = if rest.is_empty() {
            None
        } else {
            Some(
                serde_json::from_str::<Value>(rest)
                    .map_err(|e| PacketError::InvalidJson(e.to_string()))?,
            )
        };

        match kind {
            '0' => Ok(SocketPacket::Connect { namespace, payload }),
            '1' => Ok(SocketPacket::Disconnect { namespace }),
            '2' => {
                let mut args = match payload {
                    Some(Value::Array(items)) => items,
                    _ => return Err(PacketError::MissingEventName),
                };
                if args.is_empty() {
                    return Err(PacketError::MissingEventName);
                }
                let name = match args.remove(0) {
                    Value::String(name) => name,
                    _ => return Err(PacketError::MissingEventName),
                };
                Ok(SocketPacket::Event {
                    namespace,
                    ack_id,
                    name,
                    args,
                })
            }
            '3' => {
                let ack_id = ack_id.ok_or(PacketError::InvalidAckId)?;
                let args = match payload {
                    Some(Value::Array(items)) => items,
                    Some(other) => vec![other],
                    None => Vec::new(),
                };
                Ok(SocketPacket::Ack {
                    namespace,
                    ack_id,
                    args,
                })
            }
            '4' => Ok(SocketPacket::ConnectError { namespace, payload }),
            other => Err(PacketError::UnknownType(other)),
        }
    }

    /// Encode as the payload of an Engine.IO message packet
    pub fn encode(&self) -> String {
        let (kind, ack_id, payload) = match self {
            SocketPacket::Connect { payload, .. } => ('0', None, payload.clone()),
            SocketPacket::Disconnect { .. } => ('1', None, None),
            SocketPacket::Event {
                ack_id, name, args, ..
            } => {
                let mut items = Vec::with_capacity(args.len() + 1);
                items.push(Value::String(name.clone()));
                items.extend(args.iter().cloned());
                ('2', *ack_id, Some(Value::Array(items)))
            }
            SocketPacket::Ack { ack_id, args, .. } => {
                ('3', Some(*ack_id), Some(Value::Array(args.clone())))
            }
            SocketPacket::ConnectError { payload, .. } => ('4', None, payload.clone()),
        };

        let mut out = String::new();
        out.push(kind);

        let namespace = self.namespace();
        if namespace != DEFAULT_NAMESPACE {
            out.push_str(namespace);
            out.push(',');
        }
        if let Some(id) = ack_id {
            out.push_str(&id.to_string());
        }
        if let Some(payload) = payload {
            out.push_str(&payload.to_string());
        }
        out
    }

    /// Wrap into the Engine.IO packet that carries it
    pub fn into_engine(self) -> EnginePacket {
        EnginePacket::Message(self.encode())
    }
}

/// Codec errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PacketError {
    #[error("Empty packet")]
    Empty,

    #[error("Unknown packet type '{0}'")]
    UnknownType(char),

    #[error("Invalid JSON payload: {0}")]
    InvalidJson(String),

    #[error("Event packet without a name")]
    MissingEventName,

    #[error("Invalid acknowledgement id")]
    InvalidAckId,

    #[error("Binary packets are not supported")]
    UnsupportedBinary,
}
