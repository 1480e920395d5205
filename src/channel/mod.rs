//! Live Channel
//!
//! Persistent Socket.IO connection over which the analysis service pushes
//! every new analysis as it happens.
//!
//! ## Architecture
//!
//! - **Packet**: Engine.IO v4 / Socket.IO v5 text codec
//! - **Messages**: channel events and connection status
//! - **Client**: connection task, reconnection and teardown
//!
//! ## Wire example
//!
//! ```text
//! server: 0{"sid":"...","pingInterval":25000,"pingTimeout":20000}
//! client: 40
//! server: 40{"sid":"..."}
//! server: 42["result",{"decision":"Diseased","disease_name":"Leaf Rust",...}]
//! server: 2
//! client: 3
//! ```

mod client;
mod messages;
mod packet;

pub use client::{channel_url, ChannelError, ChannelHandle, ChannelSettings};
pub use messages::{
    decode_server_event, ChannelEvent, ChannelStatus, DisconnectReason, RESULT_EVENT,
};
pub use packet::{EnginePacket, Handshake, PacketError, SocketPacket, DEFAULT_NAMESPACE};
