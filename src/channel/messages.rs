//! Live Channel Events
//!
//! What the channel reports to the session, and how server events are
//! turned into those reports.

use serde::Serialize;
use serde_json::Value;

use crate::model::LiveAnalysisResult;

/// Server event carrying a freshly analyzed leaf
pub const RESULT_EVENT: &str = "result";

/// Connection state of the live channel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ChannelStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ChannelStatus::Connected)
    }
}

/// Why the channel went down
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The server left the namespace
    ServerDisconnect,
    /// The transport closed
    TransportClose,
    /// No ping arrived within the liveness window
    PingTimeout,
    /// The transport failed
    TransportError(String),
    /// The server refused the namespace
    ConnectRefused(String),
    /// Closed locally
    ClientClose,
}

impl DisconnectReason {
    /// Whether the transport should try again after this. A server-side
    /// disconnect or refusal is final.
    pub fn allows_reconnect(&self) -> bool {
        !matches!(
            self,
            DisconnectReason::ServerDisconnect
                | DisconnectReason::ConnectRefused(_)
                | DisconnectReason::ClientClose
        )
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DisconnectReason::ServerDisconnect => write!(f, "server disconnect"),
            DisconnectReason::TransportClose => write!(f, "transport close"),
            DisconnectReason::PingTimeout => write!(f, "ping timeout"),
            DisconnectReason::TransportError(e) => write!(f, "transport error: {}", e),
            DisconnectReason::ConnectRefused(e) => write!(f, "connect refused: {}", e),
            DisconnectReason::ClientClose => write!(f, "client close"),
        }
    }
}

/// Events delivered by the live channel, in arrival order
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelEvent {
    /// A (re)connection attempt started
    Connecting { attempt: u32 },
    /// The namespace was joined
    Connected { sid: Option<String> },
    /// The connection was lost or closed
    Disconnected { reason: DisconnectReason },
    /// A pushed analysis
    Result(LiveAnalysisResult),
}

impl ChannelEvent {
    /// Status implied by this event, if any
    pub fn status(&self) -> Option<ChannelStatus> {
        match self {
            ChannelEvent::Connecting { .. } => Some(ChannelStatus::Connecting),
            ChannelEvent::Connected { .. } => Some(ChannelStatus::Connected),
            ChannelEvent::Disconnected { .. } => Some(ChannelStatus::Disconnected),
            ChannelEvent::Result(_) => None,
        }
    }
}

/// Map a server event to a channel event.
///
/// Events other than `result` are ignored; a `result` whose payload does not
/// match the live result shape is dropped with a warning.
pub fn decode_server_event(name: &str, args: Vec<Value>) -> Option<ChannelEvent> {
    if name != RESULT_EVENT {
        tracing::debug!(event = %name, "Ignoring unknown channel event");
        return None;
    }

    let payload = args.into_iter().next()?;
    match serde_json::from_value::<LiveAnalysisResult>(payload) {
        Ok(result) => Some(ChannelEvent::Result(result)),
        Err(e) => {
            tracing::warn!(error = %e, "Malformed result event");
            None
        }
    }
}
