//! Live Channel Client
//!
//! Socket.IO client over the Engine.IO WebSocket transport. The connection
//! runs in its own task and reports [`ChannelEvent`]s, in arrival order, to
//! whoever holds the receiving end. Dropping or closing the
//! [`ChannelHandle`] tears the connection down.

use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use url::Url;

use super::messages::{decode_server_event, ChannelEvent, DisconnectReason};
use super::packet::{EnginePacket, SocketPacket, ENGINE_PROTOCOL};
use crate::config::Config;

/// How long to wait for the Engine.IO open packet
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(20);

/// How long `close` waits for a clean shutdown before aborting
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Resolved connection settings for the live channel
#[derive(Debug, Clone)]
pub struct ChannelSettings {
    /// WebSocket URL including the Engine.IO query
    pub url: Url,
    /// Socket.IO namespace to join
    pub namespace: String,
    pub reconnect: bool,
    /// 0 means unlimited
    pub reconnect_attempts: u32,
    pub reconnect_delay: Duration,
    pub reconnect_delay_max: Duration,
}

impl ChannelSettings {
    pub fn from_config(config: &Config) -> Result<Self, ChannelError> {
        Ok(Self {
            url: channel_url(&config.server.base_url, &config.channel.path)?,
            namespace: normalize_namespace(&config.channel.namespace),
            reconnect: config.channel.reconnect,
            reconnect_attempts: config.channel.reconnect_attempts,
            reconnect_delay: Duration::from_millis(config.channel.reconnect_delay_ms),
            reconnect_delay_max: Duration::from_millis(config.channel.reconnect_delay_max_ms),
        })
    }

    /// Delay before the reconnect following attempt `attempt`: doubles each
    /// time, capped at the configured maximum.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.reconnect_delay
            .saturating_mul(factor)
            .min(self.reconnect_delay_max)
    }

    fn may_retry(&self, attempt: u32) -> bool {
        self.reconnect && (self.reconnect_attempts == 0 || attempt < self.reconnect_attempts)
    }
}

/// Build the WebSocket URL for a Socket.IO endpoint on the HTTP base URL
pub fn channel_url(base_url: &str, path: &str) -> Result<Url, ChannelError> {
    let mut url = Url::parse(base_url)
        .map_err(|e| ChannelError::InvalidUrl(format!("{}: {}", base_url, e)))?;

    let scheme = match url.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(ChannelError::InvalidUrl(format!(
                "unsupported scheme '{}'",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|_| ChannelError::InvalidUrl(base_url.to_string()))?;

    let path = format!("/{}/", path.trim_matches('/'));
    url.set_path(&path);
    url.set_query(Some(&format!("EIO={}&transport=websocket", ENGINE_PROTOCOL)));
    Ok(url)
}

fn normalize_namespace(namespace: &str) -> String {
    let trimmed = namespace.trim();
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{}", trimmed)
    }
}

/// Owner of a running live channel. Closing or dropping it ends the
/// connection.
pub struct ChannelHandle {
    shutdown: Option<oneshot::Sender<()>>,
    task: JoinHandle<()>,
}

impl ChannelHandle {
    /// Open the channel in a background task
    pub fn open(settings: ChannelSettings, events: mpsc::UnboundedSender<ChannelEvent>) -> Self {
        tracing::info!(
            url = %settings.url,
            namespace = %settings.namespace,
            "Opening live channel"
        );

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let task = tokio::spawn(run(settings, events, shutdown_rx));

        Self {
            shutdown: Some(shutdown_tx),
            task,
        }
    }

    /// Whether the transport task has stopped (no more reconnects)
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Leave the namespace, close the transport and wait for the task
    pub async fn close(mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }

        if tokio::time::timeout(CLOSE_TIMEOUT, &mut self.task)
            .await
            .is_err()
        {
            tracing::warn!("Live channel did not close in time, aborting");
            self.task.abort();
        }
    }
}

impl Drop for ChannelHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// How one connection ended
enum Drive {
    Shutdown,
    Lost(DisconnectReason),
}

/// Connection loop: connect, drive, back off, repeat
async fn run(
    settings: ChannelSettings,
    events: mpsc::UnboundedSender<ChannelEvent>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let mut attempt: u32 = 0;

    loop {
        if events.send(ChannelEvent::Connecting { attempt }).is_err() {
            return;
        }

        let connected = tokio::select! {
            _ = &mut shutdown => return,
            result = connect_async(settings.url.as_str()) => result,
        };

        let reason = match connected {
            Ok((stream, _)) => {
                match drive(stream, &settings, &events, &mut shutdown, &mut attempt).await {
                    Drive::Shutdown => return,
                    Drive::Lost(reason) => reason,
                }
            }
            Err(e) => DisconnectReason::TransportError(e.to_string()),
        };

        tracing::warn!(reason = %reason, attempt, "Live channel disconnected");
        if events
            .send(ChannelEvent::Disconnected {
                reason: reason.clone(),
            })
            .is_err()
        {
            return;
        }

        if !reason.allows_reconnect() || !settings.may_retry(attempt) {
            tracing::info!("Live channel stopped");
            return;
        }

        let delay = settings.backoff(attempt);
        attempt += 1;
        tracing::debug!(delay_ms = delay.as_millis() as u64, attempt, "Reconnecting live channel");

        tokio::select! {
            _ = &mut shutdown => return,
            _ = tokio::time::sleep(delay) => {}
        }
    }
}

/// Drive one established WebSocket until it ends
async fn drive(
    stream: WsStream,
    settings: &ChannelSettings,
    events: &mpsc::UnboundedSender<ChannelEvent>,
    shutdown: &mut oneshot::Receiver<()>,
    attempt: &mut u32,
) -> Drive {
    let (mut sink, mut source) = stream.split();
    let mut window = HANDSHAKE_TIMEOUT;
    let mut joined = false;

    loop {
        let next = tokio::select! {
            _ = &mut *shutdown => {
                if joined {
                    let leave = SocketPacket::disconnect(&settings.namespace).into_engine();
                    let _ = sink.send(Message::Text(leave.encode())).await;
                }
                let _ = sink.close().await;
                let _ = events.send(ChannelEvent::Disconnected {
                    reason: DisconnectReason::ClientClose,
                });
                tracing::info!("Live channel closed");
                return Drive::Shutdown;
            }
            next = tokio::time::timeout(window, source.next()) => next,
        };

        let message = match next {
            Err(_) => return Drive::Lost(DisconnectReason::PingTimeout),
            Ok(None) => return Drive::Lost(DisconnectReason::TransportClose),
            Ok(Some(Err(e))) => return Drive::Lost(DisconnectReason::TransportError(e.to_string())),
            Ok(Some(Ok(message))) => message,
        };

        let text = match message {
            Message::Text(text) => text,
            Message::Close(_) => return Drive::Lost(DisconnectReason::TransportClose),
            Message::Binary(data) => {
                tracing::debug!(size = data.len(), "Ignoring binary frame");
                continue;
            }
            _ => continue,
        };

        let packet = match EnginePacket::decode(&text) {
            Ok(packet) => packet,
            Err(e) => {
                tracing::warn!(error = %e, "Invalid Engine.IO packet");
                continue;
            }
        };

        let reply = match packet {
            EnginePacket::Open(handshake) => {
                tracing::debug!(
                    sid = %handshake.sid,
                    ping_interval = handshake.ping_interval,
                    ping_timeout = handshake.ping_timeout,
                    "Engine.IO handshake"
                );
                window = handshake.liveness_window();
                Some(SocketPacket::connect(&settings.namespace).into_engine())
            }
            EnginePacket::Ping(data) => Some(EnginePacket::Pong(data)),
            EnginePacket::Close => return Drive::Lost(DisconnectReason::TransportClose),
            EnginePacket::Message(data) => match SocketPacket::decode(&data) {
                Ok(packet) if packet.namespace() != settings.namespace => {
                    tracing::debug!(namespace = %packet.namespace(), "Ignoring packet for other namespace");
                    None
                }
                Ok(SocketPacket::Connect { payload, .. }) => {
                    joined = true;
                    *attempt = 0;

                    let sid = payload
                        .as_ref()
                        .and_then(|p| p.get("sid"))
                        .and_then(|sid| sid.as_str())
                        .map(str::to_string);
                    tracing::info!(sid = ?sid, "Live channel connected");

                    if events.send(ChannelEvent::Connected { sid }).is_err() {
                        return Drive::Shutdown;
                    }
                    None
                }
                Ok(SocketPacket::Disconnect { .. }) => {
                    return Drive::Lost(DisconnectReason::ServerDisconnect)
                }
                Ok(SocketPacket::ConnectError { payload, .. }) => {
                    let message = payload
                        .as_ref()
                        .and_then(|p| p.get("message"))
                        .and_then(|m| m.as_str())
                        .unwrap_or("connection refused")
                        .to_string();
                    return Drive::Lost(DisconnectReason::ConnectRefused(message));
                }
                Ok(SocketPacket::Event { name, args, .. }) => {
                    if let Some(event) = decode_server_event(&name, args) {
                        if events.send(event).is_err() {
                            return Drive::Shutdown;
                        }
                    }
                    None
                }
                Ok(SocketPacket::Ack { .. }) => None,
                Err(e) => {
                    tracing::warn!(error = %e, "Invalid Socket.IO packet");
                    None
                }
            },
            EnginePacket::Pong(_) | EnginePacket::Upgrade | EnginePacket::Noop => None,
        };

        if let Some(reply) = reply {
            if let Err(e) = sink.send(Message::Text(reply.encode())).await {
                return Drive::Lost(DisconnectReason::TransportError(e.to_string()));
            }
        }
    }
}

/// Live channel errors
#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("Invalid channel URL: {0}")]
    InvalidUrl(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_url_from_http_base() {
        let url = channel_url("http://127.0.0.1:5000", "/socket.io/").unwrap();
        assert_eq!(
            url.as_str(),
            "ws://127.0.0.1:5000/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_channel_url_from_https_base() {
        let url = channel_url("https://leaves.example.com/", "socket.io").unwrap();
        assert_eq!(
            url.as_str(),
            "wss://leaves.example.com/socket.io/?EIO=4&transport=websocket"
        );
    }

    #[test]
    fn test_channel_url_rejects_other_schemes() {
        assert!(channel_url("ftp://example.com", "/socket.io/").is_err());
        assert!(channel_url("not a url", "/socket.io/").is_err());
    }

    #[test]
    fn test_namespace_normalized() {
        assert_eq!(normalize_namespace("/"), "/");
        assert_eq!(normalize_namespace("leaf"), "/leaf");
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let settings = ChannelSettings::from_config(&Config::default()).unwrap();
        assert_eq!(settings.backoff(0), Duration::from_millis(1000));
        assert_eq!(settings.backoff(1), Duration::from_millis(2000));
        assert_eq!(settings.backoff(2), Duration::from_millis(4000));
        assert_eq!(settings.backoff(3), Duration::from_millis(5000));
        assert_eq!(settings.backoff(40), Duration::from_millis(5000));
    }

    #[test]
    fn test_retry_limit() {
        let mut settings = ChannelSettings::from_config(&Config::default()).unwrap();
        assert!(settings.may_retry(1_000));

        settings.reconnect_attempts = 2;
        assert!(settings.may_retry(1));
        assert!(!settings.may_retry(2));

        settings.reconnect = false;
        assert!(!settings.may_retry(0));
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_disconnect() {
        let mut config = Config::default();
        config.server.base_url = "http://127.0.0.1:9".to_string();
        config.channel.reconnect = false;
        let settings = ChannelSettings::from_config(&config).unwrap();

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = ChannelHandle::open(settings, tx);

        assert_eq!(rx.recv().await, Some(ChannelEvent::Connecting { attempt: 0 }));
        match rx.recv().await {
            Some(ChannelEvent::Disconnected {
                reason: DisconnectReason::TransportError(_),
            }) => {}
            other => panic!("Expected transport error, got {:?}", other),
        }
        handle.close().await;
    }
}
