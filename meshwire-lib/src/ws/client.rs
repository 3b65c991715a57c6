#![forbid(unsafe_code)]

use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::Serialize;
use tokio::net::TcpStream;
use tokio::time::sleep;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::WsClientConfig;
use crate::pipeline::Pipeline;
use crate::shaping::{SizeStats, TrafficAnalyzer};
use crate::{Result, TransportError};

/// Connection lifecycle. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Closed => "closed",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An established stream connection. `recv` yields `None` once the peer
/// closes.
#[async_trait]
pub trait WsConn: Send {
    async fn send(&mut self, data: Vec<u8>) -> Result<()>;
    async fn recv(&mut self) -> Result<Option<Vec<u8>>>;
    async fn close(&mut self) -> Result<()>;
}

/// Dials a WebSocket endpoint. The client depends on this seam rather than a
/// concrete stream so connection behavior can be scripted in tests.
#[async_trait]
pub trait WsConnector: Send + Sync {
    async fn connect(&self, uri: &str) -> Result<Box<dyn WsConn>>;
}

/// Default connector over tokio-tungstenite.
pub struct TungsteniteConnector;

#[async_trait]
impl WsConnector for TungsteniteConnector {
    async fn connect(&self, uri: &str) -> Result<Box<dyn WsConn>> {
        let (ws, _response) = connect_async(uri).await?;
        Ok(Box::new(TungsteniteConn { ws }))
    }
}

struct TungsteniteConn {
    ws: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl WsConn for TungsteniteConn {
    async fn send(&mut self, data: Vec<u8>) -> Result<()> {
        self.ws.send(Message::Binary(data)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<Option<Vec<u8>>> {
        while let Some(message) = self.ws.next().await {
            match message {
                Ok(Message::Binary(data)) => return Ok(Some(data)),
                Ok(Message::Text(text)) => return Ok(Some(text.into_bytes())),
                // Tungstenite answers pings on its own.
                Ok(Message::Ping(_)) | Ok(Message::Pong(_)) | Ok(Message::Frame(_)) => continue,
                Ok(Message::Close(_)) => return Ok(None),
                Err(tungstenite::Error::ConnectionClosed)
                | Err(tungstenite::Error::AlreadyClosed) => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
        Ok(None)
    }

    async fn close(&mut self) -> Result<()> {
        let _ = self.ws.close(None).await;
        Ok(())
    }
}

/// Read-only statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct WsClientStats {
    pub state: String,
    pub messages_sent: u64,
    pub messages_received: u64,
    pub bytes_sent: u64,
    pub bytes_received: u64,
    pub traffic_profile: String,
    pub obfuscation: String,
    pub traffic_analysis: SizeStats,
}

/// WebSocket client whose messages run through the obfuscation and shaping
/// stages. Reconnects with exponential backoff when the connection drops;
/// after the attempt budget is exhausted the client is `Closed` for good.
pub struct ShapedWsClient {
    config: WsClientConfig,
    pipeline: Pipeline,
    connector: Box<dyn WsConnector>,
    conn: Option<Box<dyn WsConn>>,
    state: ConnectionState,
    reconnect_attempts: u32,
    messages_sent: u64,
    messages_received: u64,
    bytes_sent: u64,
    bytes_received: u64,
    analyzer: TrafficAnalyzer,
}

impl ShapedWsClient {
    pub fn new(config: WsClientConfig) -> Self {
        Self::with_connector(config, Box::new(TungsteniteConnector))
    }

    pub fn with_connector(config: WsClientConfig, connector: Box<dyn WsConnector>) -> Self {
        let pipeline = Pipeline::for_streams(
            &config.traffic_profile,
            &config.obfuscation,
            &config.obfuscation_key,
        );
        Self {
            config,
            pipeline,
            connector,
            conn: None,
            state: ConnectionState::Disconnected,
            reconnect_attempts: 0,
            messages_sent: 0,
            messages_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            analyzer: TrafficAnalyzer::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub async fn connect(&mut self) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        self.state = ConnectionState::Connecting;
        match self.connector.connect(&self.config.uri).await {
            Ok(conn) => {
                self.conn = Some(conn);
                self.state = ConnectionState::Connected;
                self.reconnect_attempts = 0;
                info!(uri = %self.config.uri, "websocket connected");
                true
            }
            Err(e) => {
                error!(uri = %self.config.uri, error = %e, "websocket connect failed");
                self.state = ConnectionState::Disconnected;
                false
            }
        }
    }

    /// Exponential backoff: attempt i sleeps `reconnect_delay × 2^(i−1)`
    /// before dialing. Exhausting the budget closes the client for good.
    async fn reconnect(&mut self) -> bool {
        if !self.config.auto_reconnect || self.state == ConnectionState::Closed {
            return false;
        }
        while self.reconnect_attempts < self.config.max_reconnect_attempts {
            self.state = ConnectionState::Reconnecting;
            self.reconnect_attempts += 1;
            // The shift cap keeps pathological attempt budgets from
            // overflowing; 2^20 ticks is already nearly a week.
            let exponent = (self.reconnect_attempts - 1).min(20);
            let delay = Duration::from_millis(self.config.reconnect_delay_ms << exponent);
            info!(
                attempt = self.reconnect_attempts,
                delay_s = delay.as_secs_f64(),
                "reconnecting"
            );
            sleep(delay).await;
            if self.connect().await {
                return true;
            }
        }
        error!(
            attempts = self.config.max_reconnect_attempts,
            "reconnect attempts exhausted"
        );
        self.state = ConnectionState::Closed;
        false
    }

    /// Obfuscate, shape, optionally delay, and send one binary message.
    /// A connection lost mid-flight triggers one reconnect-and-retry; `false`
    /// when the message could not be delivered.
    pub async fn send(&mut self, data: &[u8]) -> bool {
        if self.state == ConnectionState::Closed {
            return false;
        }
        if self.state != ConnectionState::Connected || self.conn.is_none() {
            if !self.reconnect().await {
                return false;
            }
        }

        let message = self.pipeline.wrap_message(data);
        let delay = self.pipeline.send_delay();
        if delay > Duration::ZERO {
            sleep(delay).await;
        }

        let Some(conn) = self.conn.as_mut() else {
            return false;
        };
        match conn.send(message.clone()).await {
            Ok(()) => {
                self.note_sent(data.len(), message.len());
                true
            }
            Err(e) => {
                warn!(error = %e, "connection lost during send, reconnecting");
                self.state = ConnectionState::Disconnected;
                self.conn = None;
                if !self.reconnect().await {
                    return false;
                }
                let Some(conn) = self.conn.as_mut() else {
                    return false;
                };
                match conn.send(message.clone()).await {
                    Ok(()) => {
                        self.note_sent(data.len(), message.len());
                        true
                    }
                    Err(e) => {
                        error!(error = %e, "send failed after reconnect");
                        false
                    }
                }
            }
        }
    }

    fn note_sent(&mut self, original: usize, shaped: usize) {
        self.messages_sent += 1;
        self.bytes_sent += shaped as u64;
        self.analyzer.record_packet(shaped);
        debug!(original, shaped, "message sent");
    }

    /// Receive one message, unshaped and deobfuscated. `None` on timeout, on
    /// peer close, or when not connected.
    pub async fn receive(&mut self, timeout: Option<Duration>) -> Option<Vec<u8>> {
        if self.state != ConnectionState::Connected {
            return None;
        }
        let conn = self.conn.as_mut()?;
        let received = match timeout {
            Some(limit) => match tokio::time::timeout(limit, conn.recv()).await {
                Ok(received) => received,
                Err(_) => return None,
            },
            None => conn.recv().await,
        };
        match received {
            Ok(Some(raw)) => {
                let data = self.pipeline.unwrap_message(&raw);
                self.messages_received += 1;
                self.bytes_received += raw.len() as u64;
                Some(data)
            }
            Ok(None) => {
                debug!("peer closed the connection");
                self.state = ConnectionState::Disconnected;
                self.conn = None;
                None
            }
            Err(e) => {
                error!(error = %e, "receive failed");
                None
            }
        }
    }

    /// Close for good; subsequent sends return `false`.
    pub async fn close(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            let _ = conn.close().await;
        }
        self.state = ConnectionState::Closed;
        info!("websocket closed");
    }

    pub fn get_stats(&self) -> WsClientStats {
        WsClientStats {
            state: self.state.as_str().to_string(),
            messages_sent: self.messages_sent,
            messages_received: self.messages_received,
            bytes_sent: self.bytes_sent,
            bytes_received: self.bytes_received,
            traffic_profile: self.pipeline.profile_name().to_string(),
            obfuscation: self.pipeline.obfuscation_name().to_string(),
            traffic_analysis: self.analyzer.statistics(),
        }
    }
}
