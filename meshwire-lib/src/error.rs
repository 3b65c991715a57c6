use thiserror::Error;

use crate::packet::PacketError;

/// Errors surfaced by the transports. Background tasks never propagate these;
/// only startup and explicit connection calls do.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("bind failed: {0}")]
    Bind(#[source] std::io::Error),

    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Packet(#[from] PacketError),

    #[error("websocket error: {0}")]
    Ws(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("reconnect attempts exhausted after {0} tries")]
    ReconnectExhausted(u32),
}

pub type Result<T> = std::result::Result<T, TransportError>;
