#![forbid(unsafe_code)]

//! Reliable WebSocket transport with the same obfuscation and shaping stages
//! as the UDP path, minus the datagram codec.

pub mod client;
pub mod server;

pub use client::{
    ConnectionState, ShapedWsClient, TungsteniteConnector, WsClientStats, WsConn, WsConnector,
};
pub use server::{ShapedWsServer, WsServerStats};
