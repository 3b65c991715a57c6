#![forbid(unsafe_code)]

//! Shaped transport core of a peer-to-peer mesh stack.
//!
//! Two transports carry application payloads: a low-latency UDP transport
//! with NAT traversal and per-peer liveness, and a reliable WebSocket
//! transport with reconnect. Both run their payloads through a pluggable
//! obfuscation stage and a profile-driven traffic shaper, in a fixed order:
//! framing → obfuscate → shape on the way out, and the exact reverse on the
//! way in.

pub mod config;
pub mod error;
pub mod obfuscation;
pub mod packet;
pub mod peer;
pub mod pipeline;
pub mod shaping;
pub mod udp;
pub mod ws;

pub use config::{load_from_path, TransportConfig, WsClientConfig, WsServerConfig};
pub use error::{Result, TransportError};
pub use obfuscation::Obfuscator;
pub use packet::{Packet, PacketError, PacketType, MAX_PACKET_SIZE};
pub use peer::{PeerRecord, PeerTable};
pub use pipeline::Pipeline;
pub use shaping::{TrafficAnalyzer, TrafficProfile, TrafficShaper};
pub use udp::{HolePuncher, ShapedUdpTransport, TransportStats};
pub use ws::{ConnectionState, ShapedWsClient, ShapedWsServer, WsClientStats, WsServerStats};
