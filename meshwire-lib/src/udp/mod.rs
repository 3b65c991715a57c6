#![forbid(unsafe_code)]

//! Shaped UDP transport: socket ownership, receive and maintenance loops,
//! reliability bookkeeping, and NAT traversal primitives.

pub mod hole_punch;
pub mod socket;
pub mod transport;

pub use hole_punch::{HolePuncher, DEFAULT_STUN_SERVER};
pub use socket::{bind_udp, Datagram};
pub use transport::{ShapedUdpTransport, TransportStats};
