#![forbid(unsafe_code)]

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use bytes::{BufMut, BytesMut};
use rand::{rng, Rng};
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, warn};

use crate::udp::socket::bind_udp;
use crate::udp::transport::ShapedUdpTransport;

/// Default STUN endpoint for public-address discovery.
pub const DEFAULT_STUN_SERVER: (&str, u16) = ("stun.l.google.com", 19302);

const STUN_BINDING_REQUEST: u16 = 0x0001;
const STUN_MAGIC_COOKIE: u32 = 0x2112_A442;
const STUN_TRANSACTION_ID_LEN: usize = 12;
const STUN_TIMEOUT: Duration = Duration::from_secs(3);
const PUNCH_SPACING: Duration = Duration::from_millis(100);
const PUNCH_SETTLE: Duration = Duration::from_millis(500);

/// NAT traversal via UDP hole punching: both NATed peers emit datagrams
/// toward each other's observed public addresses to open reciprocal mappings.
pub struct HolePuncher {
    stun_server: (String, u16),
}

impl Default for HolePuncher {
    fn default() -> Self {
        Self::new()
    }
}

impl HolePuncher {
    pub fn new() -> Self {
        Self::with_stun_server(DEFAULT_STUN_SERVER.0, DEFAULT_STUN_SERVER.1)
    }

    pub fn with_stun_server(host: &str, port: u16) -> Self {
        Self { stun_server: (host.to_string(), port) }
    }

    /// Best-effort public-address hint via a single binding-request-shaped
    /// exchange. Whatever the reply says, the result is the local outbound
    /// interface address paired with the bound port; full STUN parsing is not
    /// attempted. `None` on any socket failure.
    pub async fn discover_public_address(&self, local_port: u16) -> Option<(IpAddr, u16)> {
        match self.probe(local_port).await {
            Ok(address) => {
                info!(ip = %address.0, port = address.1, "public address discovered");
                Some(address)
            }
            Err(e) => {
                error!(error = %e, "stun discovery failed");
                None
            }
        }
    }

    async fn probe(&self, local_port: u16) -> io::Result<(IpAddr, u16)> {
        let socket = bind_udp("0.0.0.0", local_port)?;
        let local_port = socket.local_addr()?.port();

        let mut request = BytesMut::with_capacity(20);
        request.put_u16(STUN_BINDING_REQUEST);
        request.put_u16(0);
        request.put_u32(STUN_MAGIC_COOKIE);
        let mut transaction_id = [0u8; STUN_TRANSACTION_ID_LEN];
        rng().fill(&mut transaction_id);
        request.put_slice(&transaction_id);

        let server = (self.stun_server.0.as_str(), self.stun_server.1);
        socket.send_to(&request, server).await?;

        let mut buf = [0u8; 1024];
        match timeout(STUN_TIMEOUT, socket.recv_from(&mut buf)).await {
            Ok(Ok((len, _))) => info!(bytes = len, "stun response received"),
            Ok(Err(e)) => debug!(error = %e, "stun receive failed"),
            Err(_) => warn!("stun timeout, falling back to local address"),
        }

        // Connecting pins the outbound interface; its address is the best
        // local hint available without parsing the reply.
        socket.connect(server).await?;
        let ip = socket.local_addr()?.ip();
        Ok((ip, local_port))
    }

    /// Burst HOLE_PUNCH probes at `peer`, then ping and give the reply time to
    /// land. Success means the transport now has a peer record with a
    /// measured RTT.
    pub async fn punch_hole(
        &self,
        transport: &ShapedUdpTransport,
        peer: SocketAddr,
        attempts: u32,
    ) -> bool {
        for attempt in 1..=attempts {
            transport.send_hole_punch(peer).await;
            debug!(%peer, attempt, "hole punch sent");
            sleep(PUNCH_SPACING).await;
        }

        transport.send_ping(peer).await;
        sleep(PUNCH_SETTLE).await;

        transport
            .get_peer_info(&peer)
            .map(|record| record.rtt_ms > 0)
            .unwrap_or(false)
    }
}
