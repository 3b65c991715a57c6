use ahash::AHashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// Liveness and accounting for one remote peer.
#[derive(Debug, Clone)]
pub struct PeerRecord {
    pub addr: SocketAddr,
    pub last_seen: Instant,
    /// Last observed PONG delta; no smoothing.
    pub rtt_ms: u64,
    pub packets_sent: u64,
    pub packets_received: u64,
    /// Reliable sends that exhausted their retry budget.
    pub packets_lost: u64,
}

impl PeerRecord {
    fn new(addr: SocketAddr, now: Instant) -> Self {
        Self {
            addr,
            last_seen: now,
            rtt_ms: 0,
            packets_sent: 0,
            packets_received: 0,
            packets_lost: 0,
        }
    }

    /// Packet loss as a percentage of sends; 0 when nothing was sent.
    pub fn loss_pct(&self) -> f64 {
        if self.packets_sent == 0 {
            return 0.0;
        }
        self.packets_lost as f64 / self.packets_sent as f64 * 100.0
    }

    pub fn idle_for(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_seen)
    }
}

/// Per-address peer table. Entries appear lazily on first send or receive and
/// are removed by `expire`. Single-owner: the transport serializes all access;
/// every operation takes `now` so idle logic needs no clock of its own.
#[derive(Debug, Default)]
pub struct PeerTable {
    peers: AHashMap<SocketAddr, PeerRecord>,
}

impl PeerTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, addr: SocketAddr, now: Instant) -> &mut PeerRecord {
        self.peers
            .entry(addr)
            .or_insert_with(|| PeerRecord::new(addr, now))
    }

    pub fn touch_recv(&mut self, addr: SocketAddr, now: Instant) {
        let peer = self.entry(addr, now);
        peer.last_seen = now;
        peer.packets_received += 1;
    }

    pub fn touch_send(&mut self, addr: SocketAddr, now: Instant) {
        let peer = self.entry(addr, now);
        peer.last_seen = now;
        peer.packets_sent += 1;
    }

    pub fn record_rtt(&mut self, addr: SocketAddr, rtt_ms: u64) {
        if let Some(peer) = self.peers.get_mut(&addr) {
            peer.rtt_ms = rtt_ms;
        }
    }

    pub fn record_loss(&mut self, addr: SocketAddr) {
        if let Some(peer) = self.peers.get_mut(&addr) {
            peer.packets_lost += 1;
        }
    }

    /// Remove and return every peer idle longer than `ttl`.
    pub fn expire(&mut self, now: Instant, ttl: Duration) -> Vec<SocketAddr> {
        let evicted: Vec<SocketAddr> = self
            .peers
            .values()
            .filter(|peer| peer.idle_for(now) > ttl)
            .map(|peer| peer.addr)
            .collect();
        for addr in &evicted {
            self.peers.remove(addr);
        }
        evicted
    }

    /// Peers idle longer than `idle` (but not yet expired).
    pub fn idle_peers(&self, now: Instant, idle: Duration) -> Vec<SocketAddr> {
        self.peers
            .values()
            .filter(|peer| peer.idle_for(now) > idle)
            .map(|peer| peer.addr)
            .collect()
    }

    pub fn get(&self, addr: &SocketAddr) -> Option<&PeerRecord> {
        self.peers.get(addr)
    }

    pub fn snapshot(&self) -> Vec<PeerRecord> {
        self.peers.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.peers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.peers.is_empty()
    }
}
