#![forbid(unsafe_code)]

use std::io;
use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use ahash::AHashMap;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::TransportConfig;
use crate::packet::{Packet, PacketType, MAX_PACKET_SIZE};
use crate::peer::{PeerRecord, PeerTable};
use crate::pipeline::Pipeline;
use crate::shaping::{SizeStats, TrafficAnalyzer};
use crate::udp::socket::{bind_udp, Datagram};
use crate::TransportError;

const RECV_BUF_LEN: usize = 65535;
const WOULD_BLOCK_PAUSE: Duration = Duration::from_millis(1);
const RECV_ERROR_PAUSE: Duration = Duration::from_millis(10);
const MAINTENANCE_TICK: Duration = Duration::from_secs(1);

type ReceiveHandler = Arc<dyn Fn(&[u8], SocketAddr) + Send + Sync>;
type PeerTimeoutHandler = Arc<dyn Fn(SocketAddr) + Send + Sync>;

/// A reliable DATA packet awaiting acknowledgement.
#[derive(Debug, Clone)]
struct PendingAck {
    packet: Packet,
    destination: SocketAddr,
    retries: u32,
}

/// Peer table and pending-ACK map share one lock: the receive loop, the
/// maintenance loop, and in-flight sends all mutate both, and the lock is
/// never held across an await.
#[derive(Default)]
struct TransportState {
    peers: PeerTable,
    pending_acks: AHashMap<u32, PendingAck>,
}

struct Shared {
    config: TransportConfig,
    pipeline: Pipeline,
    state: Mutex<TransportState>,
    socket: Mutex<Option<Arc<dyn Datagram>>>,
    on_receive: Mutex<Option<ReceiveHandler>>,
    on_peer_timeout: Mutex<Option<PeerTimeoutHandler>>,
    running: AtomicBool,
    sequence: AtomicU32,
    total_sent: AtomicU64,
    total_received: AtomicU64,
    analyzer: TrafficAnalyzer,
}

impl Shared {
    fn next_sequence(&self) -> u32 {
        self.sequence.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
    }
}

/// Read-only statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct TransportStats {
    pub local_address: String,
    pub uptime_seconds: f64,
    pub peers_count: usize,
    pub total_sent: u64,
    pub total_received: u64,
    pub packets_per_second: f64,
    pub traffic_profile: String,
    pub obfuscation: String,
    pub traffic_analysis: SizeStats,
}

/// Low-latency UDP transport with traffic shaping, obfuscation, per-peer
/// liveness, and optional reliable delivery.
///
/// Two background tasks run while started: a receive loop that dispatches
/// inbound packets by type, and a 1 Hz maintenance loop that pings idle
/// peers, evicts silent ones, and ages the pending-ACK map.
pub struct ShapedUdpTransport {
    shared: Arc<Shared>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    local_addr: Mutex<Option<SocketAddr>>,
    started_at: Mutex<Option<Instant>>,
}

impl ShapedUdpTransport {
    pub const PING_INTERVAL: Duration = Duration::from_secs(5);
    pub const PEER_TIMEOUT: Duration = Duration::from_secs(30);
    /// Minimum wait before a reliable packet is treated as unacknowledged.
    pub const ACK_TIMEOUT: Duration = Duration::from_millis(100);
    pub const MAX_RETRIES: u32 = 3;

    pub fn new(config: TransportConfig) -> Self {
        let pipeline = Pipeline::for_datagrams(
            &config.traffic_profile,
            &config.obfuscation,
            &config.obfuscation_key,
        );
        Self {
            shared: Arc::new(Shared {
                config,
                pipeline,
                state: Mutex::new(TransportState::default()),
                socket: Mutex::new(None),
                on_receive: Mutex::new(None),
                on_peer_timeout: Mutex::new(None),
                running: AtomicBool::new(false),
                sequence: AtomicU32::new(0),
                total_sent: AtomicU64::new(0),
                total_received: AtomicU64::new(0),
                analyzer: TrafficAnalyzer::new(),
            }),
            shutdown_tx: Mutex::new(None),
            tasks: Mutex::new(Vec::new()),
            local_addr: Mutex::new(None),
            started_at: Mutex::new(None),
        }
    }

    /// Bind the socket and spawn the receive and maintenance tasks.
    pub async fn start(&self) -> Result<(), TransportError> {
        if self.shared.running.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        let socket = match bind_udp(&self.shared.config.host, self.shared.config.port) {
            Ok(socket) => socket,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(TransportError::Bind(e));
            }
        };
        let local = match socket.local_addr() {
            Ok(local) => local,
            Err(e) => {
                self.shared.running.store(false, Ordering::SeqCst);
                return Err(TransportError::Bind(e));
            }
        };
        let socket: Arc<dyn Datagram> = Arc::new(socket);

        *self.local_addr.lock() = Some(local);
        *self.started_at.lock() = Some(Instant::now());
        *self.shared.socket.lock() = Some(socket.clone());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        let mut tasks = self.tasks.lock();
        tasks.push(tokio::spawn(receive_loop(
            self.shared.clone(),
            socket.clone(),
            shutdown_rx.clone(),
        )));
        tasks.push(tokio::spawn(maintenance_loop(
            self.shared.clone(),
            socket,
            shutdown_rx,
        )));

        info!(%local, profile = self.shared.pipeline.profile_name(), obfuscation = self.shared.pipeline.obfuscation_name(), "udp transport started");
        Ok(())
    }

    /// Signal both tasks, await their exit, and drop the socket. Idempotent.
    pub async fn stop(&self) {
        if !self.shared.running.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }
        let tasks: Vec<JoinHandle<()>> = self.tasks.lock().drain(..).collect();
        for task in tasks {
            let _ = task.await;
        }
        *self.shared.socket.lock() = None;
        info!("udp transport stopped");
    }

    /// Send a DATA packet. Returns `false` (never an error) when the
    /// transport is not running, the shaped datagram exceeds the wire bound,
    /// or the socket write fails.
    pub async fn send_to(&self, data: &[u8], addr: SocketAddr, reliable: bool) -> bool {
        if !self.shared.running.load(Ordering::SeqCst) {
            return false;
        }
        let Some(socket) = self.shared.socket.lock().clone() else {
            return false;
        };

        let requires_ack = reliable || self.shared.config.reliable_mode;
        let packet = Packet::data(
            self.shared.next_sequence(),
            now_ms(),
            data.to_vec(),
            requires_ack,
        );
        let wire = self.shared.pipeline.seal(&packet);
        if wire.len() > MAX_PACKET_SIZE {
            warn!(%addr, len = wire.len(), max = MAX_PACKET_SIZE, "dropping oversized datagram");
            return false;
        }

        // Always suspend at least once here so the receive loop stays
        // responsive under a tight send burst.
        let delay = self.shared.pipeline.send_delay();
        if delay > Duration::ZERO {
            sleep(delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        match socket.send_to(&wire, addr).await {
            Ok(_) => {
                let now = Instant::now();
                let mut state = self.shared.state.lock();
                state.peers.touch_send(addr, now);
                if requires_ack {
                    state.pending_acks.insert(
                        packet.sequence,
                        PendingAck { packet: packet.clone(), destination: addr, retries: 0 },
                    );
                }
                drop(state);
                self.shared.total_sent.fetch_add(1, Ordering::Relaxed);
                self.shared.analyzer.record_packet(wire.len());
                true
            }
            Err(e) => {
                error!(%addr, error = %e, "send failed");
                false
            }
        }
    }

    /// Fire a PING at `addr` to measure RTT. Errors are swallowed.
    pub async fn send_ping(&self, addr: SocketAddr) {
        if !self.shared.running.load(Ordering::SeqCst) {
            return;
        }
        let Some(socket) = self.shared.socket.lock().clone() else {
            return;
        };
        let ping = Packet::ping(self.shared.next_sequence(), now_ms());
        send_control(&self.shared, &socket, &ping, addr).await;
    }

    /// Fire a HOLE_PUNCH probe at `addr` to open a NAT mapping.
    pub async fn send_hole_punch(&self, addr: SocketAddr) {
        if !self.shared.running.load(Ordering::SeqCst) {
            return;
        }
        let Some(socket) = self.shared.socket.lock().clone() else {
            return;
        };
        let punch = Packet::hole_punch(self.shared.next_sequence(), now_ms());
        send_control(&self.shared, &socket, &punch, addr).await;
    }

    /// Register the inbound-data handler; replaces any earlier registration.
    pub fn on_receive<F>(&self, handler: F)
    where
        F: Fn(&[u8], SocketAddr) + Send + Sync + 'static,
    {
        *self.shared.on_receive.lock() = Some(Arc::new(handler));
    }

    /// Register the peer-timeout handler; replaces any earlier registration.
    pub fn on_peer_timeout<F>(&self, handler: F)
    where
        F: Fn(SocketAddr) + Send + Sync + 'static,
    {
        *self.shared.on_peer_timeout.lock() = Some(Arc::new(handler));
    }

    pub fn get_peer_info(&self, addr: &SocketAddr) -> Option<PeerRecord> {
        self.shared.state.lock().peers.get(addr).cloned()
    }

    pub fn get_all_peers(&self) -> Vec<PeerRecord> {
        self.shared.state.lock().peers.snapshot()
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn is_running(&self) -> bool {
        self.shared.running.load(Ordering::SeqCst)
    }

    pub fn get_stats(&self) -> TransportStats {
        let uptime = self
            .started_at
            .lock()
            .map(|at| at.elapsed())
            .unwrap_or_default();
        let total_sent = self.shared.total_sent.load(Ordering::Relaxed);
        let uptime_seconds = uptime.as_secs_f64();
        TransportStats {
            local_address: self
                .local_addr
                .lock()
                .map(|addr| addr.to_string())
                .unwrap_or_else(|| {
                    format!("{}:{}", self.shared.config.host, self.shared.config.port)
                }),
            uptime_seconds,
            peers_count: self.shared.state.lock().peers.len(),
            total_sent,
            total_received: self.shared.total_received.load(Ordering::Relaxed),
            packets_per_second: if uptime_seconds > 0.0 {
                total_sent as f64 / uptime_seconds
            } else {
                0.0
            },
            traffic_profile: self.shared.pipeline.profile_name().to_string(),
            obfuscation: self.shared.pipeline.obfuscation_name().to_string(),
            traffic_analysis: self.shared.analyzer.statistics(),
        }
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

async fn send_control(
    shared: &Arc<Shared>,
    socket: &Arc<dyn Datagram>,
    packet: &Packet,
    addr: SocketAddr,
) {
    let wire = shared.pipeline.seal_control(packet);
    if let Err(e) = socket.send_to(&wire, addr).await {
        debug!(%addr, packet_type = ?packet.packet_type, error = %e, "control send failed");
    }
}

async fn receive_loop(
    shared: Arc<Shared>,
    socket: Arc<dyn Datagram>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut buf = vec![0u8; RECV_BUF_LEN];
    loop {
        let received = tokio::select! {
            result = socket.recv_from(&mut buf) => result,
            _ = shutdown.changed() => break,
        };
        match received {
            Ok((len, addr)) => handle_datagram(&shared, &socket, &buf[..len], addr).await,
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                sleep(WOULD_BLOCK_PAUSE).await;
            }
            Err(e) => {
                if shared.running.load(Ordering::SeqCst) {
                    debug!(error = %e, "receive failed");
                }
                sleep(RECV_ERROR_PAUSE).await;
            }
        }
    }
}

async fn handle_datagram(
    shared: &Arc<Shared>,
    socket: &Arc<dyn Datagram>,
    datagram: &[u8],
    addr: SocketAddr,
) {
    let packet = match shared.pipeline.open(datagram) {
        Ok(packet) => packet,
        Err(e) => {
            debug!(%addr, error = %e, "dropping undecodable datagram");
            return;
        }
    };

    shared.state.lock().peers.touch_recv(addr, Instant::now());
    shared.total_received.fetch_add(1, Ordering::Relaxed);

    match packet.packet_type {
        PacketType::Data => {
            if packet.requires_ack {
                let ack = Packet::ack(packet.sequence, now_ms());
                send_control(shared, socket, &ack, addr).await;
            }
            let handler = shared.on_receive.lock().clone();
            if let Some(handler) = handler {
                let outcome =
                    catch_unwind(AssertUnwindSafe(|| handler(&packet.payload, addr)));
                if outcome.is_err() {
                    warn!(%addr, "receive handler panicked");
                }
            }
        }
        PacketType::Ping => {
            let pong = Packet::pong(shared.next_sequence(), packet.timestamp_ms);
            send_control(shared, socket, &pong, addr).await;
        }
        PacketType::Pong => {
            let rtt = now_ms().saturating_sub(packet.timestamp_ms);
            shared.state.lock().peers.record_rtt(addr, rtt);
        }
        PacketType::Ack => {
            shared.state.lock().pending_acks.remove(&packet.sequence);
        }
        // Liveness only; touch_recv above already refreshed the peer.
        PacketType::HolePunch => {}
        // Reserved: decoded but ignored.
        PacketType::Handshake | PacketType::Close => {}
    }
}

async fn maintenance_loop(
    shared: Arc<Shared>,
    socket: Arc<dyn Datagram>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(MAINTENANCE_TICK);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => break,
        }
        maintenance_tick(&shared, &socket, Instant::now()).await;
    }
}

/// One maintenance round: evict silent peers, ping idle ones, age the
/// pending-ACK map. The retry budget converts exhaustion into a counted loss;
/// the packet itself is not re-sent.
async fn maintenance_tick(shared: &Arc<Shared>, socket: &Arc<dyn Datagram>, now: Instant) {
    let (evicted, to_ping) = {
        let mut state = shared.state.lock();
        let evicted = state
            .peers
            .expire(now, ShapedUdpTransport::PEER_TIMEOUT);
        let to_ping = state
            .peers
            .idle_peers(now, ShapedUdpTransport::PING_INTERVAL);

        let mut exhausted = Vec::new();
        for (sequence, pending) in state.pending_acks.iter_mut() {
            pending.retries += 1;
            if pending.retries > ShapedUdpTransport::MAX_RETRIES {
                exhausted.push(*sequence);
            }
        }
        for sequence in exhausted {
            if let Some(pending) = state.pending_acks.remove(&sequence) {
                debug!(
                    sequence,
                    destination = %pending.destination,
                    bytes = pending.packet.payload.len(),
                    "reliable packet lost"
                );
                state.peers.record_loss(pending.destination);
            }
        }
        (evicted, to_ping)
    };

    if !evicted.is_empty() {
        let handler = shared.on_peer_timeout.lock().clone();
        for addr in evicted {
            debug!(%addr, "peer timed out");
            if let Some(handler) = &handler {
                if catch_unwind(AssertUnwindSafe(|| handler(addr))).is_err() {
                    warn!(%addr, "peer-timeout handler panicked");
                }
            }
        }
    }

    for addr in to_ping {
        let ping = Packet::ping(shared.next_sequence(), now_ms());
        send_control(shared, socket, &ping, addr).await;
    }
}
