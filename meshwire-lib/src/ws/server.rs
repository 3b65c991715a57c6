#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashSet;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::config::WsServerConfig;
use crate::pipeline::Pipeline;
use crate::TransportError;

/// Handler for inbound messages; a `Some` return is shaped and sent back.
type MessageHandler = Arc<dyn Fn(SocketAddr, Vec<u8>) -> Option<Vec<u8>> + Send + Sync>;

struct ServerShared {
    pipeline: Pipeline,
    handler: Mutex<Option<MessageHandler>>,
    clients: Mutex<AHashSet<SocketAddr>>,
    total_messages: AtomicU64,
    total_bytes: AtomicU64,
}

/// Read-only statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct WsServerStats {
    pub clients_connected: usize,
    pub total_messages: u64,
    pub total_bytes: u64,
    pub obfuscation: String,
    pub traffic_profile: String,
}

/// WebSocket server counterpart of the shaped client: every inbound message
/// is unshaped and deobfuscated before it reaches the handler, and every
/// reply goes back out through the same stages.
pub struct ShapedWsServer {
    config: WsServerConfig,
    shared: Arc<ServerShared>,
    local_addr: Mutex<Option<SocketAddr>>,
    shutdown_tx: Mutex<Option<watch::Sender<bool>>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ShapedWsServer {
    pub fn new(config: WsServerConfig) -> Self {
        let pipeline = Pipeline::for_streams(
            &config.traffic_profile,
            &config.obfuscation,
            &config.obfuscation_key,
        );
        Self {
            config,
            shared: Arc::new(ServerShared {
                pipeline,
                handler: Mutex::new(None),
                clients: Mutex::new(AHashSet::new()),
                total_messages: AtomicU64::new(0),
                total_bytes: AtomicU64::new(0),
            }),
            local_addr: Mutex::new(None),
            shutdown_tx: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    /// Register the message handler; replaces any earlier registration.
    pub fn on_message<F>(&self, handler: F)
    where
        F: Fn(SocketAddr, Vec<u8>) -> Option<Vec<u8>> + Send + Sync + 'static,
    {
        *self.shared.handler.lock() = Some(Arc::new(handler));
    }

    pub async fn start(&self) -> Result<(), TransportError> {
        let listener = TcpListener::bind(format!("{}:{}", self.config.host, self.config.port))
            .await
            .map_err(TransportError::Bind)?;
        let local = listener.local_addr().map_err(TransportError::Bind)?;
        *self.local_addr.lock() = Some(local);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        *self.shutdown_tx.lock() = Some(shutdown_tx);
        *self.task.lock() = Some(tokio::spawn(accept_loop(
            self.shared.clone(),
            listener,
            shutdown_rx,
        )));

        info!(%local, profile = self.shared.pipeline.profile_name(), obfuscation = self.shared.pipeline.obfuscation_name(), "websocket server started");
        Ok(())
    }

    pub async fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(true);
        }
        let task = self.task.lock().take();
        if let Some(task) = task {
            let _ = task.await;
        }
        info!("websocket server stopped");
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn get_stats(&self) -> WsServerStats {
        WsServerStats {
            clients_connected: self.shared.clients.lock().len(),
            total_messages: self.shared.total_messages.load(Ordering::Relaxed),
            total_bytes: self.shared.total_bytes.load(Ordering::Relaxed),
            obfuscation: self.shared.pipeline.obfuscation_name().to_string(),
            traffic_profile: self.shared.pipeline.profile_name().to_string(),
        }
    }
}

async fn accept_loop(
    shared: Arc<ServerShared>,
    listener: TcpListener,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let accepted = tokio::select! {
            result = listener.accept() => result,
            _ = shutdown.changed() => break,
        };
        match accepted {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(shared.clone(), stream, addr));
            }
            Err(e) => {
                warn!(error = %e, "failed to accept connection");
            }
        }
    }
}

async fn handle_connection(shared: Arc<ServerShared>, stream: TcpStream, addr: SocketAddr) {
    let mut ws = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(%addr, error = %e, "websocket handshake failed");
            return;
        }
    };
    shared.clients.lock().insert(addr);
    info!(%addr, "client connected");

    while let Some(message) = ws.next().await {
        let message = match message {
            Ok(message) => message,
            Err(e) => {
                debug!(%addr, error = %e, "client stream error");
                break;
            }
        };
        let raw = match message {
            Message::Binary(data) => data,
            Message::Text(text) => text.into_bytes(),
            Message::Close(_) => break,
            // Tungstenite answers pings on its own.
            _ => continue,
        };

        shared.total_messages.fetch_add(1, Ordering::Relaxed);
        shared.total_bytes.fetch_add(raw.len() as u64, Ordering::Relaxed);
        let data = shared.pipeline.unwrap_message(&raw);

        let handler = shared.handler.lock().clone();
        let Some(handler) = handler else { continue };
        let reply = match catch_unwind(AssertUnwindSafe(|| handler(addr, data))) {
            Ok(reply) => reply,
            Err(_) => {
                warn!(%addr, "message handler panicked");
                None
            }
        };
        if let Some(reply) = reply {
            let wire = shared.pipeline.wrap_message(&reply);
            let delay = shared.pipeline.send_delay();
            if delay > Duration::ZERO {
                sleep(delay).await;
            }
            if let Err(e) = ws.send(Message::Binary(wire)).await {
                debug!(%addr, error = %e, "reply send failed");
                break;
            }
        }
    }

    shared.clients.lock().remove(&addr);
    info!(%addr, "client disconnected");
}
