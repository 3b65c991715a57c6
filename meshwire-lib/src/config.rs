use serde::Deserialize;
use std::{fs, path::Path};

/// Knobs for the UDP transport, immutable after construction. Profile and
/// obfuscation are carried as identifier strings and resolved when the
/// pipeline is built; unknown identifiers disable the stage with a warning.
#[derive(Debug, Deserialize, Clone)]
pub struct TransportConfig {
    #[serde(default = "default_host")]
    pub host: String,
    /// 0 lets the kernel pick; `start` captures the assigned port.
    #[serde(default)]
    pub port: u16,
    #[serde(default = "default_profile")]
    pub traffic_profile: String,
    #[serde(default = "default_obfuscation")]
    pub obfuscation: String,
    #[serde(default = "default_key")]
    pub obfuscation_key: String,
    /// When set, every DATA packet demands an ACK.
    #[serde(default)]
    pub reliable_mode: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: 0,
            traffic_profile: default_profile(),
            obfuscation: default_obfuscation(),
            obfuscation_key: default_key(),
            reliable_mode: false,
        }
    }
}

/// Knobs for the WebSocket client.
#[derive(Debug, Deserialize, Clone)]
pub struct WsClientConfig {
    pub uri: String,
    #[serde(default = "default_obfuscation")]
    pub obfuscation: String,
    #[serde(default = "default_key")]
    pub obfuscation_key: String,
    #[serde(default = "default_stream_profile")]
    pub traffic_profile: String,
    #[serde(default = "default_auto_reconnect")]
    pub auto_reconnect: bool,
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
}

impl WsClientConfig {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            obfuscation: default_obfuscation(),
            obfuscation_key: default_key(),
            traffic_profile: default_stream_profile(),
            auto_reconnect: default_auto_reconnect(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
        }
    }
}

/// Knobs for the WebSocket server.
#[derive(Debug, Deserialize, Clone)]
pub struct WsServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_ws_port")]
    pub port: u16,
    #[serde(default = "default_obfuscation")]
    pub obfuscation: String,
    #[serde(default = "default_key")]
    pub obfuscation_key: String,
    #[serde(default = "default_stream_profile")]
    pub traffic_profile: String,
}

impl Default for WsServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_ws_port(),
            obfuscation: default_obfuscation(),
            obfuscation_key: default_key(),
            traffic_profile: default_stream_profile(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_profile() -> String {
    "gaming".to_string()
}

fn default_stream_profile() -> String {
    "none".to_string()
}

fn default_obfuscation() -> String {
    "none".to_string()
}

fn default_key() -> String {
    "meshwire".to_string()
}

fn default_ws_port() -> u16 {
    8765
}

fn default_auto_reconnect() -> bool {
    true
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

pub fn load_from_path<P: AsRef<Path>>(
    p: P,
) -> Result<TransportConfig, Box<dyn std::error::Error + Send + Sync>> {
    let txt = fs::read_to_string(p)?;
    let cfg: TransportConfig = toml::from_str(&txt)?;
    Ok(cfg)
}
