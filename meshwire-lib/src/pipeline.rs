use std::time::Duration;

use crate::obfuscation::{self, Mode, Obfuscator};
use crate::packet::{Packet, PacketError};
use crate::shaping::TrafficShaper;

/// Ordered composition of codec, obfuscator, and shaper.
///
/// TX is framing → obfuscate → shape; RX is the exact reverse. The order is a
/// contract: obfuscation must see real packet bytes, and shaping must produce
/// the final wire form. Latency-critical control packets skip the shaper and
/// go through `seal_control`.
pub struct Pipeline {
    obfuscator: Option<Box<dyn Obfuscator>>,
    shaper: Option<TrafficShaper>,
}

impl Pipeline {
    /// Pipeline for the UDP transport. Refuses stream-only obfuscators.
    pub fn for_datagrams(profile: &str, obfuscation: &str, key: &str) -> Self {
        Self {
            obfuscator: obfuscation::build(obfuscation, key, Mode::Datagram),
            shaper: TrafficShaper::from_identifier(profile),
        }
    }

    /// Pipeline for stream transports (WebSocket). No datagram codec involved.
    pub fn for_streams(profile: &str, obfuscation: &str, key: &str) -> Self {
        Self {
            obfuscator: obfuscation::build(obfuscation, key, Mode::Stream),
            shaper: TrafficShaper::from_identifier(profile),
        }
    }

    /// Full TX path for DATA packets.
    pub fn seal(&self, packet: &Packet) -> Vec<u8> {
        let mut raw = packet.encode();
        if let Some(obfuscator) = &self.obfuscator {
            raw = obfuscator.obfuscate(&raw);
        }
        if let Some(shaper) = &self.shaper {
            raw = shaper.shape_packet(&raw);
        }
        raw
    }

    /// TX path for PING, PONG, ACK, and HOLE_PUNCH: obfuscation only.
    pub fn seal_control(&self, packet: &Packet) -> Vec<u8> {
        let mut raw = packet.encode();
        if let Some(obfuscator) = &self.obfuscator {
            raw = obfuscator.obfuscate(&raw);
        }
        raw
    }

    /// Full RX path: unshape → deobfuscate → decode.
    pub fn open(&self, data: &[u8]) -> Result<Packet, PacketError> {
        let mut raw = match &self.shaper {
            Some(shaper) => shaper.unshape_packet(data),
            None => data.to_vec(),
        };
        if let Some(obfuscator) = &self.obfuscator {
            raw = obfuscator.deobfuscate(&raw);
        }
        Packet::decode(&raw)
    }

    /// Stream TX path: obfuscate → shape, no codec.
    pub fn wrap_message(&self, data: &[u8]) -> Vec<u8> {
        let mut raw = match &self.obfuscator {
            Some(obfuscator) => obfuscator.obfuscate(data),
            None => data.to_vec(),
        };
        if let Some(shaper) = &self.shaper {
            raw = shaper.shape_packet(&raw);
        }
        raw
    }

    /// Stream RX path: unshape → deobfuscate.
    pub fn unwrap_message(&self, data: &[u8]) -> Vec<u8> {
        let mut raw = match &self.shaper {
            Some(shaper) => shaper.unshape_packet(data),
            None => data.to_vec(),
        };
        if let Some(obfuscator) = &self.obfuscator {
            raw = obfuscator.deobfuscate(&raw);
        }
        raw
    }

    /// Sampled inter-packet delay; zero when no shaper is installed. Consulted
    /// only on the DATA path.
    pub fn send_delay(&self) -> Duration {
        self.shaper
            .as_ref()
            .map(TrafficShaper::get_send_delay)
            .unwrap_or(Duration::ZERO)
    }

    pub fn has_shaper(&self) -> bool {
        self.shaper.is_some()
    }

    pub fn profile_name(&self) -> &'static str {
        self.shaper
            .as_ref()
            .map(|shaper| shaper.profile().as_str())
            .unwrap_or("none")
    }

    pub fn obfuscation_name(&self) -> &'static str {
        self.obfuscator
            .as_ref()
            .map(|obfuscator| obfuscator.name())
            .unwrap_or("none")
    }
}
