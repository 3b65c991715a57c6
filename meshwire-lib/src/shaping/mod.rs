//! Profile-driven traffic shaping: size padding plus send-delay sampling.

mod analyzer;
mod profile;

pub use analyzer::{SizeStats, TrafficAnalyzer};
pub use profile::TrafficProfile;

use rand::{rng, Rng};
use std::time::Duration;
use tracing::warn;

/// Length of the original-length prefix `shape_packet` prepends.
const LEN_PREFIX: usize = 4;

/// Pads buffers toward a profile-shaped size distribution and samples
/// profile-shaped inter-packet delays.
///
/// `shape_packet` prepends the original length and zero-pads up to a target
/// sampled from the profile's size range; `unshape_packet` is the left
/// inverse. The shaper keeps no state between calls.
pub struct TrafficShaper {
    profile: TrafficProfile,
}

impl TrafficShaper {
    pub fn new(profile: TrafficProfile) -> Self {
        Self { profile }
    }

    /// Resolve a profile identifier. `"none"` and unknown identifiers disable
    /// shaping; unknown ones warn.
    pub fn from_identifier(identifier: &str) -> Option<Self> {
        match identifier {
            "none" => None,
            other => match other.parse::<TrafficProfile>() {
                Ok(profile) => Some(Self::new(profile)),
                Err(_) => {
                    warn!(identifier = other, "unknown traffic profile, disabling shaping");
                    None
                }
            },
        }
    }

    pub fn profile(&self) -> TrafficProfile {
        self.profile
    }

    pub fn shape_packet(&self, data: &[u8]) -> Vec<u8> {
        let target = rng().random_range(self.profile.size_range());
        let mut out = Vec::with_capacity((LEN_PREFIX + data.len()).max(target));
        out.extend_from_slice(&(data.len() as u32).to_be_bytes());
        out.extend_from_slice(data);
        if out.len() < target {
            out.resize(target, 0);
        }
        out
    }

    /// Buffers without a plausible length prefix come back unchanged; control
    /// packets skip shaping on the send side and rely on this.
    pub fn unshape_packet(&self, data: &[u8]) -> Vec<u8> {
        if data.len() < LEN_PREFIX {
            return data.to_vec();
        }
        let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
        match data.get(LEN_PREFIX..LEN_PREFIX + len) {
            Some(original) => original.to_vec(),
            None => data.to_vec(),
        }
    }

    /// Sampled inter-packet delay for the active profile.
    pub fn get_send_delay(&self) -> Duration {
        Duration::from_millis(rng().random_range(self.profile.delay_range_ms()))
    }
}
