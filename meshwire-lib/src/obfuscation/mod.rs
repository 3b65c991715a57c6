//! Pluggable byte-level obfuscation.
//!
//! Providers disguise packet structure on the wire. Every provider is total:
//! both directions always return a buffer, and a buffer that cannot be
//! inverted comes back unchanged rather than failing.

mod faketls;
mod shadowsocks;
mod xor;

pub use faketls::FakeTls;
pub use shadowsocks::Shadowsocks;
pub use xor::Xor;

use tracing::warn;

/// Byte-in/byte-out transform applied to every buffer before it reaches the
/// wire. Implementations must satisfy `deobfuscate(obfuscate(x)) == x`.
pub trait Obfuscator: Send + Sync {
    fn obfuscate(&self, data: &[u8]) -> Vec<u8>;
    fn deobfuscate(&self, data: &[u8]) -> Vec<u8>;
    fn name(&self) -> &'static str;
}

/// Whether the obfuscator rides on datagrams or a byte stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Datagram,
    Stream,
}

/// Resolve an obfuscation identifier to a provider.
///
/// `"none"` and unknown identifiers disable obfuscation; unknown ones warn.
/// `faketls` only frames byte streams and is refused for datagram use.
pub fn build(identifier: &str, key: &str, mode: Mode) -> Option<Box<dyn Obfuscator>> {
    match identifier {
        "none" => None,
        "xor" => Some(Box::new(Xor::new(key))),
        "shadowsocks" => Some(Box::new(Shadowsocks::new(key))),
        "faketls" => {
            if mode == Mode::Datagram {
                warn!("faketls obfuscation is stream-only, disabling for datagram transport");
                None
            } else {
                Some(Box::new(FakeTls::new()))
            }
        }
        other => {
            warn!(identifier = other, "unknown obfuscation identifier, disabling obfuscation");
            None
        }
    }
}
