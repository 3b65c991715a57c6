use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::{rng, Rng};

use super::Obfuscator;

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;
const KDF_CONTEXT: &str = "meshwire shadowsocks transport key v1";

/// Shadowsocks-style AEAD: each buffer is sealed with ChaCha20-Poly1305 under
/// a fresh random nonce, which travels as a prefix. The key is derived from
/// the configured password.
pub struct Shadowsocks {
    cipher: ChaCha20Poly1305,
}

impl Shadowsocks {
    pub fn new(password: &str) -> Self {
        let key = blake3::derive_key(KDF_CONTEXT, password.as_bytes());
        Self { cipher: ChaCha20Poly1305::new(Key::from_slice(&key)) }
    }
}

impl Obfuscator for Shadowsocks {
    fn obfuscate(&self, data: &[u8]) -> Vec<u8> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rng().fill(&mut nonce_bytes);
        match self.cipher.encrypt(Nonce::from_slice(&nonce_bytes), data) {
            Ok(ciphertext) => {
                let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
                out.extend_from_slice(&nonce_bytes);
                out.extend_from_slice(&ciphertext);
                out
            }
            Err(_) => data.to_vec(),
        }
    }

    fn deobfuscate(&self, data: &[u8]) -> Vec<u8> {
        if data.len() < NONCE_LEN + TAG_LEN {
            return data.to_vec();
        }
        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        match self.cipher.decrypt(Nonce::from_slice(nonce_bytes), ciphertext) {
            Ok(plaintext) => plaintext,
            Err(_) => data.to_vec(),
        }
    }

    fn name(&self) -> &'static str {
        "shadowsocks"
    }
}
