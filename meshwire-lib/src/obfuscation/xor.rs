use super::Obfuscator;

/// Cycles the key bytes over the input. Involutive, so both directions share
/// one transform.
pub struct Xor {
    key: Vec<u8>,
}

impl Xor {
    pub fn new(key: &str) -> Self {
        let key = key.as_bytes().to_vec();
        // An empty key degenerates to the identity transform.
        Self { key: if key.is_empty() { vec![0] } else { key } }
    }

    fn apply(&self, data: &[u8]) -> Vec<u8> {
        data.iter()
            .zip(self.key.iter().cycle())
            .map(|(byte, key)| byte ^ key)
            .collect()
    }
}

impl Obfuscator for Xor {
    fn obfuscate(&self, data: &[u8]) -> Vec<u8> {
        self.apply(data)
    }

    fn deobfuscate(&self, data: &[u8]) -> Vec<u8> {
        self.apply(data)
    }

    fn name(&self) -> &'static str {
        "xor"
    }
}
