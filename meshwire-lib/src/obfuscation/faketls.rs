use super::Obfuscator;

const RECORD_HEADER_LEN: usize = 5;
const CONTENT_TYPE_APPLICATION_DATA: u8 = 0x17;
const TLS_VERSION: [u8; 2] = [0x03, 0x03];
const MAX_RECORD_PAYLOAD: usize = u16::MAX as usize;

/// Frames buffers as TLS 1.2 application-data records so the stream resembles
/// HTTPS traffic. Framing only, no encryption; stream transports only.
#[derive(Default)]
pub struct FakeTls;

impl FakeTls {
    pub fn new() -> Self {
        Self
    }
}

impl Obfuscator for FakeTls {
    fn obfuscate(&self, data: &[u8]) -> Vec<u8> {
        let records = data.len() / MAX_RECORD_PAYLOAD + 1;
        let mut out = Vec::with_capacity(data.len() + records * RECORD_HEADER_LEN);
        // `chunks` yields nothing for empty input; that still needs a record.
        if data.is_empty() {
            push_record(&mut out, &[]);
            return out;
        }
        for chunk in data.chunks(MAX_RECORD_PAYLOAD) {
            push_record(&mut out, chunk);
        }
        out
    }

    fn deobfuscate(&self, data: &[u8]) -> Vec<u8> {
        match strip_records(data) {
            Some(stripped) => stripped,
            None => data.to_vec(),
        }
    }

    fn name(&self) -> &'static str {
        "faketls"
    }
}

fn push_record(out: &mut Vec<u8>, payload: &[u8]) {
    out.push(CONTENT_TYPE_APPLICATION_DATA);
    out.extend_from_slice(&TLS_VERSION);
    out.extend_from_slice(&(payload.len() as u16).to_be_bytes());
    out.extend_from_slice(payload);
}

/// Walks consecutive records; `None` when the buffer is not entirely made of
/// well-formed records, in which case the caller returns the input unchanged.
fn strip_records(data: &[u8]) -> Option<Vec<u8>> {
    let mut out = Vec::with_capacity(data.len());
    let mut rest = data;
    if rest.is_empty() {
        return None;
    }
    while !rest.is_empty() {
        if rest.len() < RECORD_HEADER_LEN
            || rest[0] != CONTENT_TYPE_APPLICATION_DATA
            || rest[1..3] != TLS_VERSION
        {
            return None;
        }
        let len = u16::from_be_bytes([rest[3], rest[4]]) as usize;
        let payload = rest.get(RECORD_HEADER_LEN..RECORD_HEADER_LEN + len)?;
        out.extend_from_slice(payload);
        rest = &rest[RECORD_HEADER_LEN + len..];
    }
    Some(out)
}
