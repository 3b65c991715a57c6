use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Fixed header length: type(1) + sequence(4) + timestamp(8) + flags(1) + payload_len(2).
pub const HEADER_LEN: usize = 16;

/// Largest datagram the transport will put on the wire after shaping.
pub const MAX_PACKET_SIZE: usize = 1400;

const FLAG_REQUIRES_ACK: u8 = 0x01;

#[derive(Debug, Error)]
pub enum PacketError {
    #[error("datagram truncated: got {got} bytes, need {need}")]
    Truncated { got: usize, need: usize },
    #[error("unknown packet type {0:#04x}")]
    UnknownType(u8),
}

/// Closed set of wire packet types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PacketType {
    Data = 0x01,
    Ack = 0x02,
    Ping = 0x03,
    Pong = 0x04,
    HolePunch = 0x05,
    Handshake = 0x06,
    Close = 0x07,
}

impl TryFrom<u8> for PacketType {
    type Error = PacketError;

    fn try_from(tag: u8) -> Result<Self, PacketError> {
        match tag {
            0x01 => Ok(PacketType::Data),
            0x02 => Ok(PacketType::Ack),
            0x03 => Ok(PacketType::Ping),
            0x04 => Ok(PacketType::Pong),
            0x05 => Ok(PacketType::HolePunch),
            0x06 => Ok(PacketType::Handshake),
            0x07 => Ok(PacketType::Close),
            other => Err(PacketError::UnknownType(other)),
        }
    }
}

/// A single datagram: 16-byte big-endian header plus payload.
///
/// The `timestamp_ms` of a PONG is not the responder's clock; it is the ping
/// initiator's original timestamp echoed back verbatim, so the initiator can
/// observe RTT without clock alignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub packet_type: PacketType,
    pub sequence: u32,
    pub timestamp_ms: u64,
    pub requires_ack: bool,
    pub payload: Vec<u8>,
}

impl Packet {
    pub fn data(sequence: u32, timestamp_ms: u64, payload: Vec<u8>, requires_ack: bool) -> Self {
        Self { packet_type: PacketType::Data, sequence, timestamp_ms, requires_ack, payload }
    }

    pub fn ack(sequence: u32, timestamp_ms: u64) -> Self {
        Self {
            packet_type: PacketType::Ack,
            sequence,
            timestamp_ms,
            requires_ack: false,
            payload: Vec::new(),
        }
    }

    pub fn ping(sequence: u32, timestamp_ms: u64) -> Self {
        Self {
            packet_type: PacketType::Ping,
            sequence,
            timestamp_ms,
            requires_ack: false,
            payload: Vec::new(),
        }
    }

    /// `echoed_timestamp_ms` is the initiator's timestamp, copied unchanged.
    pub fn pong(sequence: u32, echoed_timestamp_ms: u64) -> Self {
        Self {
            packet_type: PacketType::Pong,
            sequence,
            timestamp_ms: echoed_timestamp_ms,
            requires_ack: false,
            payload: Vec::new(),
        }
    }

    pub fn hole_punch(sequence: u32, timestamp_ms: u64) -> Self {
        Self {
            packet_type: PacketType::HolePunch,
            sequence,
            timestamp_ms,
            requires_ack: false,
            payload: b"PUNCH".to_vec(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        debug_assert!(self.payload.len() <= u16::MAX as usize);
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u8(self.packet_type as u8);
        buf.put_u32(self.sequence);
        buf.put_u64(self.timestamp_ms);
        buf.put_u8(if self.requires_ack { FLAG_REQUIRES_ACK } else { 0 });
        buf.put_u16(self.payload.len() as u16);
        buf.put_slice(&self.payload);
        buf.to_vec()
    }

    /// Trailing bytes beyond `HEADER_LEN + payload_len` are ignored, so shaper
    /// padding may be stripped either before or after parsing. Reserved flag
    /// bits are ignored on receive.
    pub fn decode(data: &[u8]) -> Result<Self, PacketError> {
        if data.len() < HEADER_LEN {
            return Err(PacketError::Truncated { got: data.len(), need: HEADER_LEN });
        }

        let mut header = &data[..HEADER_LEN];
        let tag = header.get_u8();
        let sequence = header.get_u32();
        let timestamp_ms = header.get_u64();
        let flags = header.get_u8();
        let payload_len = header.get_u16() as usize;

        if data.len() < HEADER_LEN + payload_len {
            return Err(PacketError::Truncated {
                got: data.len(),
                need: HEADER_LEN + payload_len,
            });
        }

        Ok(Self {
            packet_type: PacketType::try_from(tag)?,
            sequence,
            timestamp_ms,
            requires_ack: (flags & FLAG_REQUIRES_ACK) != 0,
            payload: data[HEADER_LEN..HEADER_LEN + payload_len].to_vec(),
        })
    }
}
