//! Wire-format definitions for data packets and acknowledgements.
//!
//! This module is responsible for:
//! - The 1-bit alternating sequence number ([`SeqBit`]).
//! - The single-byte payload checksum.
//! - Encoding / decoding data packets and ACKs.
//!
//! No I/O happens here; this is pure data transformation.
//!
//! # Wire format
//!
//! ```text
//!  data packet (sender → receiver)
//! +---------+----------+----------------------------------+
//! | seq (1) | csum (1) |  payload (0 ..= chunk_size)      |
//! +---------+----------+----------------------------------+
//!
//!  acknowledgement (receiver → sender)
//! +---------+
//! | seq (1) |
//! +---------+
//! ```
//!
//! The checksum covers the payload only.  A zero-length payload is the
//! end-of-stream marker.

use thiserror::Error;

/// Byte length of the data-packet header (sequence bit + checksum).
pub const HEADER_LEN: usize = 2;

/// Byte length of an acknowledgement datagram.
pub const ACK_LEN: usize = 1;

/// Largest payload that still fits a single IPv4 UDP datagram.
pub const MAX_CHUNK_SIZE: usize = MAX_DATAGRAM - HEADER_LEN;

/// Largest IPv4 UDP payload; receive buffers are sized to this.
pub const MAX_DATAGRAM: usize = 65_507;

// Byte offsets within a data packet.
const OFF_SEQ: usize = 0;
const OFF_CHECKSUM: usize = 1;

// ---------------------------------------------------------------------------
// SeqBit
// ---------------------------------------------------------------------------

/// The alternating 1-bit sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SeqBit {
    #[default]
    Zero,
    One,
}

impl SeqBit {
    /// The opposite bit (`1 - self`).
    pub fn flip(self) -> Self {
        match self {
            SeqBit::Zero => SeqBit::One,
            SeqBit::One => SeqBit::Zero,
        }
    }

    /// On-wire byte value (`0` or `1`).
    pub fn as_u8(self) -> u8 {
        match self {
            SeqBit::Zero => 0,
            SeqBit::One => 1,
        }
    }
}

impl TryFrom<u8> for SeqBit {
    type Error = PacketError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(SeqBit::Zero),
            1 => Ok(SeqBit::One),
            other => Err(PacketError::InvalidSeq(other)),
        }
    }
}

impl std::fmt::Display for SeqBit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

// ---------------------------------------------------------------------------
// Packet
// ---------------------------------------------------------------------------

/// A decoded data packet borrowing its payload from the receive buffer.
///
/// `seq` is kept as the raw header byte: the checksum does not cover the
/// header, so a corrupted datagram can decode to a value outside `{0, 1}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Packet<'a> {
    pub seq: u8,
    pub checksum: u8,
    pub payload: &'a [u8],
}

impl Packet<'_> {
    /// The sequence bit, or `None` if the header byte is out of range.
    pub fn seq_bit(&self) -> Option<SeqBit> {
        SeqBit::try_from(self.seq).ok()
    }

    /// `true` for the zero-length end-of-stream marker.
    pub fn is_eof(&self) -> bool {
        self.payload.is_empty()
    }
}

/// Errors that can arise when parsing a raw datagram.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PacketError {
    /// Datagram shorter than the fixed header.
    #[error("buffer too short: {0} bytes")]
    BufferTooShort(usize),
    /// ACK datagram that is not exactly one byte long.
    #[error("acknowledgement must be {len} byte, got {0}", len = ACK_LEN)]
    AckLength(usize),
    /// Byte value that is not a valid sequence bit.
    #[error("invalid sequence bit {0}")]
    InvalidSeq(u8),
}

/// Sum of all payload bytes modulo 256.
pub fn compute_checksum(payload: &[u8]) -> u8 {
    payload.iter().fold(0u8, |acc, &b| acc.wrapping_add(b))
}

/// Frame `payload` as `[seq, checksum, payload..]`.
pub fn encode_packet(seq: SeqBit, payload: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
    buf.push(seq.as_u8());
    buf.push(compute_checksum(payload));
    buf.extend_from_slice(payload);
    buf
}

/// Split a datagram into header fields and payload.
///
/// The checksum is **not** verified here; see [`is_corrupt`].
pub fn decode_packet(buf: &[u8]) -> Result<Packet<'_>, PacketError> {
    if buf.len() < HEADER_LEN {
        return Err(PacketError::BufferTooShort(buf.len()));
    }
    Ok(Packet {
        seq: buf[OFF_SEQ],
        checksum: buf[OFF_CHECKSUM],
        payload: &buf[HEADER_LEN..],
    })
}

/// `true` when the stored checksum disagrees with the payload.
///
/// A datagram too short to hold a header counts as corrupt.  Header and
/// payload damage are indistinguishable here.
pub fn is_corrupt(buf: &[u8]) -> bool {
    match decode_packet(buf) {
        Ok(pkt) => pkt.checksum != compute_checksum(pkt.payload),
        Err(_) => true,
    }
}

/// Encode an acknowledgement for `seq`.
pub fn encode_ack(seq: SeqBit) -> Vec<u8> {
    vec![seq.as_u8()]
}

/// Decode an acknowledgement into its raw byte value.
///
/// The value is **not** range-checked; the sender treats anything other than
/// its current bit as a mismatch.
pub fn decode_ack(buf: &[u8]) -> Result<u8, PacketError> {
    match buf {
        [seq] => Ok(*seq),
        _ => Err(PacketError::AckLength(buf.len())),
    }
}
