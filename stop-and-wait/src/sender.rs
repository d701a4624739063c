//! Outbound state for alternating-bit stop-and-wait.
//!
//! [`Sender`] tracks the current sequence bit and the single in-flight
//! packet.  It does **not** touch the socket; [`crate::connection::Connection`]
//! calls these methods and owns the actual send/receive loop.
//!
//! # Stop-and-Wait contract
//! - At most **one** packet is in flight at any moment (`in_flight`).
//! - A new chunk may only be loaded in [`SenderState::Sending`].
//! - On a matching ACK: flip the bit; clear `in_flight`.
//! - On timeout or any other ACK: resend the same bytes unchanged.

use std::time::{Duration, Instant};

use crate::packet::{decode_ack, encode_packet, SeqBit};
use crate::state::SenderState;

// ---------------------------------------------------------------------------
// InFlight
// ---------------------------------------------------------------------------

/// A packet that has been sent but not yet acknowledged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InFlight {
    /// Sequence bit carried by `bytes`.
    pub seq: SeqBit,
    /// Encoded packet; retransmitted byte-for-byte.
    pub bytes: Vec<u8>,
    /// `true` when this is the zero-length end-of-stream marker.
    pub eof: bool,
    /// How many times this packet has been transmitted (1 = first send).
    pub tx_count: u32,
    /// Time of the first transmission.
    pub first_sent_at: Instant,
}

/// Result of feeding a datagram to [`Sender::on_ack`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The in-flight packet is acknowledged.
    Accepted { seq: SeqBit, rtt: Duration },
    /// Stale, out-of-range or undecodable ACK; the caller must retransmit.
    ///
    /// Carries the decoded byte when there was one.
    Mismatch(Option<u8>),
}

/// Counters reported at the end of a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SenderStats {
    /// Every transmission, first sends and retransmissions alike.
    pub packets_sent: u64,
    /// Chunks loaded, the EOF marker included.
    pub chunks: u64,
    /// Payload bytes loaded.
    pub bytes: u64,
}

impl SenderStats {
    pub fn retransmissions(&self) -> u64 {
        self.packets_sent - self.chunks
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Stop-and-wait send-side state for one transfer.
#[derive(Debug, Default)]
pub struct Sender {
    state: SenderState,
    in_flight: Option<InFlight>,
    stats: SenderStats,
}

impl Sender {
    /// A fresh sender in `SENDING(0)`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SenderState {
        self.state
    }

    pub fn stats(&self) -> SenderStats {
        self.stats
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    pub fn is_done(&self) -> bool {
        self.state == SenderState::Done
    }

    /// Frame `chunk` with the current bit and mark it in flight.
    ///
    /// An empty chunk is the EOF marker.  Counts one transmission and returns
    /// the bytes the caller must put on the wire.
    ///
    /// Panics in debug mode if called outside [`SenderState::Sending`].
    pub fn load(&mut self, chunk: &[u8]) -> &[u8] {
        debug_assert!(
            matches!(self.state, SenderState::Sending(_)),
            "load called in state {}",
            self.state
        );
        let SenderState::Sending(seq) = self.state else {
            return &[];
        };
        self.stats.chunks += 1;
        self.stats.bytes += chunk.len() as u64;
        self.stats.packets_sent += 1;
        self.state = SenderState::AwaitingAck(seq);
        let entry = self.in_flight.insert(InFlight {
            seq,
            bytes: encode_packet(seq, chunk),
            eof: chunk.is_empty(),
            tx_count: 1,
            first_sent_at: Instant::now(),
        });
        &entry.bytes
    }

    /// Count one more transmission of the in-flight packet and return it.
    ///
    /// Returns `None` when nothing is in flight.
    pub fn retransmit(&mut self) -> Option<&[u8]> {
        let entry = self.in_flight.as_mut()?;
        entry.tx_count += 1;
        self.stats.packets_sent += 1;
        Some(&entry.bytes)
    }

    /// Process an inbound ACK datagram.
    pub fn on_ack(&mut self, datagram: &[u8]) -> AckOutcome {
        let value = decode_ack(datagram).ok();
        let SenderState::AwaitingAck(seq) = self.state else {
            return AckOutcome::Mismatch(value);
        };
        if value != Some(seq.as_u8()) {
            return AckOutcome::Mismatch(value);
        }

        let eof = self.in_flight.as_ref().is_some_and(|e| e.eof);
        let rtt = self
            .in_flight
            .take()
            .map_or(Duration::ZERO, |e| e.first_sent_at.elapsed());
        self.state = if eof {
            SenderState::Done
        } else {
            SenderState::Sending(seq.flip())
        };
        AckOutcome::Accepted { seq, rtt }
    }

    /// Transmission count of the in-flight packet, or `0` when idle.
    pub fn tx_count(&self) -> u32 {
        self.in_flight.as_ref().map_or(0, |e| e.tx_count)
    }
}
