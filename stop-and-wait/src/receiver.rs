//! Inbound state for alternating-bit stop-and-wait.
//!
//! [`Receiver`] decides, for every raw datagram, whether its payload is
//! delivered and which bit to acknowledge:
//!
//! - Corrupt packets are re-ACKed with the **last accepted** bit.
//! - Only the packet carrying the expected bit is accepted; its payload is
//!   returned for the sink and the expected bit flips.
//! - Anything else is a duplicate of the previous packet (the sender missed
//!   our ACK) and is re-ACKed without delivering the payload again.
//!
//! The [`Receiver`] does **not** send ACKs itself; the returned
//! [`Delivery`] tells [`crate::connection::Connection`] what to send.

use crate::packet::{decode_packet, is_corrupt, SeqBit};
use crate::state::ReceiverState;

/// What happened to one inbound datagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict<'a> {
    /// In-order payload to append to the sink.
    Deliver(&'a [u8]),
    /// End-of-stream marker accepted; the receiver is now closed.
    Eof,
    /// Valid packet that is not the one expected (or arrived after EOF).
    Duplicate,
    /// Checksum mismatch or truncated datagram.
    Corrupt,
}

/// Verdict plus the bit to acknowledge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery<'a> {
    pub verdict: Verdict<'a>,
    pub ack: SeqBit,
}

/// Counters reported at the end of a transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReceiverStats {
    /// Data packets accepted (EOF marker excluded).
    pub accepted: u64,
    /// Payload bytes delivered to the sink.
    pub bytes: u64,
    pub duplicates: u64,
    pub corrupt: u64,
}

/// Stop-and-wait receive-side state for one transfer.
#[derive(Debug, Default)]
pub struct Receiver {
    state: ReceiverState,
    stats: ReceiverStats,
}

impl Receiver {
    /// A fresh receiver expecting bit `0`.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ReceiverState {
        self.state
    }

    pub fn stats(&self) -> ReceiverStats {
        self.stats
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ReceiverState::Closed(_))
    }

    /// Classify one datagram and advance the state.
    pub fn on_datagram<'a>(&mut self, datagram: &'a [u8]) -> Delivery<'a> {
        let expected = match self.state {
            ReceiverState::Listening(expected) => expected,
            // The sender can only still be waiting for the EOF ACK.
            ReceiverState::Closed(eof_seq) => {
                self.stats.duplicates += 1;
                return Delivery {
                    verdict: Verdict::Duplicate,
                    ack: eof_seq,
                };
            }
        };
        let last_accepted = expected.flip();

        if is_corrupt(datagram) {
            self.stats.corrupt += 1;
            return Delivery {
                verdict: Verdict::Corrupt,
                ack: last_accepted,
            };
        }
        let Ok(pkt) = decode_packet(datagram) else {
            self.stats.corrupt += 1;
            return Delivery {
                verdict: Verdict::Corrupt,
                ack: last_accepted,
            };
        };

        if pkt.seq_bit() != Some(expected) {
            self.stats.duplicates += 1;
            return Delivery {
                verdict: Verdict::Duplicate,
                ack: last_accepted,
            };
        }

        if pkt.is_eof() {
            self.state = ReceiverState::Closed(expected);
            return Delivery {
                verdict: Verdict::Eof,
                ack: expected,
            };
        }

        self.stats.accepted += 1;
        self.stats.bytes += pkt.payload.len() as u64;
        self.state = ReceiverState::Listening(expected.flip());
        Delivery {
            verdict: Verdict::Deliver(pkt.payload),
            ack: expected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::encode_packet;

    /// Feed `datagrams` and collect everything delivered plus the ACKs sent.
    fn run(r: &mut Receiver, datagrams: &[Vec<u8>]) -> (Vec<u8>, Vec<SeqBit>) {
        let mut out = Vec::new();
        let mut acks = Vec::new();
        for d in datagrams {
            let delivery = r.on_datagram(d);
            if let Verdict::Deliver(payload) = delivery.verdict {
                out.extend_from_slice(payload);
            }
            acks.push(delivery.ack);
        }
        (out, acks)
    }

    #[test]
    fn initial_state() {
        let r = Receiver::new();
        assert_eq!(r.state(), ReceiverState::Listening(SeqBit::Zero));
        assert!(!r.is_closed());
    }

    #[test]
    fn in_order_packet_accepted() {
        let mut r = Receiver::new();
        let bytes = encode_packet(SeqBit::Zero, b"hello");
        let d = r.on_datagram(&bytes);
        assert_eq!(d.verdict, Verdict::Deliver(b"hello"));
        assert_eq!(d.ack, SeqBit::Zero);
        assert_eq!(r.state(), ReceiverState::Listening(SeqBit::One));
    }

    #[test]
    fn lost_ack_does_not_double_write() {
        // Receiver accepts seq=0, its ACK is lost, sender resends seq=0.
        let mut r = Receiver::new();
        let p0 = encode_packet(SeqBit::Zero, b"first");
        let (out, acks) = run(&mut r, &[p0.clone(), p0]);
        assert_eq!(out, b"first");
        assert_eq!(acks, vec![SeqBit::Zero, SeqBit::Zero]);
        assert_eq!(r.stats().accepted, 1);
        assert_eq!(r.stats().duplicates, 1);
    }

    #[test]
    fn duplicate_in_middle_keeps_order() {
        let mut r = Receiver::new();
        let p0 = encode_packet(SeqBit::Zero, b"abc");
        let p1 = encode_packet(SeqBit::One, b"def");
        let (out, acks) = run(&mut r, &[p0.clone(), p0, p1]);
        assert_eq!(out, b"abcdef");
        assert_eq!(acks, vec![SeqBit::Zero, SeqBit::Zero, SeqBit::One]);
        assert_eq!(r.stats().accepted, 2);
        assert_eq!(r.stats().bytes, 6);
    }

    #[test]
    fn corrupt_packet_reacks_previous_bit() {
        let mut r = Receiver::new();
        let mut bytes = encode_packet(SeqBit::Zero, b"data");
        bytes[2] ^= 0xFF;
        let d = r.on_datagram(&bytes);
        assert_eq!(d.verdict, Verdict::Corrupt);
        assert_eq!(d.ack, SeqBit::One);
        assert_eq!(r.state(), ReceiverState::Listening(SeqBit::Zero));
        assert_eq!(r.stats().corrupt, 1);
    }

    #[test]
    fn truncated_datagram_is_corrupt() {
        let mut r = Receiver::new();
        assert_eq!(r.on_datagram(&[0]).verdict, Verdict::Corrupt);
        assert_eq!(r.on_datagram(&[]).verdict, Verdict::Corrupt);
    }

    #[test]
    fn out_of_range_seq_is_rejected() {
        let mut r = Receiver::new();
        let mut bytes = encode_packet(SeqBit::Zero, b"x");
        bytes[0] = 9; // header is outside the checksum
        let d = r.on_datagram(&bytes);
        assert_eq!(d.verdict, Verdict::Duplicate);
        assert_eq!(d.ack, SeqBit::One);
        assert_eq!(r.stats().accepted, 0);
    }

    #[test]
    fn eof_closes() {
        let mut r = Receiver::new();
        r.on_datagram(&encode_packet(SeqBit::Zero, b"x"));
        let eof = encode_packet(SeqBit::One, b"");
        let d = r.on_datagram(&eof);
        assert_eq!(d.verdict, Verdict::Eof);
        assert_eq!(d.ack, SeqBit::One);
        assert_eq!(r.state(), ReceiverState::Closed(SeqBit::One));
        assert!(r.is_closed());
    }

    #[test]
    fn eof_with_wrong_bit_is_duplicate() {
        let mut r = Receiver::new();
        let eof = encode_packet(SeqBit::One, b"");
        let d = r.on_datagram(&eof);
        assert_eq!(d.verdict, Verdict::Duplicate);
        assert_eq!(d.ack, SeqBit::One);
        assert!(!r.is_closed());
    }

    #[test]
    fn closed_receiver_reacks_eof_bit() {
        let mut r = Receiver::new();
        r.on_datagram(&encode_packet(SeqBit::Zero, b""));
        assert!(r.is_closed());

        let eof = encode_packet(SeqBit::Zero, b"");
        let again = r.on_datagram(&eof);
        assert_eq!(again.verdict, Verdict::Duplicate);
        assert_eq!(again.ack, SeqBit::Zero);

        let garbage = r.on_datagram(&[0xFF]);
        assert_eq!(garbage.ack, SeqBit::Zero);
        assert_eq!(r.stats().accepted, 0);
    }
}
