//! Finite-state-machine types for both transfer roles.
//!
//! Transitions live in [`crate::sender`] and [`crate::receiver`]; this module
//! only names the states so they can be logged and asserted on.

use crate::packet::SeqBit;

/// Sender FSM.
///
/// ```text
///            load(chunk)                  matching ACK
///  Sending(s) ─────────▶ AwaitingAck(s) ───────────────▶ Sending(1-s)
///                          │     ▲                    └─(EOF chunk)─▶ Done
///                          └─────┘
///                 timeout / stale ACK: retransmit
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderState {
    /// Ready to frame the next chunk with this bit.
    Sending(SeqBit),
    /// One packet with this bit is in flight.
    AwaitingAck(SeqBit),
    /// The EOF marker was acknowledged.
    Done,
}

impl Default for SenderState {
    fn default() -> Self {
        Self::Sending(SeqBit::Zero)
    }
}

impl std::fmt::Display for SenderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sending(seq) => write!(f, "SENDING({seq})"),
            Self::AwaitingAck(seq) => write!(f, "AWAITING_ACK({seq})"),
            Self::Done => write!(f, "DONE"),
        }
    }
}

/// Receiver FSM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReceiverState {
    /// Waiting for the packet carrying this bit.
    Listening(SeqBit),
    /// EOF marker with this bit was accepted; only re-ACKs from here on.
    Closed(SeqBit),
}

impl Default for ReceiverState {
    fn default() -> Self {
        Self::Listening(SeqBit::Zero)
    }
}

impl std::fmt::Display for ReceiverState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Listening(seq) => write!(f, "LISTENING({seq})"),
            Self::Closed(seq) => write!(f, "CLOSED({seq})"),
        }
    }
}
