//! Drives the [`Sender`] and [`Receiver`] state machines against each other
//! in memory, with a deterministic fault schedule and no sockets or timers.
//!
//! A "timeout" here is simply the sender noticing that nothing came back.

use stop_and_wait::packet::{encode_ack, SeqBit};
use stop_and_wait::receiver::{Receiver, Verdict};
use stop_and_wait::sender::{AckOutcome, Sender};
use stop_and_wait::state::SenderState;

/// Fault applied to one datagram crossing the link.
#[derive(Clone, Copy, PartialEq, Eq)]
enum Fault {
    Deliver,
    Drop,
    Corrupt,
}

/// Yields faults from a fixed script, then delivers everything.
struct Link {
    script: std::vec::IntoIter<Fault>,
}

impl Link {
    fn new(script: Vec<Fault>) -> Self {
        Self {
            script: script.into_iter(),
        }
    }

    fn carry(&mut self, datagram: &[u8]) -> Option<Vec<u8>> {
        match self.script.next().unwrap_or(Fault::Deliver) {
            Fault::Deliver => Some(datagram.to_vec()),
            Fault::Drop => None,
            Fault::Corrupt => {
                let mut bytes = datagram.to_vec();
                stop_and_wait::simulator::corrupt_datagram(&mut bytes);
                Some(bytes)
            }
        }
    }
}

struct Outcome {
    output: Vec<u8>,
    sender: Sender,
    receiver: Receiver,
}

fn transfer(data: &[u8], chunk: usize, forward: Vec<Fault>, backward: Vec<Fault>) -> Outcome {
    let mut sender = Sender::new();
    let mut receiver = Receiver::new();
    let mut fwd = Link::new(forward);
    let mut bwd = Link::new(backward);
    let mut output = Vec::new();
    let mut chunks = data.chunks(chunk);
    let mut rounds = 0;

    while !sender.is_done() {
        let next = chunks.next().unwrap_or(&[]);
        let mut wire = sender.load(next).to_vec();

        loop {
            rounds += 1;
            assert!(rounds < 10_000, "no progress");

            let ack = fwd.carry(&wire).map(|packet| {
                let delivery = receiver.on_datagram(&packet);
                if let Verdict::Deliver(payload) = delivery.verdict {
                    output.extend_from_slice(payload);
                }
                encode_ack(delivery.ack)
            });

            match ack.and_then(|a| bwd.carry(&a)) {
                Some(a) if matches!(sender.on_ack(&a), AckOutcome::Accepted { .. }) => break,
                _ => wire = sender.retransmit().expect("in flight").to_vec(),
            }
        }
    }

    Outcome {
        output,
        sender,
        receiver,
    }
}

fn data(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 256) as u8).collect()
}

#[test]
fn clean_link() {
    let input = data(1000);
    let out = transfer(&input, 128, vec![], vec![]);
    assert_eq!(out.output, input);
    assert_eq!(out.sender.stats().packets_sent, 1000u64.div_ceil(128) + 1);
    assert_eq!(out.sender.state(), SenderState::Done);
    assert!(out.receiver.is_closed());
}

#[test]
fn every_ack_lost_once() {
    use Fault::*;
    let input = data(300);
    let backward = vec![Drop, Deliver].repeat(4);
    let out = transfer(&input, 100, vec![], backward);
    assert_eq!(out.output, input);
    assert_eq!(out.receiver.stats().accepted, 3);
    assert_eq!(out.receiver.stats().duplicates, 4);
    assert_eq!(out.sender.stats().retransmissions(), 4);
}

#[test]
fn corrupted_data_then_corrupted_ack() {
    use Fault::*;
    let input = data(64);
    let out = transfer(&input, 32, vec![Corrupt, Deliver, Deliver], vec![Deliver, Corrupt]);
    assert_eq!(out.output, input);
    assert_eq!(out.receiver.stats().corrupt, 1);
}

#[test]
fn consecutive_losses_in_both_directions() {
    use Fault::*;
    let input = data(500);
    let forward = [vec![Drop; 6], vec![Deliver; 3], vec![Corrupt; 4]].concat();
    let backward = [vec![Deliver], vec![Drop; 5], vec![Corrupt; 3]].concat();
    let out = transfer(&input, 50, forward, backward);
    assert_eq!(out.output, input);
    assert_eq!(out.receiver.stats().accepted, 10);
}

#[test]
fn empty_input_sends_only_eof() {
    let out = transfer(&[], 16, vec![], vec![]);
    assert!(out.output.is_empty());
    assert_eq!(out.sender.stats().packets_sent, 1);
    assert!(out.receiver.is_closed());
}

#[test]
fn alternating_bits_on_the_wire() {
    let mut sender = Sender::new();
    let mut bits = Vec::new();
    for chunk in [&b"a"[..], &b"b"[..], &b"c"[..], &b""[..]] {
        let wire = sender.load(chunk).to_vec();
        bits.push(wire[0]);
        let seq = SeqBit::try_from(wire[0]).unwrap();
        sender.on_ack(&encode_ack(seq));
    }
    assert_eq!(bits, vec![0, 1, 0, 1]);
    assert!(sender.is_done());
}
