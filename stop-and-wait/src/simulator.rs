//! Fault-injecting transport decorator.
//!
//! Real networks drop, duplicate and corrupt datagrams.  [`Simulator`] wraps
//! any [`Transport`] and applies a configurable fault model so the protocol
//! code is identical in production and under test:
//!
//! | Fault       | Where    | Description                                  |
//! |-------------|----------|----------------------------------------------|
//! | Loss        | send     | Drop the datagram with `loss_rate`.          |
//! | Duplication | send     | Deliver the datagram twice.                  |
//! | Corruption  | receive  | Damage the datagram, see [`corrupt_datagram`]. |
//!
//! Wrapping the sender's transport corrupts ACKs; wrapping the receiver's
//! corrupts data packets.  A fixed `seed` makes the fault sequence
//! reproducible.

use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::ConfigError;
use crate::packet::{ACK_LEN, HEADER_LEN};
use crate::socket::{SocketError, Transport};

/// Configuration for the fault-injection model.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SimulatorConfig {
    /// Probability that an outgoing datagram is silently dropped.
    pub loss_rate: f64,
    /// Probability that an outgoing datagram is sent twice.
    pub duplicate_rate: f64,
    /// Probability that an incoming datagram is corrupted.
    pub corrupt_rate: f64,
    /// RNG seed; `None` seeds from OS entropy.
    pub seed: Option<u64>,
}

impl SimulatorConfig {
    /// `true` when no fault can ever fire.
    pub fn is_transparent(&self) -> bool {
        self.loss_rate == 0.0 && self.duplicate_rate == 0.0 && self.corrupt_rate == 0.0
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("loss rate", self.loss_rate),
            ("duplicate rate", self.duplicate_rate),
            ("corrupt rate", self.corrupt_rate),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Rate {
                    name,
                    value: value.to_string(),
                });
            }
        }
        Ok(())
    }
}

/// Counters of injected faults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FaultStats {
    pub dropped: u64,
    pub duplicated: u64,
    pub corrupted: u64,
}

/// A fault-injecting wrapper around another transport.
#[derive(Debug)]
pub struct Simulator<T> {
    inner: T,
    config: SimulatorConfig,
    rng: Mutex<StdRng>,
    stats: Mutex<FaultStats>,
}

impl<T: Transport> Simulator<T> {
    pub fn new(inner: T, config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            inner,
            config,
            rng: Mutex::new(rng),
            stats: Mutex::new(FaultStats::default()),
        }
    }

    pub fn stats(&self) -> FaultStats {
        *self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Bernoulli trial with probability `p`.
    fn roll(&self, p: f64) -> bool {
        if p <= 0.0 {
            return false;
        }
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        rng.random::<f64>() < p
    }

    fn count(&self, f: impl FnOnce(&mut FaultStats)) {
        f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
    }
}

impl<T: Transport> Transport for Simulator<T> {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        if self.roll(self.config.loss_rate) {
            self.count(|s| s.dropped += 1);
            log::debug!("[sim] dropped {} byte datagram to {dest}", buf.len());
            return Ok(());
        }
        self.inner.send_to(buf, dest).await?;
        if self.roll(self.config.duplicate_rate) {
            self.count(|s| s.duplicated += 1);
            log::debug!("[sim] duplicated {} byte datagram to {dest}", buf.len());
            self.inner.send_to(buf, dest).await?;
        }
        Ok(())
    }

    async fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(usize, SocketAddr), SocketError> {
        let (n, from) = self.inner.recv_from(buf, timeout).await?;
        if self.roll(self.config.corrupt_rate) && corrupt_datagram(&mut buf[..n]) {
            self.count(|s| s.corrupted += 1);
            log::debug!("[sim] corrupted {n} byte datagram from {from}");
        }
        Ok((n, from))
    }
}

/// Damage a datagram in place so the protocol notices.
///
/// - ACK (one byte): flipped to the opposite bit; out-of-range values become `0`.
/// - Data packet: first payload byte XORed with `0xFF`.
/// - EOF packet (header only): checksum byte XORed with `0xFF`.
///
/// Returns `false` when the datagram is too short to damage.
pub fn corrupt_datagram(buf: &mut [u8]) -> bool {
    match buf.len() {
        0 => false,
        ACK_LEN => {
            buf[0] = match buf[0] {
                0 => 1,
                _ => 0,
            };
            true
        }
        HEADER_LEN => {
            buf[1] ^= 0xFF;
            true
        }
        _ => {
            buf[HEADER_LEN] ^= 0xFF;
            true
        }
    }
}
