//! Transfer configuration shared by both roles.
//!
//! Both endpoints agree on one fixed address: the receiver binds it and the
//! sender transmits to it.  An unspecified address (`0.0.0.0:PORT`) is bound
//! as-is by the receiver and reached over loopback by the sender.
//!
//! # Linger
//!
//! After the EOF marker the receiver keeps re-ACKing for `linger`, restarting
//! the window on every datagram.  The window must span at least
//! [`LINGER_QUIET_PERIODS`] of the sender's longest retransmit interval: a
//! lost EOF ACK followed by two lost retransmissions still leaves one
//! interval of slack.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;

use crate::packet::MAX_CHUNK_SIZE;

pub const DEFAULT_ADDR: &str = "127.0.0.1:10000";
pub const DEFAULT_CHUNK_SIZE: usize = 1024;
pub const DEFAULT_ACK_TIMEOUT: Duration = Duration::from_secs(1);
pub const DEFAULT_MAX_ACK_TIMEOUT: Duration = Duration::from_secs(8);
pub const DEFAULT_MAX_RETRIES: u32 = 50;
pub const DEFAULT_LINGER: Duration = Duration::from_secs(4);

/// Minimum linger, in multiples of the longest retransmit interval.
pub const LINGER_QUIET_PERIODS: u32 = 4;

/// Protocol and endpoint parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArqConfig {
    /// Receiver's address: bound by the receiver, targeted by the sender.
    pub addr: SocketAddr,
    /// Maximum payload bytes per packet.
    pub chunk_size: usize,
    /// How long the sender waits for an ACK before retransmitting.
    pub ack_timeout: Duration,
    /// Upper bound for the timeout when `backoff` is enabled.
    pub max_ack_timeout: Duration,
    /// Double the timeout after each retransmission of the same packet.
    pub backoff: bool,
    /// Retransmissions of one packet before the transfer is aborted.
    ///
    /// `None` retries forever.
    pub max_retries: Option<u32>,
    /// How long the receiver keeps re-ACKing the EOF marker after closing.
    ///
    /// Zero disables lingering; otherwise see [`ArqConfig::min_linger`].
    pub linger: Duration,
}

impl Default for ArqConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 10_000)),
            chunk_size: DEFAULT_CHUNK_SIZE,
            ack_timeout: DEFAULT_ACK_TIMEOUT,
            max_ack_timeout: DEFAULT_MAX_ACK_TIMEOUT,
            backoff: false,
            max_retries: Some(DEFAULT_MAX_RETRIES),
            linger: DEFAULT_LINGER,
        }
    }
}

impl ArqConfig {
    /// Where the sender transmits: `addr`, with an unspecified IP replaced
    /// by loopback of the same family.
    pub fn peer_addr(&self) -> SocketAddr {
        let ip = match self.addr.ip() {
            IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            ip => ip,
        };
        SocketAddr::new(ip, self.addr.port())
    }

    /// Longest gap the sender leaves between two transmissions of one packet.
    pub fn retransmit_interval(&self) -> Duration {
        if self.backoff {
            self.max_ack_timeout
        } else {
            self.ack_timeout
        }
    }

    /// Shortest non-zero linger accepted by [`ArqConfig::validate_linger`].
    pub fn min_linger(&self) -> Duration {
        self.retransmit_interval() * LINGER_QUIET_PERIODS
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunk_size == 0 || self.chunk_size > MAX_CHUNK_SIZE {
            return Err(ConfigError::ChunkSize(self.chunk_size));
        }
        if self.ack_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout);
        }
        if self.max_ack_timeout < self.ack_timeout {
            return Err(ConfigError::TimeoutCap {
                base: self.ack_timeout,
                cap: self.max_ack_timeout,
            });
        }
        Ok(())
    }

    /// Receiver-side check that `linger` outlasts the sender's retransmits.
    pub fn validate_linger(&self) -> Result<(), ConfigError> {
        if !self.linger.is_zero() && self.linger < self.min_linger() {
            return Err(ConfigError::LingerTooShort {
                linger: self.linger,
                min: self.min_linger(),
            });
        }
        Ok(())
    }
}

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("chunk size {0} outside 1..={max}", max = MAX_CHUNK_SIZE)]
    ChunkSize(usize),
    #[error("ack timeout must be non-zero")]
    ZeroTimeout,
    #[error("max ack timeout {cap:?} is below ack timeout {base:?}")]
    TimeoutCap { base: Duration, cap: Duration },
    #[error("linger {linger:?} is below the minimum {min:?}")]
    LingerTooShort { linger: Duration, min: Duration },
    #[error("{name} must be within [0, 1], got {value}")]
    Rate { name: &'static str, value: String },
}
