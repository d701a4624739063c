//! Retransmit timer for the single in-flight packet.
//!
//! The timeout is fixed by default.  With `backoff` enabled it doubles on
//! each retransmission of the same packet, capped at `max_ack_timeout`, and
//! falls back to the base value once an ACK arrives.
//!
//! The retry ceiling turns the classic "resend forever" loop into a bounded
//! one; `max_retries = None` keeps the unbounded behaviour.

use std::time::Duration;

use crate::config::{ArqConfig, DEFAULT_MAX_RETRIES};

#[derive(Debug, Clone)]
pub struct RetransmitTimer {
    base: Duration,
    max: Duration,
    backoff: bool,
    max_retries: Option<u32>,
    /// Timeout applied to the next wait.
    current: Duration,
    /// Retransmissions of the current packet.
    retries: u32,
}

impl RetransmitTimer {
    pub fn new(config: &ArqConfig) -> Self {
        Self {
            base: config.ack_timeout,
            max: config.max_ack_timeout,
            backoff: config.backoff,
            max_retries: config.max_retries,
            current: config.ack_timeout,
            retries: 0,
        }
    }

    /// Timeout for the next ACK wait.
    pub fn timeout(&self) -> Duration {
        self.current
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Record one retransmission of the in-flight packet.
    ///
    /// Returns `false` once the retry ceiling is exceeded; the caller must
    /// abort instead of retransmitting.
    pub fn on_retransmit(&mut self) -> bool {
        self.retries += 1;
        if self.max_retries.is_some_and(|max| self.retries > max) {
            return false;
        }
        if self.backoff {
            self.current = (self.current * 2).min(self.max);
        }
        true
    }

    /// Bound the retries of the EOF marker.
    ///
    /// Every data packet is already acknowledged by then, so an unbounded
    /// configuration falls back to [`DEFAULT_MAX_RETRIES`] instead of
    /// waiting forever on a receiver that has closed.
    pub fn bound_for_eof(&mut self) {
        self.max_retries.get_or_insert(DEFAULT_MAX_RETRIES);
    }

    /// A matching ACK arrived: forget the retry history.
    pub fn reset(&mut self) {
        self.retries = 0;
        self.current = self.base;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(max_retries: Option<u32>, backoff: bool) -> ArqConfig {
        ArqConfig {
            ack_timeout: Duration::from_millis(100),
            max_ack_timeout: Duration::from_millis(350),
            backoff,
            max_retries,
            ..ArqConfig::default()
        }
    }

    #[test]
    fn fixed_timeout_without_backoff() {
        let mut t = RetransmitTimer::new(&config(None, false));
        for _ in 0..5 {
            assert!(t.on_retransmit());
            assert_eq!(t.timeout(), Duration::from_millis(100));
        }
    }

    #[test]
    fn ceiling_aborts_after_max_retries() {
        let mut t = RetransmitTimer::new(&config(Some(2), false));
        assert!(t.on_retransmit());
        assert!(t.on_retransmit());
        assert!(!t.on_retransmit());
        assert_eq!(t.retries(), 3);
    }

    #[test]
    fn zero_retries_aborts_on_first_timeout() {
        let mut t = RetransmitTimer::new(&config(Some(0), false));
        assert!(!t.on_retransmit());
    }

    #[test]
    fn unbounded_never_aborts() {
        let mut t = RetransmitTimer::new(&config(None, false));
        assert!((0..10_000).all(|_| t.on_retransmit()));
    }

    #[test]
    fn eof_bound_applies_only_when_unbounded() {
        let mut t = RetransmitTimer::new(&config(None, false));
        t.bound_for_eof();
        assert!((0..DEFAULT_MAX_RETRIES).all(|_| t.on_retransmit()));
        assert!(!t.on_retransmit());

        let mut t = RetransmitTimer::new(&config(Some(2), false));
        t.bound_for_eof();
        assert!(t.on_retransmit());
        assert!(t.on_retransmit());
        assert!(!t.on_retransmit());
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let mut t = RetransmitTimer::new(&config(None, true));
        t.on_retransmit();
        assert_eq!(t.timeout(), Duration::from_millis(200));
        t.on_retransmit();
        assert_eq!(t.timeout(), Duration::from_millis(350));
        t.on_retransmit();
        assert_eq!(t.timeout(), Duration::from_millis(350));
    }

    #[test]
    fn reset_restores_base() {
        let mut t = RetransmitTimer::new(&config(Some(3), true));
        t.on_retransmit();
        t.on_retransmit();
        t.reset();
        assert_eq!(t.retries(), 0);
        assert_eq!(t.timeout(), Duration::from_millis(100));
    }
}
