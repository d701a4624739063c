//! Transfer driver: one [`Connection`] per endpoint.
//!
//! A [`Connection`] owns a [`Transport`] and the shared [`ArqConfig`], and
//! runs exactly one of the two roles:
//! - [`Connection::send_stream`] drives a [`Sender`] from an `AsyncRead`.
//! - [`Connection::recv_stream`] drives a [`Receiver`] into an `AsyncWrite`.
//!
//! Both loops are strictly sequential: the sender's only suspension point is
//! the bounded wait for an ACK, the receiver's the unbounded wait for the
//! next packet.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::config::{ArqConfig, ConfigError};
use crate::packet::{encode_ack, SeqBit, MAX_DATAGRAM};
use crate::receiver::{Receiver, Verdict};
use crate::sender::{AckOutcome, Sender};
use crate::socket::{Socket, SocketError, Transport};
use crate::timer::RetransmitTimer;

/// Room for any ACK plus slack to notice over-long datagrams.
const ACK_BUF_LEN: usize = 64;

// ---------------------------------------------------------------------------
// Errors and reports
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConnError {
    #[error(transparent)]
    Socket(#[from] SocketError),
    /// Reading the source or writing the sink failed.
    #[error("stream I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// The retry ceiling was hit for one packet.
    #[error("packet {seq} unacknowledged after {attempts} transmissions, transfer aborted")]
    RetriesExhausted { seq: SeqBit, attempts: u32 },
}

/// Outcome of a completed send.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SendReport {
    /// Payload bytes delivered.
    pub bytes: u64,
    /// Packets framed, the EOF marker included.
    pub chunks: u64,
    /// Every datagram put on the wire.
    pub packets_sent: u64,
    pub retransmissions: u64,
    /// `false` when the EOF marker's ACK never arrived.  All data was still
    /// acknowledged; only the receiver's close is unconfirmed.
    pub eof_confirmed: bool,
    pub elapsed: Duration,
}

/// Outcome of a completed receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecvReport {
    pub bytes: u64,
    pub accepted: u64,
    pub duplicates: u64,
    pub corrupt: u64,
    pub elapsed: Duration,
}

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One endpoint of a stop-and-wait transfer.
#[derive(Debug)]
pub struct Connection<T = Socket> {
    transport: T,
    config: ArqConfig,
}

impl Connection<Socket> {
    /// Sender side: bind an ephemeral port that can reach `config.addr`.
    pub async fn open(config: ArqConfig) -> Result<Self, ConnError> {
        config.validate()?;
        let socket = Socket::bind_for(config.peer_addr()).await?;
        log::debug!("[saw] sender bound {}", socket.local_addr);
        Ok(Self::new(socket, config))
    }

    /// Receiver side: bind `config.addr`.
    pub async fn listen(config: ArqConfig) -> Result<Self, ConnError> {
        config.validate()?;
        config.validate_linger()?;
        let socket = Socket::bind(config.addr).await?;
        log::info!("[saw] receiver listening on {}", socket.local_addr);
        Ok(Self::new(socket, config))
    }
}

impl<T: Transport> Connection<T> {
    /// Wrap an already-bound transport.
    pub fn new(transport: T, config: ArqConfig) -> Self {
        Self { transport, config }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    // -----------------------------------------------------------------------
    // Sender
    // -----------------------------------------------------------------------

    /// Stream `source` to `config.addr` and wait for the EOF marker's ACK.
    ///
    /// Running out of retries on a data packet aborts the transfer.  Running
    /// out on the EOF marker completes it with `eof_confirmed = false`.
    pub async fn send_stream<R>(&self, mut source: R) -> Result<SendReport, ConnError>
    where
        R: AsyncRead + Unpin + Send,
    {
        self.config.validate()?;
        let peer = self.config.peer_addr();
        let started = Instant::now();
        let mut sender = Sender::new();
        let mut timer = RetransmitTimer::new(&self.config);
        let mut chunk = vec![0u8; self.config.chunk_size];
        let mut eof_confirmed = true;

        log::info!("[saw:send] → {peer}, chunk size {}", self.config.chunk_size);

        while !sender.is_done() {
            let n = read_chunk(&mut source, &mut chunk).await?;
            if n == 0 {
                timer.bound_for_eof();
            }
            let bytes = sender.load(&chunk[..n]);
            self.transport.send_to(bytes, peer).await?;
            if let Some(entry) = sender.in_flight() {
                log::debug!("[saw:send] → DATA seq={} len={n}", entry.seq);
            }

            if !self.await_ack(&mut sender, &mut timer, peer).await? {
                eof_confirmed = false;
                break;
            }
        }

        let stats = sender.stats();
        let report = SendReport {
            bytes: stats.bytes,
            chunks: stats.chunks,
            packets_sent: stats.packets_sent,
            retransmissions: stats.retransmissions(),
            eof_confirmed,
            elapsed: started.elapsed(),
        };
        log::info!(
            "[saw:send] complete: {} bytes, {} packets sent ({} retransmitted) in {:.2?}",
            report.bytes,
            report.packets_sent,
            report.retransmissions,
            report.elapsed
        );
        Ok(report)
    }

    /// Block until the in-flight packet is acknowledged, retransmitting on
    /// timeout or on any non-matching ACK.
    ///
    /// Returns `false` when the EOF marker exhausts its retries.
    async fn await_ack(
        &self,
        sender: &mut Sender,
        timer: &mut RetransmitTimer,
        peer: SocketAddr,
    ) -> Result<bool, ConnError> {
        let mut buf = [0u8; ACK_BUF_LEN];
        let mut deadline = tokio::time::Instant::now() + timer.timeout();

        loop {
            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            let received = if remaining.is_zero() {
                Err(SocketError::Timeout)
            } else {
                self.transport.recv_from(&mut buf, Some(remaining)).await
            };

            let reason = match received {
                Ok((_, from)) if from != peer => {
                    log::debug!("[saw:send] ignoring datagram from {from}");
                    continue;
                }
                Ok((n, _)) => match sender.on_ack(&buf[..n]) {
                    AckOutcome::Accepted { seq, rtt } => {
                        log::debug!("[saw:send] ← ACK {seq} (rtt {rtt:.2?})");
                        timer.reset();
                        return Ok(true);
                    }
                    AckOutcome::Mismatch(Some(value)) => format!("unexpected ACK {value}"),
                    AckOutcome::Mismatch(None) => format!("malformed {n} byte ACK"),
                },
                Err(SocketError::Timeout) => "timeout".to_owned(),
                Err(e) => return Err(e.into()),
            };

            let Some(entry) = sender.in_flight() else {
                return Ok(true);
            };
            let (seq, attempts) = (entry.seq, entry.tx_count);
            if !timer.on_retransmit() {
                if entry.eof {
                    log::warn!(
                        "[saw:send] EOF unconfirmed after {attempts} transmissions, receiver likely closed"
                    );
                    return Ok(false);
                }
                log::warn!("[saw:send] giving up on packet {seq} after {attempts} transmissions");
                return Err(ConnError::RetriesExhausted { seq, attempts });
            }
            log::warn!("[saw:send] {reason}, resending packet {seq}");
            if let Some(bytes) = sender.retransmit() {
                self.transport.send_to(bytes, peer).await?;
            }
            deadline = tokio::time::Instant::now() + timer.timeout();
        }
    }

    // -----------------------------------------------------------------------
    // Receiver
    // -----------------------------------------------------------------------

    /// Reassemble the stream into `sink` until the EOF marker, then linger.
    ///
    /// The sink is flushed once the EOF marker has been accepted.
    pub async fn recv_stream<W>(&self, mut sink: W) -> Result<RecvReport, ConnError>
    where
        W: AsyncWrite + Unpin + Send,
    {
        self.config.validate()?;
        self.config.validate_linger()?;
        let started = Instant::now();
        let mut receiver = Receiver::new();
        // Sized for any datagram: the sender may use a larger chunk size.
        let mut buf = vec![0u8; MAX_DATAGRAM];
        let mut peer: Option<SocketAddr> = None;

        while !receiver.is_closed() {
            let (n, from) = self.transport.recv_from(&mut buf, None).await?;
            match peer {
                Some(p) if p != from => {
                    log::warn!("[saw:recv] ignoring datagram from {from}, bound to {p}");
                    continue;
                }
                Some(_) => {}
                None => {
                    log::info!("[saw:recv] transfer from {from}");
                    peer = Some(from);
                }
            }

            let delivery = receiver.on_datagram(&buf[..n]);
            match delivery.verdict {
                Verdict::Deliver(payload) => {
                    sink.write_all(payload).await?;
                    log::debug!("[saw:recv] ← DATA seq={} len={}", delivery.ack, payload.len());
                }
                Verdict::Eof => {
                    sink.flush().await?;
                    log::info!("[saw:recv] EOF received, transfer complete");
                }
                Verdict::Duplicate => {
                    log::debug!("[saw:recv] duplicate packet, re-ACK {}", delivery.ack);
                }
                Verdict::Corrupt => {
                    log::warn!("[saw:recv] corrupt packet, re-ACK {}", delivery.ack);
                }
            }
            self.transport.send_to(&encode_ack(delivery.ack), from).await?;
        }

        if let Some(peer) = peer {
            self.linger(&mut receiver, &mut buf, peer).await?;
        }

        let stats = receiver.stats();
        let report = RecvReport {
            bytes: stats.bytes,
            accepted: stats.accepted,
            duplicates: stats.duplicates,
            corrupt: stats.corrupt,
            elapsed: started.elapsed(),
        };
        log::info!(
            "[saw:recv] {} bytes in {} packets ({} duplicate, {} corrupt) in {:.2?}",
            report.bytes,
            report.accepted,
            report.duplicates,
            report.corrupt,
            report.elapsed
        );
        Ok(report)
    }

    /// Keep re-ACKing the EOF marker until the peer stays quiet for `linger`.
    ///
    /// The window restarts on every datagram from the peer.
    async fn linger(
        &self,
        receiver: &mut Receiver,
        buf: &mut [u8],
        peer: SocketAddr,
    ) -> Result<(), ConnError> {
        if self.config.linger.is_zero() {
            return Ok(());
        }
        loop {
            let (n, from) = match self.transport.recv_from(buf, Some(self.config.linger)).await {
                Ok(v) => v,
                Err(SocketError::Timeout) => return Ok(()),
                Err(e) => return Err(e.into()),
            };
            if from != peer {
                continue;
            }
            let ack = receiver.on_datagram(&buf[..n]).ack;
            log::debug!("[saw:recv] late datagram after EOF, re-ACK {ack}");
            self.transport.send_to(&encode_ack(ack), peer).await?;
        }
    }
}

/// Fill `buf` from `source`, stopping early only at end of input.
///
/// Returns the number of bytes read; `0` means the source is exhausted.
async fn read_chunk<R>(source: &mut R, buf: &mut [u8]) -> std::io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    let mut filled = 0;
    while filled < buf.len() {
        let n = source.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}
