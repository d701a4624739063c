//! `stop-and-wait`: reliable in-order file transfer over UDP using the
//! alternating-bit (Stop-and-Wait ARQ) protocol.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐  [seq|csum|payload]  ┌──────────┐
//!  │  Sender  │─────────────────────▶│ Receiver │
//!  └────┬─────┘                      └─────┬────┘
//!       │            [seq] ACK             │
//!       │◀─────────────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │           Connection              │
//!  │  (drives one role over Transport) │
//!  └────┬──────────────────────────────┘
//!       │ raw datagrams
//!  ┌────▼──────┐    ┌───────────┐
//!  │ Simulator │───▶│  Socket   │  (tokio UdpSocket)
//!  └───────────┘    └───────────┘
//!   (optional)
//! ```
//!
//! Each module has a single responsibility:
//! - [`packet`]     : wire format, checksum, sequence bit
//! - [`sender`]     : outbound state machine (one packet in flight)
//! - [`receiver`]   : inbound state machine (duplicate suppression)
//! - [`state`]      : finite-state-machine types
//! - [`timer`]      : retransmit timeout and retry ceiling
//! - [`config`]     : shared transfer parameters
//! - [`connection`] : async send / receive loops
//! - [`socket`]     : transport trait and UDP implementation
//! - [`simulator`]  : fault-injecting transport decorator

pub mod config;
pub mod connection;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod socket;
pub mod state;
pub mod timer;

pub use config::ArqConfig;
pub use connection::{ConnError, Connection, RecvReport, SendReport};
pub use packet::SeqBit;
pub use simulator::{Simulator, SimulatorConfig};
pub use socket::{Socket, SocketError, Transport};
