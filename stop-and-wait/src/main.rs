//! Entry point for `stop-and-wait`.
//!
//! Parses CLI arguments and dispatches into either **send** or **recv** mode.
//! All protocol work is delegated to library modules; `main.rs` owns only
//! process setup (logging, argument parsing, file handles).

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use stop_and_wait::config::{
    ArqConfig, DEFAULT_ADDR, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_ACK_TIMEOUT, DEFAULT_MAX_RETRIES,
};
use stop_and_wait::{Connection, Simulator, SimulatorConfig, Socket};
use tokio::fs::File;
use tokio::io::BufWriter;

/// Reliable file transfer over UDP with stop-and-wait ARQ.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    mode: Mode,
}

#[derive(Subcommand)]
enum Mode {
    /// Stream a file to a listening receiver.
    Send {
        /// File to transmit.
        #[arg(short, long)]
        file: PathBuf,
        #[command(flatten)]
        common: Common,
        /// Maximum payload bytes per packet.
        #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
        chunk_size: usize,
        /// Retransmissions of one packet before aborting (0 = unbounded).
        #[arg(long, default_value_t = DEFAULT_MAX_RETRIES)]
        max_retries: u32,
        /// Probability of corrupting an incoming ACK.
        #[arg(long, default_value_t = 0.0)]
        ack_error_rate: f64,
    },
    /// Receive a file and write it to disk.
    Recv {
        /// Destination path.
        #[arg(short, long)]
        out: PathBuf,
        #[command(flatten)]
        common: Common,
        /// Milliseconds to keep re-ACKing EOF after the transfer
        /// (default: four of the sender's longest retransmit intervals).
        #[arg(long)]
        linger_ms: Option<u64>,
        /// Probability of corrupting an incoming data packet.
        #[arg(long, default_value_t = 0.0)]
        data_error_rate: f64,
    },
}

/// Flags both roles must agree on, plus the local fault model.
#[derive(Args)]
struct Common {
    /// Receiver address shared by both roles.
    #[arg(short, long, default_value = DEFAULT_ADDR)]
    addr: SocketAddr,
    /// Milliseconds to wait for an ACK before retransmitting.
    #[arg(long, default_value_t = 1000)]
    timeout_ms: u64,
    /// Double the timeout on each retransmission of the same packet.
    #[arg(long)]
    backoff: bool,
    /// Probability of dropping an outgoing datagram.
    #[arg(long, default_value_t = 0.0)]
    loss_rate: f64,
    /// Probability of sending an outgoing datagram twice.
    #[arg(long, default_value_t = 0.0)]
    duplicate_rate: f64,
    /// Seed for the fault simulator.
    #[arg(long)]
    seed: Option<u64>,
}

impl Common {
    fn config(&self) -> ArqConfig {
        let ack_timeout = Duration::from_millis(self.timeout_ms);
        ArqConfig {
            addr: self.addr,
            ack_timeout,
            max_ack_timeout: ack_timeout.max(DEFAULT_MAX_ACK_TIMEOUT),
            backoff: self.backoff,
            ..ArqConfig::default()
        }
    }

    fn simulator(&self, corrupt_rate: f64) -> Result<SimulatorConfig> {
        let sim = SimulatorConfig {
            loss_rate: self.loss_rate,
            duplicate_rate: self.duplicate_rate,
            corrupt_rate,
            seed: self.seed,
        };
        sim.validate()?;
        Ok(sim)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise env_logger; set RUST_LOG to control verbosity.
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.mode {
        Mode::Send {
            file,
            common,
            chunk_size,
            max_retries,
            ack_error_rate,
        } => {
            let config = ArqConfig {
                chunk_size,
                max_retries: (max_retries > 0).then_some(max_retries),
                ..common.config()
            };
            let sim = common.simulator(ack_error_rate)?;
            let source = File::open(&file)
                .await
                .with_context(|| format!("opening {}", file.display()))?;
            let size = source.metadata().await?.len();
            log::info!("Starting file transfer: {} ({size} bytes)", file.display());

            let socket = Connection::open(config.clone()).await?.into_transport();
            let conn = Connection::new(Simulator::new(socket, sim), config);
            let report = conn.send_stream(source).await?;
            log::debug!("[sim] {:?}", conn.transport().stats());
            if !report.eof_confirmed {
                log::warn!("Receiver did not acknowledge end of file; all data was acknowledged.");
            }
            println!("File transfer complete: {} packets sent.", report.packets_sent);
            println!("Total time: {:.2} seconds.", report.elapsed.as_secs_f64());
        }
        Mode::Recv {
            out,
            common,
            linger_ms,
            data_error_rate,
        } => {
            let mut config = common.config();
            if let Some(ms) = linger_ms {
                config.linger = Duration::from_millis(ms);
            } else {
                config.linger = config.min_linger();
            }
            let sim = common.simulator(data_error_rate)?;
            let sink = File::create(&out)
                .await
                .with_context(|| format!("creating {}", out.display()))?;

            let socket: Socket = Connection::listen(config.clone()).await?.into_transport();
            let conn = Connection::new(Simulator::new(socket, sim), config);
            let report = conn.recv_stream(BufWriter::new(sink)).await?;
            log::debug!("[sim] {:?}", conn.transport().stats());
            println!(
                "Received {} bytes into {} ({} duplicates, {} corrupt).",
                report.bytes,
                out.display(),
                report.duplicates,
                report.corrupt
            );
        }
    }
    Ok(())
}
