use std::net::SocketAddr;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the aggregator service
    Serve {
        #[arg(long, default_value = "config.toml")]
        config: String,
    },
    /// Run a single mock attestor endpoint for local testing
    Attestor {
        #[arg(long, default_value = "127.0.0.1:50051")]
        listen_addr: SocketAddr,
        /// Deterministic key seed; distinct seeds give distinct attestor identities
        #[arg(long, default_value_t = 1)]
        seed: u8,
    },
    /// Query a running aggregator for a quorum attestation
    Query {
        #[arg(long, default_value = "http://127.0.0.1:50060")]
        aggregator_addr: String,
        #[arg(long, default_value_t = 0)]
        min_height: u64,
    },
}
