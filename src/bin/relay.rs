//! Relay client - chat with other clients of a relay server
//!
//! # Usage
//!
//! ```text
//! relay --name alice                      # connect to 127.0.0.1:5555
//! relay --server 10.0.0.5:5555 --name bob
//! ```
//!
//! Typed lines are sent as chat messages. `/file <path>` sends a file and
//! `/quit` leaves.

use std::net::SocketAddr;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use relay_client::{run_terminal, TerminalConfig};
use relay_protocol::DEFAULT_PORT;

/// Relay client - terminal chat over a relay server
#[derive(Parser, Debug)]
#[command(name = "relay", version, about)]
struct Args {
    /// Relay server address
    #[arg(long, short, default_value_t = SocketAddr::from(([127, 0, 0, 1], DEFAULT_PORT)))]
    server: SocketAddr,

    /// Display name, sent to everyone when you join
    #[arg(long, short)]
    name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Chat output goes to stdout, so only warnings and errors are logged
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let args = Args::parse();

    run_terminal(TerminalConfig {
        server: args.server,
        name: args.name,
    })
    .await?;

    Ok(())
}
