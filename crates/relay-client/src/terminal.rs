//! Interactive terminal session.
//!
//! Multiplexes stdin and the server connection: typed lines are parsed into
//! [`InputCommand`]s and sent, lines from the server are printed to stdout.

use std::net::{Ipv4Addr, SocketAddr};

use tokio::io::{self, AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::warn;

use relay_protocol::DEFAULT_PORT;

use crate::connection::{connect, Outgoing, RelayConnection};
use crate::error::Result;
use crate::input::InputCommand;

/// Settings for an interactive session.
#[derive(Debug, Clone)]
pub struct TerminalConfig {
    /// Relay server address.
    pub server: SocketAddr,

    /// Display name, sent as the first message.
    pub name: String,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            server: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            name: String::new(),
        }
    }
}

/// Runs an interactive session until `/quit`, end of input, Ctrl-C, or the
/// server closing the connection.
pub async fn run_terminal(config: TerminalConfig) -> Result<()> {
    let connection = connect(config.server).await?;
    chat(connection, &config.name, BufReader::new(io::stdin())).await
}

/// Drives one chat session, reading typed lines from `input`.
///
/// Input lines are read with `Lines::next_line`, so a line that is only
/// partly typed when a server line arrives is kept and completed on a later
/// iteration.
pub async fn chat<I>(connection: RelayConnection, name: &str, input: I) -> Result<()>
where
    I: AsyncBufRead + Unpin,
{
    let (mut incoming, mut outgoing) = connection.into_split();

    if !name.trim().is_empty() {
        outgoing.send_text(name.trim()).await?;
    }

    let mut lines = input.lines();

    loop {
        tokio::select! {
            line = incoming.next_line() => {
                if !handle_server_line(line?).await? {
                    break;
                }
            }
            typed = lines.next_line() => {
                let Some(typed) = typed? else {
                    break;
                };
                if !handle_input(&typed, &mut outgoing).await? {
                    break;
                }
            }
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Ctrl-C handler failed");
                }
                break;
            }
        }
    }

    if let Err(e) = outgoing.shutdown().await {
        warn!(error = %e, "Failed to close connection cleanly");
    }
    Ok(())
}

/// Prints a server line. Returns `false` once the server has gone away.
async fn handle_server_line(line: Option<String>) -> Result<bool> {
    match line {
        Some(line) => {
            write_stdout(&line).await?;
            Ok(true)
        }
        None => {
            write_stdout("*** server closed the connection").await?;
            Ok(false)
        }
    }
}

/// Acts on one typed line. Returns `false` when the user wants to leave.
async fn handle_input(line: &str, outgoing: &mut Outgoing) -> Result<bool> {
    match InputCommand::parse(line) {
        InputCommand::Text(text) => {
            if let Err(e) = outgoing.send_text(&text).await {
                write_stderr(&format!("!!! {e}")).await?;
            }
        }
        InputCommand::SendFile(path) => match outgoing.send_file(&path).await {
            Ok(bytes) => {
                write_stdout(&format!("*** sent {} ({bytes} bytes)", path.display())).await?;
            }
            Err(e) => write_stderr(&format!("!!! {e}")).await?,
        },
        InputCommand::Quit => {
            write_stdout("*** leaving chat").await?;
            return Ok(false);
        }
        InputCommand::Ignore => {}
    }
    Ok(true)
}

async fn write_stdout(line: &str) -> io::Result<()> {
    let mut stdout = io::stdout();
    stdout.write_all(line.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await
}

async fn write_stderr(line: &str) -> io::Result<()> {
    let mut stderr = io::stderr();
    stderr.write_all(line.as_bytes()).await?;
    stderr.write_all(b"\n").await?;
    stderr.flush().await
}
