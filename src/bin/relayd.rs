//! Relay Daemon - TCP chat relay server
//!
//! Accepts chat clients on one TCP port, relays every text line to all
//! other clients and stores files sent with the `FILE:` header. Runs in the
//! foreground until SIGINT or SIGTERM, then stops accepting and exits.
//!
//! # Usage
//!
//! ```bash
//! # Listen on 0.0.0.0:5555, storing files in the current directory
//! relayd
//!
//! # Another address and download directory
//! relayd --listen 127.0.0.1:6000 --download-dir /srv/relay
//!
//! # Enable debug logging
//! RUST_LOG=relayd=debug relayd
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use relayd::config::parse_listen;
use relayd::{ConfigError, RelayConfig, RelayServer, TracingSink};

/// Relay daemon - TCP chat relay with file transfer
#[derive(Parser, Debug)]
#[command(name = "relayd", version, about)]
struct Args {
    /// Address to listen on (overrides config and RELAY_LISTEN)
    #[arg(long, value_parser = parse_listen_arg)]
    listen: Option<SocketAddr>,

    /// Directory received files are written to (overrides RELAY_DOWNLOAD_DIR)
    #[arg(long)]
    download_dir: Option<PathBuf>,

    /// Config file (defaults to <config dir>/relay/relayd.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl Args {
    /// Resolves the config file, then `lookup` for environment overrides,
    /// then the flags on this command line.
    fn resolve_config<F>(&self, lookup: F) -> Result<RelayConfig, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config =
            RelayConfig::load_or_default(self.config.as_deref())?.with_overrides(lookup)?;
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(dir) = &self.download_dir {
            config.download_dir = dir.clone();
        }
        Ok(config)
    }
}

fn parse_listen_arg(value: &str) -> Result<SocketAddr, String> {
    parse_listen(value).map_err(|e| e.to_string())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("relayd=info".parse()?)
                .add_directive("relay_protocol=info".parse()?),
        )
        .init();

    let args = Args::parse();
    let config = args
        .resolve_config(|key| std::env::var(key).ok())
        .context("Invalid relay configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        listen = %config.listen,
        download_dir = %config.download_dir.display(),
        "Relay starting"
    );

    let cancel_token = CancellationToken::new();
    let server = RelayServer::bind(&config, Arc::new(TracingSink), cancel_token.clone())
        .await
        .inspect_err(|e| error!(error = %e, "Cannot start relay"))
        .with_context(|| format!("Failed to start relay on {}", config.listen))?;

    tokio::spawn(async move {
        match shutdown_signal().await {
            Ok(signal) => info!(signal, "Shutting down"),
            Err(e) => warn!(error = %e, "Signal handling failed, shutting down"),
        }
        cancel_token.cancel();
    });

    server.run().await.context("Relay stopped with an error")?;
    Ok(())
}

/// Resolves with the name of the first termination signal received.
async fn shutdown_signal() -> std::io::Result<&'static str> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
            _ = terminate.recv() => Ok("SIGTERM"),
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.map(|()| "Ctrl-C")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use relayd::config::{ENV_DOWNLOAD_DIR, ENV_LISTEN};

    fn missing_config() -> PathBuf {
        PathBuf::from("/nonexistent/relayd.toml")
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_flags_override_environment() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("relayd.toml");
        std::fs::write(&config_path, "listen = \"127.0.0.1:6000\"\nbacklog = 8\n").unwrap();

        let args = Args::try_parse_from([
            "relayd",
            "--config",
            config_path.to_str().unwrap(),
            "--listen",
            "127.0.0.1:7000",
        ])
        .unwrap();

        let config = args
            .resolve_config(|key| match key {
                ENV_LISTEN => Some("127.0.0.1:6500".to_string()),
                ENV_DOWNLOAD_DIR => Some("/srv/drop".to_string()),
                _ => None,
            })
            .unwrap();

        assert_eq!(config.listen.port(), 7000);
        assert_eq!(config.backlog, 8);
        assert_eq!(config.download_dir, PathBuf::from("/srv/drop"));
    }

    #[test]
    fn test_explicit_missing_config_is_error() {
        let args = Args {
            listen: None,
            download_dir: None,
            config: Some(missing_config()),
        };
        assert!(matches!(
            args.resolve_config(|_| None),
            Err(ConfigError::Read { .. })
        ));
    }

    #[test]
    fn test_bad_listen_flag_is_rejected() {
        assert!(Args::try_parse_from(["relayd", "--listen", "nowhere"]).is_err());
    }
}
