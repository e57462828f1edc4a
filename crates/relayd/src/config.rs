//! Relay daemon configuration.
//!
//! Values are resolved in order, later sources winning:
//! built-in defaults, a TOML file, environment variables, then whatever the
//! command line sets explicitly.
//!
//! ```toml
//! listen = "0.0.0.0:5555"
//! backlog = 5
//! download_dir = "/var/lib/relay/files"
//! file_prefix = "received_"
//! ```

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use relay_protocol::DEFAULT_PORT;

use crate::server::DEFAULT_BACKLOG;
use crate::transfer::DEFAULT_FILE_PREFIX;

/// Environment variable overriding the listen address.
pub const ENV_LISTEN: &str = "RELAY_LISTEN";

/// Environment variable overriding the download directory.
pub const ENV_DOWNLOAD_DIR: &str = "RELAY_DOWNLOAD_DIR";

/// Runtime configuration for the relay server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Address the listening socket binds to.
    pub listen: SocketAddr,

    /// Listen backlog.
    pub backlog: u32,

    /// Directory received files are written to.
    pub download_dir: PathBuf,

    /// Prefix prepended to every received file name.
    pub file_prefix: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            backlog: DEFAULT_BACKLOG,
            download_dir: PathBuf::from("."),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
        }
    }
}

impl RelayConfig {
    /// Default location of the config file, if the platform has one.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("relay").join("relayd.toml"))
    }

    /// Parses a TOML document. Missing keys keep their defaults.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            origin: "config".to_string(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;
        Self::from_toml_str(&contents).map_err(|e| match e {
            ConfigError::Parse { error, .. } => ConfigError::Parse {
                origin: path.display().to_string(),
                error,
            },
            other => other,
        })
    }

    /// Loads `path` if given, else the default file if it exists, else
    /// defaults. An explicitly named file must exist.
    pub fn load_or_default(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::load(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    /// Applies `RELAY_LISTEN` and `RELAY_DOWNLOAD_DIR` from the environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Applies overrides from an arbitrary key lookup.
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(listen) = lookup(ENV_LISTEN) {
            self.listen = parse_listen(&listen)?;
        }
        if let Some(dir) = lookup(ENV_DOWNLOAD_DIR) {
            self.download_dir = PathBuf::from(dir);
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks values that deserialize fine but cannot work.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.backlog == 0 {
            return Err(ConfigError::InvalidValue {
                field: "backlog",
                value: self.backlog.to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.file_prefix.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "file_prefix",
                value: String::new(),
                reason: "must not be empty, received files would keep the sender's name"
                    .to_string(),
            });
        }
        if self.file_prefix.contains(&['/', '\\'][..]) {
            return Err(ConfigError::InvalidValue {
                field: "file_prefix",
                value: self.file_prefix.clone(),
                reason: "must not contain path separators".to_string(),
            });
        }
        Ok(())
    }
}

/// Parses a listen address given as text.
pub fn parse_listen(value: &str) -> Result<SocketAddr, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidValue {
            field: "listen",
            value: value.to_string(),
            reason: "expected HOST:PORT".to_string(),
        })
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file {}: {error}", .path.display())]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse {origin}: {error}")]
    Parse { origin: String, error: String },

    #[error("Invalid {field} {value:?}: {reason}")]
    InvalidValue {
        field: &'static str,
        value: String,
        reason: String,
    },
}
