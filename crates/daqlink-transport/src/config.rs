use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// Pipe name used when none is configured.
pub const DEFAULT_PIPE_NAME: &str = "daqlink";
/// Host used when none is configured.
pub const DEFAULT_HOST: &str = "localhost";
/// TCP port used when none is configured.
pub const DEFAULT_PORT: u16 = 1234;
/// Connect deadline used when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// The closed set of transport variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConnectionKind {
    #[serde(alias = "pipe")]
    NamedPipe,
    #[serde(alias = "tcp")]
    TcpSocket,
}

impl FromStr for ConnectionKind {
    type Err = TransportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "named-pipe" | "namedpipe" | "pipe" => Ok(Self::NamedPipe),
            "tcp-socket" | "tcpsocket" | "tcp" => Ok(Self::TcpSocket),
            _ => Err(TransportError::UnknownConnectionKind(s.to_string())),
        }
    }
}

impl fmt::Display for ConnectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedPipe => f.write_str("named-pipe"),
            Self::TcpSocket => f.write_str("tcp-socket"),
        }
    }
}

/// Identity of a concrete endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Endpoint {
    NamedPipe { name: String },
    Tcp { host: String, port: u16 },
}

impl Endpoint {
    pub fn named_pipe(name: impl Into<String>) -> Self {
        Self::NamedPipe { name: name.into() }
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    pub fn kind(&self) -> ConnectionKind {
        match self {
            Self::NamedPipe { .. } => ConnectionKind::NamedPipe,
            Self::Tcp { .. } => ConnectionKind::TcpSocket,
        }
    }

    /// The pipe name, or `host:port`.
    pub fn target(&self) -> String {
        match self {
            Self::NamedPipe { name } => name.clone(),
            Self::Tcp { host, port } => format!("{host}:{port}"),
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NamedPipe { name } => write!(f, "Named Pipe: {name}"),
            Self::Tcp { host, port } => write!(f, "TCP Socket: {host}:{port}"),
        }
    }
}

/// Transport selection, supplied once at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransportConfig {
    pub connection: ConnectionKind,
    pub pipe_name: String,
    pub host: String,
    pub port: u16,
    pub connect_timeout_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionKind::TcpSocket,
            pipe_name: DEFAULT_PIPE_NAME.to_string(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            connect_timeout_ms: DEFAULT_CONNECT_TIMEOUT.as_millis() as u64,
        }
    }
}

impl TransportConfig {
    /// The endpoint selected by `connection`.
    pub fn endpoint(&self) -> Endpoint {
        match self.connection {
            ConnectionKind::NamedPipe => Endpoint::named_pipe(self.pipe_name.clone()),
            ConnectionKind::TcpSocket => Endpoint::tcp(self.host.clone(), self.port),
        }
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Parse a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> std::result::Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a configuration from a JSON file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|err| TransportError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        Self::from_json_str(&text).map_err(|err| TransportError::Config {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

/// Filesystem location of a named pipe.
///
/// Windows pipes live in the `\\.\pipe\` namespace. On Unix a pipe is a
/// Unix domain socket at `$TMPDIR/CoreFxPipe_<name>` (where .NET pipe streams
/// place them); a name containing `/` is taken as a literal socket path.
#[cfg(unix)]
pub fn pipe_path(name: &str) -> std::path::PathBuf {
    if name.contains('/') {
        std::path::PathBuf::from(name)
    } else {
        std::env::temp_dir().join(format!("CoreFxPipe_{name}"))
    }
}

/// Filesystem location of a named pipe.
#[cfg(windows)]
pub fn pipe_path(name: &str) -> std::path::PathBuf {
    if name.starts_with(r"\\") {
        std::path::PathBuf::from(name)
    } else {
        std::path::PathBuf::from(format!(r"\\.\pipe\{name}"))
    }
}
