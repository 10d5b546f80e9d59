use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Args, Subcommand};
use daqlink_transport::{ConnectionKind, TransportConfig};

use crate::exit::{transport_error, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod acquire;
pub mod device;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a simulated device that serves one host at a time.
    Device(DeviceArgs),
    /// Configure a device, start it, and print measurements.
    Acquire(AcquireArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub async fn run(
    command: Command,
    format: OutputFormat,
    config: Option<&Path>,
) -> CliResult<i32> {
    match command {
        Command::Device(args) => device::run(args, format, config).await,
        Command::Acquire(args) => acquire::run(args, format, config).await,
        Command::Version(args) => version::run(args),
    }
}

/// Endpoint selection shared by `device` and `acquire`.
///
/// Flags win over `DAQLINK_*` variables, which win over the `--config` file,
/// which wins over built-in defaults.
#[derive(Args, Debug, Default)]
pub struct TransportArgs {
    /// Transport type: named-pipe or tcp-socket.
    #[arg(long, env = "DAQLINK_CONNECTION", value_name = "TYPE")]
    pub connection: Option<String>,
    /// Pipe name (named-pipe transport).
    #[arg(long, env = "DAQLINK_PIPE_NAME", value_name = "NAME")]
    pub pipe_name: Option<String>,
    /// Host name or address (tcp-socket transport).
    #[arg(long, env = "DAQLINK_HOST")]
    pub host: Option<String>,
    /// TCP port (tcp-socket transport).
    #[arg(long, env = "DAQLINK_PORT")]
    pub port: Option<u16>,
    /// Connect deadline (e.g. 5s, 500ms).
    #[arg(long, env = "DAQLINK_CONNECT_TIMEOUT", value_name = "DURATION")]
    pub connect_timeout: Option<String>,
}

impl TransportArgs {
    pub fn resolve(&self, config: Option<&Path>) -> CliResult<TransportConfig> {
        let mut resolved = match config {
            Some(path) => TransportConfig::from_json_file(path)
                .map_err(|err| transport_error("config load failed", err))?,
            None => TransportConfig::default(),
        };

        if let Some(connection) = &self.connection {
            resolved.connection = connection
                .parse::<ConnectionKind>()
                .map_err(|err| transport_error("invalid --connection", err))?;
        }
        if let Some(pipe_name) = &self.pipe_name {
            resolved.pipe_name = pipe_name.clone();
        }
        if let Some(host) = &self.host {
            resolved.host = host.clone();
        }
        if let Some(port) = self.port {
            resolved.port = port;
        }
        if let Some(timeout) = &self.connect_timeout {
            resolved.connect_timeout_ms = parse_duration(timeout)?.as_millis() as u64;
        }
        Ok(resolved)
    }
}

#[derive(Args, Debug)]
pub struct DeviceArgs {
    #[command(flatten)]
    pub transport: TransportArgs,
    /// Budget for writing one measurement before the session is dropped.
    #[arg(long, default_value = "2s", value_name = "DURATION")]
    pub write_timeout: String,
    /// Peak amplitude of the simulated signal.
    #[arg(long, default_value_t = 1.0)]
    pub amplitude: f64,
    /// Frequency of the simulated signal in Hz.
    #[arg(long, default_value_t = 1.0)]
    pub frequency: f64,
}

#[derive(Args, Debug)]
pub struct AcquireArgs {
    #[command(flatten)]
    pub transport: TransportArgs,
    /// Measurements per second.
    #[arg(long)]
    pub rate: u32,
    /// Samples per measurement.
    #[arg(long)]
    pub samples: u32,
    /// Stop after N measurements. Default: run until interrupted.
    #[arg(long)]
    pub count: Option<usize>,
    /// Maximum wait for each measurement (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s", value_name = "DURATION")]
    pub timeout: String,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s`, or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, unit) = if let Some(num) = input.strip_suffix("ms") {
        (num, "ms")
    } else if let Some(num) = input.strip_suffix('s') {
        (num, "s")
    } else {
        (input, "s")
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    match unit {
        "ms" => Ok(Duration::from_millis(value)),
        _ => Ok(Duration::from_secs(value)),
    }
}

pub fn config_path(path: Option<&PathBuf>) -> Option<&Path> {
    path.map(PathBuf::as_path)
}
