use std::path::Path;

use daqlink_device::{DeviceServer, EngineConfig, SineWave};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cmd::{parse_duration, DeviceArgs};
use crate::exit::{device_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_listening, OutputFormat};

pub async fn run(args: DeviceArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    let transport = args.transport.resolve(config)?;
    if !(args.frequency.is_finite() && args.frequency > 0.0) {
        return Err(CliError::new(USAGE, "--frequency must be a positive number"));
    }
    if !args.amplitude.is_finite() {
        return Err(CliError::new(USAGE, "--amplitude must be finite"));
    }

    let engine_config = EngineConfig {
        write_timeout: parse_duration(&args.write_timeout)?,
        ..EngineConfig::default()
    };
    let source = SineWave::new(args.amplitude, args.frequency);

    let server = DeviceServer::bind(&transport.endpoint(), source, engine_config)
        .await
        .map_err(|err| device_error("bind failed", err))?;
    print_listening(server.endpoint(), format);

    let shutdown = CancellationToken::new();
    let on_signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("interrupt received, shutting down");
                on_signal.cancel();
            }
            Err(err) => warn!(error = %err, "interrupt handler unavailable"),
        }
    });

    server
        .serve(shutdown)
        .await
        .map_err(|err| device_error("device server failed", err))?;
    Ok(SUCCESS)
}
