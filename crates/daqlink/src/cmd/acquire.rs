use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use daqlink_frame::DEFAULT_MAX_FRAME_SIZE;
use daqlink_host::Host;
use daqlink_schema::Configuration;
use daqlink_transport::{Communicator, Transport};
use tracing::{debug, info, warn};

use crate::cmd::{parse_duration, AcquireArgs};
use crate::exit::{host_error, CliError, CliResult, FAILURE, INTERNAL, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_measurement, OutputFormat};

pub async fn run(args: AcquireArgs, format: OutputFormat, config: Option<&Path>) -> CliResult<i32> {
    Configuration::new(args.rate, args.samples)
        .validate_within(DEFAULT_MAX_FRAME_SIZE)
        .map_err(|err| CliError::new(USAGE, format!("invalid configuration: {err}")))?;
    let per_measurement = parse_duration(&args.timeout)?;
    let transport = args.transport.resolve(config)?;

    let host = Host::new(Arc::new(Communicator::from_config(&transport)));
    host.connect(transport.connect_timeout())
        .await
        .map_err(|err| host_error("connect failed", err))?;

    let outcome = acquire(&host, &args, per_measurement, format).await;

    if host.transport().is_connected() {
        if let Err(err) = host.stop().await {
            debug!(error = %err, "stop not delivered");
        }
    }
    host.dispose().await;
    outcome
}

async fn acquire(
    host: &Host<Communicator>,
    args: &AcquireArgs,
    per_measurement: Duration,
    format: OutputFormat,
) -> CliResult<i32> {
    // Taken before Start so no early batch is missed.
    let mut measurements = host
        .measurements()
        .map_err(|err| host_error("measurement stream unavailable", err))?;

    host.send_configuration(args.rate, args.samples)
        .await
        .map_err(|err| host_error("configure failed", err))?;
    host.start()
        .await
        .map_err(|err| host_error("start failed", err))?;
    info!(
        endpoint = %host.description(),
        rate = args.rate,
        samples = args.samples,
        "acquisition started"
    );

    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);

    let mut received = 0usize;
    while args.count.map_or(true, |count| received < count) {
        let next = tokio::select! {
            signal = &mut interrupt => {
                signal.map_err(|err| {
                    CliError::new(INTERNAL, format!("signal handler setup failed: {err}"))
                })?;
                info!(received, "interrupted");
                break;
            }
            next = tokio::time::timeout(per_measurement, measurements.next()) => next,
        };

        match next {
            Ok(Some(Ok(measurement))) => {
                if !measurement.length_matches(args.samples) {
                    warn!(
                        expected = args.samples,
                        actual = measurement.len(),
                        "measurement length differs from configuration"
                    );
                }
                print_measurement(received, &measurement, format);
                received += 1;
            }
            Ok(Some(Err(err))) if err.is_connection_closed() => {
                return Err(CliError::new(
                    FAILURE,
                    format!("device closed the connection after {received} measurements: {err}"),
                ))
            }
            Ok(Some(Err(err))) => return Err(host_error("receive failed", err)),
            Ok(None) => {
                return Err(CliError::new(
                    FAILURE,
                    format!("measurement stream ended after {received} measurements"),
                ))
            }
            Err(_) => {
                return Err(CliError::new(
                    TIMEOUT,
                    format!("no measurement within {per_measurement:?}"),
                ))
            }
        }
    }

    info!(received, "acquisition finished");
    Ok(SUCCESS)
}
