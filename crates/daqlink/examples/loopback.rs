//! Device and host in one process over loopback TCP.
//!
//! Run with:
//!   cargo run --example loopback
//!
//! The device binds an ephemeral port, the host asks for 5 batches of 8
//! samples per second, prints three of them, then stops.

use std::sync::Arc;
use std::time::Duration;

use daqlink::device::{DeviceServer, EngineConfig, SineWave};
use daqlink::host::Host;
use daqlink::transport::{Communicator, Endpoint};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let server = DeviceServer::bind(
        &Endpoint::tcp("127.0.0.1", 0),
        SineWave::new(1.0, 0.5),
        EngineConfig::default(),
    )
    .await?;
    let endpoint = server.endpoint().clone();
    eprintln!("Device listening on {endpoint}");

    let shutdown = CancellationToken::new();
    let device = tokio::spawn(server.serve(shutdown.clone()));

    let host = Host::new(Arc::new(Communicator::new(endpoint)));
    host.connect(Duration::from_secs(2)).await?;
    let mut measurements = host.measurements()?;

    host.send_configuration(5, 8).await?;
    host.start().await?;

    for index in 0..3 {
        match measurements.next().await {
            Some(Ok(measurement)) => eprintln!("#{index}: {:?}", measurement.data),
            Some(Err(err)) => return Err(err.into()),
            None => break,
        }
    }

    host.stop().await?;
    host.dispose().await;

    shutdown.cancel();
    device.await??;
    Ok(())
}
