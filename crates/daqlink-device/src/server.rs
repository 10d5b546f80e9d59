use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use daqlink_transport::{Communicator, Endpoint, Listener, Transport};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::engine::{DeviceEngine, EngineConfig};
use crate::error::Result;
use crate::source::SampleSource;

/// Pause after a failed accept (e.g. descriptor exhaustion) before retrying.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Source of connected hosts.
#[async_trait]
trait Accept: Send {
    async fn accept(&mut self) -> daqlink_transport::Result<Communicator>;
}

#[async_trait]
impl Accept for Listener {
    async fn accept(&mut self) -> daqlink_transport::Result<Communicator> {
        Listener::accept(self).await
    }
}

/// Accepts one host at a time and runs a fresh engine session for each.
pub struct DeviceServer<S> {
    listener: Listener,
    engine: DeviceEngine<S>,
    config: EngineConfig,
}

impl<S: SampleSource> DeviceServer<S> {
    /// Bind the device endpoint.
    pub async fn bind(endpoint: &Endpoint, source: S, config: EngineConfig) -> Result<Self> {
        let listener = Listener::bind(endpoint).await?;
        Ok(Self {
            listener,
            engine: DeviceEngine::new(source),
            config,
        })
    }

    /// The bound endpoint (with any ephemeral TCP port resolved).
    pub fn endpoint(&self) -> &Endpoint {
        self.listener.endpoint()
    }

    /// Serve hosts until `shutdown` is cancelled.
    ///
    /// Session failures and failed accepts are logged and the server goes
    /// back to accepting.
    pub async fn serve(mut self, shutdown: CancellationToken) -> Result<()> {
        serve_sessions(&mut self.listener, &mut self.engine, &self.config, &shutdown).await;
        info!(endpoint = %self.endpoint(), "device server stopped");
        Ok(())
    }
}

async fn serve_sessions<A, S>(
    acceptor: &mut A,
    engine: &mut DeviceEngine<S>,
    config: &EngineConfig,
    shutdown: &CancellationToken,
) where
    A: Accept + ?Sized,
    S: SampleSource,
{
    loop {
        let accepted = tokio::select! {
            _ = shutdown.cancelled() => break,
            accepted = acceptor.accept() => accepted,
        };
        let transport = match accepted {
            Ok(transport) => Arc::new(transport),
            Err(err) => {
                warn!(error = %err, "accept failed");
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = tokio::time::sleep(ACCEPT_RETRY_DELAY) => continue,
                }
            }
        };
        info!(peer = %transport.description(), "host connected");

        let outcome = tokio::select! {
            _ = shutdown.cancelled() => Ok(()),
            outcome = engine.run(Arc::clone(&transport), config) => outcome,
        };
        transport.dispose().await;

        match outcome {
            Ok(()) => info!(peer = %transport.target(), "session ended"),
            Err(err) => warn!(peer = %transport.target(), error = %err, "session ended with error"),
        }
        if shutdown.is_cancelled() {
            break;
        }
    }
}
