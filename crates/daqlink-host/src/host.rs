use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use daqlink_frame::{FrameConfig, FrameReader, FrameWriter};
use daqlink_schema::{Command, CommandCode, Configuration, ConfigurationError, Message};
use daqlink_transport::Transport;
use tracing::{debug, info};

use crate::error::{HostError, Result};
use crate::stream::Measurements;

/// Builder for [`Host`].
pub struct HostBuilder<T: ?Sized> {
    transport: Option<Arc<T>>,
    frame_config: FrameConfig,
}

impl<T: Transport + ?Sized + 'static> HostBuilder<T> {
    pub fn new() -> Self {
        Self {
            transport: None,
            frame_config: FrameConfig::default(),
        }
    }

    /// The transport every frame goes through. Required.
    pub fn transport(mut self, transport: Arc<T>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn frame_config(mut self, frame_config: FrameConfig) -> Self {
        self.frame_config = frame_config;
        self
    }

    /// Fails with [`HostError::MissingTransport`] when no transport was given.
    pub fn build(self) -> Result<Host<T>> {
        let transport = self.transport.ok_or(HostError::MissingTransport)?;
        Ok(Host::from_parts(transport, self.frame_config))
    }
}

impl<T: Transport + ?Sized + 'static> Default for HostBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the acquisition protocol from the host side.
///
/// Sends may come from any task; they are serialized so frames never
/// interleave. The inbound [`Measurements`] stream is independent of sends
/// and can be consumed concurrently (full duplex).
pub struct Host<T: ?Sized> {
    transport: Arc<T>,
    writer: tokio::sync::Mutex<FrameWriter<Arc<T>>>,
    reader: Mutex<Option<FrameReader<Arc<T>>>>,
    configured: AtomicBool,
    disposed: Arc<AtomicBool>,
}

impl<T: Transport + ?Sized + 'static> Host<T> {
    pub fn builder() -> HostBuilder<T> {
        HostBuilder::new()
    }

    /// Build a host with default frame configuration.
    pub fn new(transport: Arc<T>) -> Self {
        Self::from_parts(transport, FrameConfig::default())
    }

    fn from_parts(transport: Arc<T>, frame_config: FrameConfig) -> Self {
        Self {
            writer: tokio::sync::Mutex::new(FrameWriter::with_config(
                Arc::clone(&transport),
                frame_config.clone(),
            )),
            reader: Mutex::new(Some(FrameReader::with_config(
                Arc::clone(&transport),
                frame_config,
            ))),
            configured: AtomicBool::new(false),
            disposed: Arc::new(AtomicBool::new(false)),
            transport,
        }
    }

    pub fn transport(&self) -> &Arc<T> {
        &self.transport
    }

    pub fn description(&self) -> String {
        self.transport.description()
    }

    /// Connect the underlying transport.
    pub async fn connect(&self, deadline: Duration) -> Result<()> {
        self.transport.connect(deadline).await?;
        info!(endpoint = %self.transport.description(), "host connected");
        Ok(())
    }

    /// Send a command.
    ///
    /// `Start` is refused locally with [`ConfigurationError::Missing`] until a
    /// valid configuration has been sent on this host.
    pub async fn send_command(&self, code: CommandCode) -> Result<()> {
        if code == CommandCode::Start && !self.configured.load(Ordering::Acquire) {
            return Err(ConfigurationError::Missing.into());
        }
        self.send(Message::Command(Command::new(code))).await
    }

    /// Send sampling parameters. Zero values are refused without touching the
    /// transport.
    pub async fn send_configuration(
        &self,
        measurements_per_second: u32,
        samples_per_measurement: u32,
    ) -> Result<()> {
        let configuration = Configuration::new(measurements_per_second, samples_per_measurement);
        configuration.validate()?;
        self.send(Message::Configuration(configuration)).await?;
        self.configured.store(true, Ordering::Release);
        Ok(())
    }

    pub async fn start(&self) -> Result<()> {
        self.send_command(CommandCode::Start).await
    }

    pub async fn stop(&self) -> Result<()> {
        self.send_command(CommandCode::Stop).await
    }

    /// Take the inbound measurement stream. Available once per host.
    pub fn measurements(&self) -> Result<Measurements<T>> {
        let reader = self.lock_reader().take().ok_or(HostError::StreamTaken)?;
        Ok(Measurements::new(reader, Arc::clone(&self.disposed)))
    }

    /// Dispose the transport. The measurement stream then ends quietly
    /// instead of reporting the closed connection.
    pub async fn dispose(&self) {
        self.disposed.store(true, Ordering::Release);
        self.transport.dispose().await;
    }

    async fn send(&self, message: Message) -> Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_frame(&message).await?;
        debug!(kind = message.kind(), "sent");
        Ok(())
    }

    fn lock_reader(&self) -> MutexGuard<'_, Option<FrameReader<Arc<T>>>> {
        self.reader
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
