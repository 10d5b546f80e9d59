use std::mem;
use std::sync::Arc;
use std::time::Duration;

use daqlink_frame::{FrameConfig, FrameError, FrameReader, FrameWriter, DEFAULT_MAX_FRAME_SIZE};
use daqlink_schema::{CommandCode, Configuration, ConfigurationError, Measurement, Message};
use daqlink_transport::Transport;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::{DeviceError, Result};
use crate::source::SampleSource;

/// Default budget for writing one measurement frame.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(2);
/// Default number of decoded frames buffered between the reader and the engine.
pub const DEFAULT_INBOX_CAPACITY: usize = 16;

/// Acquisition state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Idle,
    Running,
}

/// Result of handling one inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The stored configuration was replaced.
    Configured,
    /// Idle to Running.
    Started,
    /// Running to Idle.
    Stopped,
    /// Nothing changed.
    Unchanged,
}

/// Session tuning.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Budget for one measurement write. A write that cannot complete in time
    /// ends the session.
    pub write_timeout: Duration,
    /// Decoded frames held between the reader task and the engine.
    pub inbox_capacity: usize,
    pub max_frame_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            write_timeout: DEFAULT_WRITE_TIMEOUT,
            inbox_capacity: DEFAULT_INBOX_CAPACITY,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl EngineConfig {
    fn frame_config(&self) -> FrameConfig {
        FrameConfig {
            max_frame_size: self.max_frame_size,
            write_timeout: Some(self.write_timeout),
        }
    }
}

/// The device protocol state machine.
///
/// [`handle_message`](Self::handle_message) and [`sample`](Self::sample) are
/// the pure steps; [`run`](Self::run) drives them against a transport.
pub struct DeviceEngine<S> {
    state: EngineState,
    configuration: Option<Configuration>,
    samples: Vec<f32>,
    source: S,
    max_frame_size: usize,
}

impl<S: SampleSource> DeviceEngine<S> {
    pub fn new(source: S) -> Self {
        Self {
            state: EngineState::Idle,
            configuration: None,
            samples: Vec::new(),
            source,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }

    /// Largest measurement frame Start will accept a configuration for.
    /// [`run`](Self::run) replaces it with `EngineConfig::max_frame_size`.
    pub fn with_max_frame_size(mut self, max_frame_size: usize) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    /// The stored configuration, valid or not.
    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_ref()
    }

    /// Time between measurements while running.
    pub fn period(&self) -> Option<Duration> {
        match self.state {
            EngineState::Running => self.configuration.as_ref().and_then(Configuration::period),
            EngineState::Idle => None,
        }
    }

    /// Back to Idle with no configuration.
    pub fn reset(&mut self) {
        self.state = EngineState::Idle;
        self.configuration = None;
        self.samples.clear();
    }

    /// Apply one inbound message.
    ///
    /// Rejections leave the engine unchanged.
    pub fn handle_message(&mut self, message: Message) -> Result<Transition> {
        match message {
            Message::Configuration(configuration) => self.configure(configuration),
            Message::Command(command) => match command.command_code() {
                Some(CommandCode::Start) => self.start(),
                Some(CommandCode::Stop) => Ok(self.stop()),
                None => {
                    warn!(code = command.code, "ignoring unknown command code");
                    Ok(Transition::Unchanged)
                }
            },
            Message::Measurement(measurement) => {
                warn!(samples = measurement.len(), "ignoring measurement sent to device");
                Ok(Transition::Unchanged)
            }
        }
    }

    fn configure(&mut self, configuration: Configuration) -> Result<Transition> {
        if self.state == EngineState::Running {
            return Err(DeviceError::ConfigurationWhileRunning);
        }
        debug!(
            rate = configuration.measurements_per_second,
            samples = configuration.samples_per_measurement,
            "configuration stored"
        );
        self.configuration = Some(configuration);
        Ok(Transition::Configured)
    }

    fn start(&mut self) -> Result<Transition> {
        if self.state == EngineState::Running {
            debug!("start while running; ignoring");
            return Ok(Transition::Unchanged);
        }
        let configuration = self.configuration.ok_or(ConfigurationError::Missing)?;
        // Checked before the sample buffer is sized.
        configuration.validate_within(self.max_frame_size)?;

        self.samples.clear();
        self.samples.resize(configuration.samples(), 0.0);
        self.source.configure(&configuration);
        self.state = EngineState::Running;
        info!(
            rate = configuration.measurements_per_second,
            samples = configuration.samples_per_measurement,
            "acquisition started"
        );
        Ok(Transition::Started)
    }

    fn stop(&mut self) -> Transition {
        if self.state == EngineState::Idle {
            return Transition::Unchanged;
        }
        // A partially filled period is dropped, never sent short.
        self.samples.clear();
        self.state = EngineState::Idle;
        info!("acquisition stopped");
        Transition::Stopped
    }

    /// Collect one period of samples as a measurement message, or `None`
    /// when idle. Hand the message back with [`reclaim`](Self::reclaim) so
    /// the sample buffer is reused.
    pub fn sample(&mut self) -> Option<Message> {
        if self.state != EngineState::Running {
            return None;
        }
        self.source.fill(&mut self.samples);
        Some(Message::Measurement(Measurement::new(mem::take(
            &mut self.samples,
        ))))
    }

    /// Return the buffer of a message produced by [`sample`](Self::sample).
    pub fn reclaim(&mut self, message: Message) {
        if let (EngineState::Running, Message::Measurement(measurement)) = (self.state, message) {
            self.samples = measurement.data;
        }
    }

    /// Serve one connected host until it disconnects.
    ///
    /// The engine starts Idle with no configuration. Returns `Ok(())` when the
    /// host closes the stream cleanly. Protocol failures and measurement
    /// writes that exceed `write_timeout` end the session with an error.
    pub async fn run<T>(&mut self, transport: Arc<T>, config: &EngineConfig) -> Result<()>
    where
        T: Transport + ?Sized + 'static,
    {
        self.reset();
        self.max_frame_size = config.max_frame_size;

        let (inbox_tx, mut inbox) = mpsc::channel(config.inbox_capacity.max(1));
        let reader = FrameReader::with_config(Arc::clone(&transport), config.frame_config());
        let _reader_task = AbortOnDrop(tokio::spawn(forward_frames(reader, inbox_tx)));
        let mut writer = FrameWriter::with_config(Arc::clone(&transport), config.frame_config());
        let mut ticker: Option<Interval> = None;

        let outcome = loop {
            tokio::select! {
                received = inbox.recv() => match received {
                    Some(Ok(message)) => match self.handle_message(message) {
                        Ok(Transition::Started) => ticker = self.period().map(measurement_ticker),
                        Ok(Transition::Stopped) => ticker = None,
                        Ok(_) => {}
                        Err(err) => warn!(error = %err, "message rejected"),
                    },
                    Some(Err(err)) if err.is_connection_closed() => break Ok(()),
                    Some(Err(err)) => break Err(DeviceError::from(err)),
                    None => break Ok(()),
                },
                _ = next_tick(&mut ticker) => {
                    let Some(message) = self.sample() else {
                        ticker = None;
                        continue;
                    };
                    let written = writer.write_frame(&message).await;
                    self.reclaim(message);
                    if let Err(err) = written {
                        break Err(DeviceError::from(err));
                    }
                }
            }
        };

        self.reset();
        outcome
    }
}

fn measurement_ticker(period: Duration) -> Interval {
    let mut interval = tokio::time::interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

async fn next_tick(ticker: &mut Option<Interval>) {
    match ticker {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn forward_frames<T>(
    mut reader: FrameReader<Arc<T>>,
    inbox: mpsc::Sender<std::result::Result<Message, FrameError>>,
) where
    T: Transport + ?Sized,
{
    loop {
        let received = reader.read_frame().await;
        let done = received.is_err();
        if inbox.send(received).await.is_err() || done {
            break;
        }
    }
}

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SineWave;
    use daqlink_schema::Command;

    fn engine() -> DeviceEngine<SineWave> {
        DeviceEngine::new(SineWave::default())
    }

    #[test]
    fn starts_idle_without_configuration() {
        let engine = engine();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.configuration().is_none());
        assert!(engine.period().is_none());
    }

    #[test]
    fn start_without_configuration_is_rejected() {
        let mut engine = engine();
        let err = engine.handle_message(Command::start().into()).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Configuration(ConfigurationError::Missing)
        ));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.sample().is_none());
    }

    #[test]
    fn start_with_invalid_configuration_is_rejected() {
        let mut engine = engine();
        assert_eq!(
            engine
                .handle_message(Configuration::new(0, 4).into())
                .unwrap(),
            Transition::Configured
        );
        let err = engine.handle_message(Command::start().into()).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Configuration(ConfigurationError::ZeroRate)
        ));

        engine
            .handle_message(Configuration::new(10, 0).into())
            .unwrap();
        let err = engine.handle_message(Command::start().into()).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Configuration(ConfigurationError::ZeroSamples)
        ));
        assert_eq!(engine.state(), EngineState::Idle);
    }

    #[test]
    fn start_with_unschedulable_rate_is_rejected() {
        let mut engine = engine();
        engine
            .handle_message(Configuration::new(2_000_000_000, 4).into())
            .unwrap();
        let err = engine.handle_message(Command::start().into()).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Configuration(ConfigurationError::RateTooHigh { .. })
        ));
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.period().is_none());
        assert!(engine.sample().is_none());
    }

    #[test]
    fn start_with_oversize_measurement_is_rejected() {
        let mut engine = DeviceEngine::new(SineWave::default()).with_max_frame_size(1024);
        engine
            .handle_message(Configuration::new(10, 300).into())
            .unwrap();
        let err = engine.handle_message(Command::start().into()).unwrap_err();
        assert!(matches!(
            err,
            DeviceError::Configuration(ConfigurationError::TooManySamples {
                samples: 300,
                max_frame_size: 1024,
                ..
            })
        ));
        assert!(err.is_rejection());
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.sample().is_none());

        // The largest batch that fits is accepted.
        engine
            .handle_message(Configuration::new(10, 250).into())
            .unwrap();
        assert_eq!(
            engine.handle_message(Command::start().into()).unwrap(),
            Transition::Started
        );
        let message = engine.sample().expect("running engine samples");
        assert!(daqlink_schema::encoded_len(&message) <= 1024);
    }

    #[test]
    fn configure_start_sample_stop() {
        let mut engine = engine();
        engine
            .handle_message(Configuration::new(10, 4).into())
            .unwrap();
        assert_eq!(
            engine.handle_message(Command::start().into()).unwrap(),
            Transition::Started
        );
        assert_eq!(engine.state(), EngineState::Running);
        assert_eq!(engine.period(), Some(Duration::from_millis(100)));

        for _ in 0..3 {
            let message = engine.sample().expect("running engine samples");
            match &message {
                Message::Measurement(m) => assert!(m.length_matches(4)),
                other => panic!("expected measurement, got {other:?}"),
            }
            engine.reclaim(message);
        }

        assert_eq!(
            engine.handle_message(Command::stop().into()).unwrap(),
            Transition::Stopped
        );
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.sample().is_none());
    }

    #[test]
    fn sample_buffer_is_reused() {
        let mut engine = DeviceEngine::new(|samples: &mut [f32]| samples.fill(1.0));
        engine
            .handle_message(Configuration::new(100, 8).into())
            .unwrap();
        engine.handle_message(Command::start().into()).unwrap();

        let first = engine.sample().unwrap();
        let ptr = match &first {
            Message::Measurement(m) => m.data.as_ptr(),
            _ => unreachable!(),
        };
        engine.reclaim(first);
        let second = engine.sample().unwrap();
        match &second {
            Message::Measurement(m) => {
                assert_eq!(m.data.as_ptr(), ptr);
                assert_eq!(m.data, vec![1.0; 8]);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn configuration_while_running_is_rejected() {
        let mut engine = engine();
        engine
            .handle_message(Configuration::new(10, 4).into())
            .unwrap();
        engine.handle_message(Command::start().into()).unwrap();

        let err = engine
            .handle_message(Configuration::new(50, 2).into())
            .unwrap_err();
        assert!(matches!(err, DeviceError::ConfigurationWhileRunning));
        assert!(err.is_rejection());
        assert_eq!(engine.configuration(), Some(&Configuration::new(10, 4)));
        assert_eq!(engine.period(), Some(Duration::from_millis(100)));
    }

    #[test]
    fn configuration_replaced_while_idle() {
        let mut engine = engine();
        engine
            .handle_message(Configuration::new(10, 4).into())
            .unwrap();
        engine
            .handle_message(Configuration::new(20, 8).into())
            .unwrap();
        assert_eq!(engine.configuration(), Some(&Configuration::new(20, 8)));
    }

    #[test]
    fn redundant_commands_are_no_ops() {
        let mut engine = engine();
        assert_eq!(
            engine.handle_message(Command::stop().into()).unwrap(),
            Transition::Unchanged
        );
        engine
            .handle_message(Configuration::new(10, 4).into())
            .unwrap();
        engine.handle_message(Command::start().into()).unwrap();
        assert_eq!(
            engine.handle_message(Command::start().into()).unwrap(),
            Transition::Unchanged
        );
        assert_eq!(engine.state(), EngineState::Running);
    }

    #[test]
    fn measurement_from_host_is_ignored() {
        let mut engine = engine();
        assert_eq!(
            engine
                .handle_message(Measurement::new(vec![1.0]).into())
                .unwrap(),
            Transition::Unchanged
        );
    }

    #[test]
    fn stop_discards_buffer_and_restart_resizes() {
        let mut engine = engine();
        engine
            .handle_message(Configuration::new(10, 4).into())
            .unwrap();
        engine.handle_message(Command::start().into()).unwrap();
        engine.handle_message(Command::stop().into()).unwrap();

        engine
            .handle_message(Configuration::new(10, 6).into())
            .unwrap();
        engine.handle_message(Command::start().into()).unwrap();
        match engine.sample() {
            Some(Message::Measurement(m)) => assert!(m.length_matches(6)),
            other => panic!("expected measurement, got {other:?}"),
        }
    }

    #[test]
    fn reset_clears_everything() {
        let mut engine = engine();
        engine
            .handle_message(Configuration::new(10, 4).into())
            .unwrap();
        engine.handle_message(Command::start().into()).unwrap();
        engine.reset();
        assert_eq!(engine.state(), EngineState::Idle);
        assert!(engine.configuration().is_none());
    }
}
