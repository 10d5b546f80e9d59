use std::time::Duration;

use crate::error::ConfigurationError;
use crate::wire::measurement_frame_len;

/// Commands a host may issue to a device.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
#[repr(i32)]
pub enum CommandCode {
    Start = 0,
    Stop = 1,
}

/// A single command. `code` holds the raw wire value; use [`Command::code`]
/// for the typed view.
#[derive(Clone, Copy, PartialEq, Eq, Hash, prost::Message)]
pub struct Command {
    #[prost(enumeration = "CommandCode", tag = "1")]
    pub code: i32,
}

impl Command {
    pub fn new(code: CommandCode) -> Self {
        Self { code: code as i32 }
    }

    pub fn start() -> Self {
        Self::new(CommandCode::Start)
    }

    pub fn stop() -> Self {
        Self::new(CommandCode::Stop)
    }

    /// The typed command code, or `None` when the raw value is unknown.
    pub fn command_code(&self) -> Option<CommandCode> {
        CommandCode::try_from(self.code).ok()
    }
}

impl From<CommandCode> for Command {
    fn from(code: CommandCode) -> Self {
        Self::new(code)
    }
}

/// Sampling parameters for an acquisition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, prost::Message)]
pub struct Configuration {
    #[prost(uint32, tag = "1")]
    pub measurements_per_second: u32,
    #[prost(uint32, tag = "2")]
    pub samples_per_measurement: u32,
}

/// Highest rate with a non-zero sampling period (one measurement per nanosecond).
pub const MAX_MEASUREMENTS_PER_SECOND: u32 = 1_000_000_000;

impl Configuration {
    pub fn new(measurements_per_second: u32, samples_per_measurement: u32) -> Self {
        Self {
            measurements_per_second,
            samples_per_measurement,
        }
    }

    /// A configuration can start an acquisition only when both values are
    /// non-zero and the rate leaves a non-zero period.
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.measurements_per_second == 0 {
            return Err(ConfigurationError::ZeroRate);
        }
        if self.measurements_per_second > MAX_MEASUREMENTS_PER_SECOND {
            return Err(ConfigurationError::RateTooHigh {
                max: MAX_MEASUREMENTS_PER_SECOND,
            });
        }
        if self.samples_per_measurement == 0 {
            return Err(ConfigurationError::ZeroSamples);
        }
        Ok(())
    }

    /// [`validate`](Self::validate), and also require that one measurement
    /// fits in a frame of at most `max_frame_size` bytes.
    pub fn validate_within(&self, max_frame_size: usize) -> Result<(), ConfigurationError> {
        self.validate()?;
        let frame_size = measurement_frame_len(self.samples());
        if frame_size > max_frame_size {
            return Err(ConfigurationError::TooManySamples {
                samples: self.samples_per_measurement,
                frame_size,
                max_frame_size,
            });
        }
        Ok(())
    }

    /// Time between consecutive measurements, `None` when the rate is zero or
    /// too high for a non-zero period.
    pub fn period(&self) -> Option<Duration> {
        if self.measurements_per_second == 0 {
            return None;
        }
        Some(Duration::from_secs(1) / self.measurements_per_second).filter(|p| !p.is_zero())
    }

    pub fn samples(&self) -> usize {
        self.samples_per_measurement as usize
    }
}

/// One batch of samples.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Measurement {
    #[prost(float, repeated, tag = "1")]
    pub data: Vec<f32>,
}

impl Measurement {
    pub fn new(data: Vec<f32>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// True when the batch has exactly `samples_per_measurement` samples.
    pub fn length_matches(&self, samples_per_measurement: u32) -> bool {
        self.data.len() == samples_per_measurement as usize
    }
}

impl From<Vec<f32>> for Measurement {
    fn from(data: Vec<f32>) -> Self {
        Self::new(data)
    }
}

/// The one-of payload carried by every frame.
#[derive(Clone, PartialEq, prost::Oneof)]
pub enum Message {
    #[prost(message, tag = "1")]
    Command(Command),
    #[prost(message, tag = "2")]
    Configuration(Configuration),
    #[prost(message, tag = "3")]
    Measurement(Measurement),
}

impl Message {
    /// Variant name, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Command(_) => "command",
            Self::Configuration(_) => "configuration",
            Self::Measurement(_) => "measurement",
        }
    }
}

impl From<Command> for Message {
    fn from(value: Command) -> Self {
        Self::Command(value)
    }
}

impl From<CommandCode> for Message {
    fn from(value: CommandCode) -> Self {
        Self::Command(Command::new(value))
    }
}

impl From<Configuration> for Message {
    fn from(value: Configuration) -> Self {
        Self::Configuration(value)
    }
}

impl From<Measurement> for Message {
    fn from(value: Measurement) -> Self {
        Self::Measurement(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_codes_have_stable_wire_values() {
        assert_eq!(CommandCode::Start as i32, 0);
        assert_eq!(CommandCode::Stop as i32, 1);
        assert_eq!(Command::start().command_code(), Some(CommandCode::Start));
        assert_eq!(Command::stop().command_code(), Some(CommandCode::Stop));
        assert_eq!(Command { code: 9 }.command_code(), None);
    }

    #[test]
    fn configuration_validity() {
        assert!(Configuration::new(10, 4).is_valid());
        assert_eq!(
            Configuration::new(0, 4).validate(),
            Err(ConfigurationError::ZeroRate)
        );
        assert_eq!(
            Configuration::new(10, 0).validate(),
            Err(ConfigurationError::ZeroSamples)
        );
        assert!(!Configuration::default().is_valid());
    }

    #[test]
    fn rate_must_leave_a_non_zero_period() {
        assert!(Configuration::new(MAX_MEASUREMENTS_PER_SECOND, 1).is_valid());
        assert_eq!(
            Configuration::new(MAX_MEASUREMENTS_PER_SECOND, 1).period(),
            Some(Duration::from_nanos(1))
        );
        assert_eq!(
            Configuration::new(2_000_000_000, 4).validate(),
            Err(ConfigurationError::RateTooHigh {
                max: MAX_MEASUREMENTS_PER_SECOND
            })
        );
        assert_eq!(Configuration::new(2_000_000_000, 4).period(), None);
    }

    #[test]
    fn samples_must_fit_a_frame() {
        assert!(Configuration::new(10, 4).validate_within(1024).is_ok());
        assert_eq!(
            Configuration::new(10, 300_000).validate_within(1024 * 1024),
            Err(ConfigurationError::TooManySamples {
                samples: 300_000,
                frame_size: 1_200_008,
                max_frame_size: 1024 * 1024,
            })
        );
        // Zero values are still reported first.
        assert_eq!(
            Configuration::new(0, 300_000).validate_within(1024),
            Err(ConfigurationError::ZeroRate)
        );
    }

    #[test]
    fn configuration_period() {
        assert_eq!(
            Configuration::new(10, 4).period(),
            Some(Duration::from_millis(100))
        );
        assert_eq!(
            Configuration::new(1, 4).period(),
            Some(Duration::from_secs(1))
        );
        assert_eq!(Configuration::new(0, 4).period(), None);
    }

    #[test]
    fn measurement_length_check() {
        let m = Measurement::new(vec![0.0, 0.5, 1.0, 0.5]);
        assert!(m.length_matches(4));
        assert!(!m.length_matches(3));
        assert_eq!(m.len(), 4);
        assert!(Measurement::default().is_empty());
    }

    #[test]
    fn message_kinds() {
        assert_eq!(Message::from(CommandCode::Stop).kind(), "command");
        assert_eq!(
            Message::from(Configuration::new(1, 1)).kind(),
            "configuration"
        );
        assert_eq!(Message::from(Measurement::default()).kind(), "measurement");
    }
}
