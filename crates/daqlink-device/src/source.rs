use std::f64::consts::TAU;

use daqlink_schema::Configuration;

/// Something that produces samples for one measurement period.
pub trait SampleSource: Send {
    /// Called once when an acquisition starts.
    fn configure(&mut self, _configuration: &Configuration) {}

    /// Overwrite every slot in `samples`.
    fn fill(&mut self, samples: &mut [f32]);
}

impl<F> SampleSource for F
where
    F: FnMut(&mut [f32]) + Send,
{
    fn fill(&mut self, samples: &mut [f32]) {
        self(samples)
    }
}

/// Synthetic instrument: a continuous sine wave sampled at
/// `measurements_per_second * samples_per_measurement` Hz.
#[derive(Debug, Clone)]
pub struct SineWave {
    amplitude: f64,
    frequency_hz: f64,
    sample_rate_hz: f64,
    index: u64,
}

impl SineWave {
    pub fn new(amplitude: f64, frequency_hz: f64) -> Self {
        Self {
            amplitude,
            frequency_hz,
            sample_rate_hz: 1.0,
            index: 0,
        }
    }

    pub fn amplitude(&self) -> f64 {
        self.amplitude
    }

    pub fn frequency_hz(&self) -> f64 {
        self.frequency_hz
    }
}

impl Default for SineWave {
    fn default() -> Self {
        Self::new(1.0, 1.0)
    }
}

impl SampleSource for SineWave {
    fn configure(&mut self, configuration: &Configuration) {
        self.sample_rate_hz = f64::from(configuration.measurements_per_second)
            * f64::from(configuration.samples_per_measurement);
        self.index = 0;
    }

    fn fill(&mut self, samples: &mut [f32]) {
        let step = TAU * self.frequency_hz / self.sample_rate_hz.max(1.0);
        for sample in samples.iter_mut() {
            *sample = (self.amplitude * (step * self.index as f64).sin()) as f32;
            self.index = self.index.wrapping_add(1);
        }
    }
}
