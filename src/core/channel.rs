use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical input on the oscilloscope, numbered from 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Channel(pub u32);

impl Channel {
    pub fn number(&self) -> u32 {
        self.0
    }
}

impl From<u32> for Channel {
    fn from(n: u32) -> Self {
        Channel(n)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch{}", self.0)
    }
}

/// Sample codes for one channel exactly as the digitizer reported them,
/// with the scale parameters that were in effect at capture time.
#[derive(Debug, Clone, PartialEq)]
pub struct RawWaveform {
    pub channel: Channel,
    pub codes: Vec<i16>,
    /// Samples per second
    pub sample_rate: f64,
    /// Full-scale range (V)
    pub range: f64,
    /// DC offset (V)
    pub offset: f64,
}

impl RawWaveform {
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }
}

/// Calibrated series derived from a [`RawWaveform`].
#[derive(Debug, Clone, PartialEq)]
pub struct PhysicalSeries {
    pub channel: Channel,
    pub sample_rate: f64,
    /// Volts, same length as the raw codes
    pub voltage: Vec<f64>,
    /// m/s^2, derived from `voltage` through the sensor factor and amplifier gain
    pub acceleration: Vec<f64>,
}

impl PhysicalSeries {
    pub fn len(&self) -> usize {
        self.voltage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voltage.is_empty()
    }

    /// Sample instants `i / fs` in seconds.
    pub fn time(&self) -> Vec<f64> {
        (0..self.voltage.len())
            .map(|i| i as f64 / self.sample_rate)
            .collect()
    }

    pub fn duration_seconds(&self) -> f64 {
        self.voltage.len() as f64 / self.sample_rate
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_axis() {
        let series = PhysicalSeries {
            channel: Channel(1),
            sample_rate: 4.0,
            voltage: vec![0.0; 5],
            acceleration: vec![0.0; 5],
        };

        assert_eq!(series.time(), vec![0.0, 0.25, 0.5, 0.75, 1.0]);
        assert_eq!(series.duration_seconds(), 1.25);
    }

    #[test]
    fn test_channel_display() {
        assert_eq!(Channel(3).to_string(), "ch3");
        let json = serde_json::to_string(&Channel(7)).unwrap();
        assert_eq!(json, "7");
    }
}
