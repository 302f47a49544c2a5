use serde::{Deserialize, Serialize};

use crate::core::{Channel, PhysicalSeries};

/// Affine constants of the displacement sensor and load cell.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct XyCalibration {
    /// mm per volt on the displacement channel
    pub displacement_gain: f64,
    /// N per volt on the force channel
    pub force_gain: f64,
    /// Force channel output at zero load (V)
    pub force_zero: f64,
    /// Block-average factor for display traces
    pub decimation: usize,
}

impl Default for XyCalibration {
    fn default() -> Self {
        Self {
            displacement_gain: -7.766,
            force_gain: 4.108,
            force_zero: 4.547,
            decimation: 100,
        }
    }
}

/// Force-vs-displacement curve built from two channels.
#[derive(Debug, Clone, PartialEq)]
pub struct XyResult {
    pub displacement_channel: Channel,
    pub force_channel: Channel,
    /// Displacement relative to its minimum (mm)
    pub distance_mm: Vec<f64>,
    pub force_n: Vec<f64>,
    /// Block-average factor taken from the calibration
    pub display_decimation: usize,
}

impl XyResult {
    pub fn len(&self) -> usize {
        self.distance_mm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.distance_mm.is_empty()
    }

    /// (distance, force) averaged over blocks of `display_decimation` samples.
    pub fn display_trace(&self) -> (Vec<f64>, Vec<f64>) {
        self.decimated(self.display_decimation)
    }

    /// Block-averaged (distance, force) pair for plotting.
    pub fn decimated(&self, factor: usize) -> (Vec<f64>, Vec<f64>) {
        (
            average_reduce(&self.distance_mm, factor),
            average_reduce(&self.force_n, factor),
        )
    }
}

/// Apply the sensor calibrations to the two voltage series.
///
/// When the records differ in length the longer one is truncated so every
/// distance has a matching force sample.
pub fn xy_transform(
    displacement: &PhysicalSeries,
    force: &PhysicalSeries,
    calibration: &XyCalibration,
) -> XyResult {
    let n = displacement.len().min(force.len());

    let mut distance_mm: Vec<f64> = displacement.voltage[..n]
        .iter()
        .map(|v| calibration.displacement_gain * v)
        .collect();
    let min = distance_mm.iter().copied().fold(f64::INFINITY, f64::min);
    if min.is_finite() {
        for d in distance_mm.iter_mut() {
            *d -= min;
        }
    }

    let force_n = force.voltage[..n]
        .iter()
        .map(|v| calibration.force_gain * (v - calibration.force_zero))
        .collect();

    XyResult {
        displacement_channel: displacement.channel,
        force_channel: force.channel,
        distance_mm,
        force_n,
        display_decimation: calibration.decimation,
    }
}

/// Mean of each consecutive block of `factor` values; the last block may be
/// shorter.
pub fn average_reduce(values: &[f64], factor: usize) -> Vec<f64> {
    if factor <= 1 {
        return values.to_vec();
    }
    values
        .chunks(factor)
        .map(|block| block.iter().sum::<f64>() / block.len() as f64)
        .collect()
}
