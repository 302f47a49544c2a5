//! Power spectral density estimation.
//!
//! Both estimators return one-sided densities (units²/Hz) after removing the
//! mean of each segment. [`estimate`] drops the first and last bin of the raw
//! estimate: the first is DC and the last carries a digitizer edge artifact.
//! Every frequency it returns is therefore strictly positive, which is what
//! makes [`position_psd`] safe.

use rustfft::{num_complex::Complex64, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::sync::Arc;

use crate::core::SpectralError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Estimator {
    /// Single rectangular window over the whole record, for short or transient captures
    #[default]
    Periodogram,
    /// Blackman-windowed, non-overlapping one-second segments, averaged
    Welch,
}

/// Frequency axis with matching density values.
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum {
    pub frequencies: Vec<f64>,
    pub psd: Vec<f64>,
}

impl Spectrum {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

/// Edge-trimmed spectrum of an acceleration series.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectralResult {
    pub estimator: Estimator,
    pub frequencies: Vec<f64>,
    /// Acceleration PSD, (m/s^2)^2/Hz
    pub psd_acc: Vec<f64>,
    /// Position-domain PSD, `psd_acc / f^2`
    pub psd_pos: Vec<f64>,
}

/// Raw one-sided periodogram, `n/2 + 1` bins including DC.
pub fn periodogram(samples: &[f64], sample_rate: f64) -> Result<Spectrum, SpectralError> {
    check_rate(sample_rate)?;
    if samples.is_empty() {
        return Err(SpectralError::InsufficientSamples(0));
    }
    let n = samples.len();
    let window = vec![1.0; n];
    let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
    Ok(Spectrum {
        frequencies: frequency_axis(n, sample_rate),
        psd: one_sided_density(samples, &window, sample_rate, &fft),
    })
}

/// Raw Welch estimate with one-second Blackman segments and no overlap.
///
/// Records shorter than one second fall back to a single segment covering
/// the whole record; samples after the last full segment are ignored.
pub fn welch(samples: &[f64], sample_rate: f64) -> Result<Spectrum, SpectralError> {
    check_rate(sample_rate)?;
    if samples.is_empty() {
        return Err(SpectralError::InsufficientSamples(0));
    }
    let segment_len = (sample_rate.round() as usize).clamp(1, samples.len());
    let window = blackman(segment_len);
    let fft = FftPlanner::<f64>::new().plan_fft_forward(segment_len);

    let mut accum = vec![0.0; segment_len / 2 + 1];
    let mut segments = 0usize;
    for segment in samples.chunks_exact(segment_len) {
        let density = one_sided_density(segment, &window, sample_rate, &fft);
        for (acc, value) in accum.iter_mut().zip(density) {
            *acc += value;
        }
        segments += 1;
    }
    for value in accum.iter_mut() {
        *value /= segments as f64;
    }

    Ok(Spectrum {
        frequencies: frequency_axis(segment_len, sample_rate),
        psd: accum,
    })
}

/// Run the selected estimator and drop the first and last bin.
pub fn estimate(
    samples: &[f64],
    sample_rate: f64,
    estimator: Estimator,
) -> Result<SpectralResult, SpectralError> {
    let raw = match estimator {
        Estimator::Periodogram => periodogram(samples, sample_rate)?,
        Estimator::Welch => welch(samples, sample_rate)?,
    };
    if raw.len() < 3 {
        return Err(SpectralError::InsufficientSamples(samples.len()));
    }

    let last = raw.len() - 1;
    let frequencies = raw.frequencies[1..last].to_vec();
    let psd_acc = raw.psd[1..last].to_vec();
    let psd_pos = position_psd(&frequencies, &psd_acc);

    Ok(SpectralResult {
        estimator,
        frequencies,
        psd_acc,
        psd_pos,
    })
}

/// Divide an acceleration PSD by `f^2` bin-wise.
///
/// Callers pass trimmed spectra only; a zero frequency here is a logic error
/// upstream.
pub fn position_psd(frequencies: &[f64], psd_acc: &[f64]) -> Vec<f64> {
    debug_assert!(frequencies.iter().all(|&f| f > 0.0));
    frequencies
        .iter()
        .zip(psd_acc)
        .map(|(f, p)| p / (f * f))
        .collect()
}

/// Largest PSD value within `[center - width/2, center + width/2]`.
pub fn band_peak(frequencies: &[f64], psd: &[f64], center: f64, width: f64) -> Option<f64> {
    let lo = center - width / 2.0;
    let hi = center + width / 2.0;
    frequencies
        .iter()
        .zip(psd)
        .filter(|(f, _)| **f >= lo && **f <= hi)
        .map(|(_, p)| *p)
        .fold(None, |max, p| match max {
            Some(m) if m >= p => Some(m),
            _ => Some(p),
        })
}

fn check_rate(sample_rate: f64) -> Result<(), SpectralError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(SpectralError::InvalidSampleRate(sample_rate))
    }
}

fn frequency_axis(n: usize, sample_rate: f64) -> Vec<f64> {
    (0..=n / 2).map(|k| k as f64 * sample_rate / n as f64).collect()
}

fn one_sided_density(
    segment: &[f64],
    window: &[f64],
    sample_rate: f64,
    fft: &Arc<dyn Fft<f64>>,
) -> Vec<f64> {
    let n = segment.len();
    let mean = segment.iter().sum::<f64>() / n as f64;
    let mut buffer: Vec<Complex64> = segment
        .iter()
        .zip(window)
        .map(|(&s, &w)| Complex64::new((s - mean) * w, 0.0))
        .collect();
    fft.process(&mut buffer);

    let window_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (sample_rate * window_power);
    let bins = n / 2 + 1;
    let mut density: Vec<f64> = buffer
        .iter()
        .take(bins)
        .map(|c| c.norm_sqr() * scale)
        .collect();

    // Fold negative frequencies in; DC and (for even n) Nyquist have no mirror
    let doubled_end = if n % 2 == 0 { bins - 1 } else { bins };
    for value in density.iter_mut().take(doubled_end).skip(1) {
        *value *= 2.0;
    }
    density
}

/// Periodic Blackman window of length `n`.
fn blackman(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| {
            let x = 2.0 * PI * i as f64 / n as f64;
            0.42 - 0.5 * x.cos() + 0.08 * (2.0 * x).cos()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blackman_shape() {
        let w = blackman(8);
        assert!(w[0].abs() < 1e-12);
        assert!((w[4] - 1.0).abs() < 1e-12);
        assert!((w[1] - w[7]).abs() < 1e-12);
    }

    #[test]
    fn test_frequency_axis_is_nyquist_bounded() {
        assert_eq!(frequency_axis(8, 8.0), vec![0.0, 1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frequency_axis(7, 7.0), vec![0.0, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_band_peak() {
        let f = [1.0, 2.0, 3.0, 4.0];
        let p = [5.0, 1.0, 7.0, 9.0];
        assert_eq!(band_peak(&f, &p, 2.5, 1.0), Some(7.0));
        assert_eq!(band_peak(&f, &p, 10.0, 1.0), None);
    }
}
