use crate::core::{ConversionError, PhysicalSeries, RawWaveform};

/// Code multiplier from the instrument's communication manual.
pub const CODE_SCALE: f64 = 10.0;
/// Code value corresponding to full scale.
pub const FULL_SCALE: f64 = 24000.0;
/// Accelerometer sensitivity: 10 V per g, in (m/s^2) per volt.
pub const ACCEL_PER_VOLT: f64 = 9.81 / 10.0;

/// `range * code * 10 / 24000 + offset` for every code.
pub fn codes_to_volts(codes: &[i16], range: f64, offset: f64) -> Vec<f64> {
    codes
        .iter()
        .map(|&code| range * code as f64 * CODE_SCALE / FULL_SCALE + offset)
        .collect()
}

/// Sensor volts to acceleration, undoing the amplifier gain.
pub fn volts_to_acceleration(volts: &[f64], gain: f64) -> Vec<f64> {
    volts.iter().map(|v| ACCEL_PER_VOLT * v / gain).collect()
}

/// Convert a captured waveform to calibrated units.
pub fn convert(raw: &RawWaveform, gain: f64) -> Result<PhysicalSeries, ConversionError> {
    if !(raw.sample_rate.is_finite() && raw.sample_rate > 0.0) {
        return Err(ConversionError::InvalidSampleRate(raw.sample_rate));
    }
    if !(raw.range.is_finite() && raw.offset.is_finite()) {
        return Err(ConversionError::NonFiniteCalibration {
            range: raw.range,
            offset: raw.offset,
        });
    }
    if !gain.is_finite() || gain == 0.0 {
        return Err(ConversionError::InvalidGain(gain));
    }

    let voltage = codes_to_volts(&raw.codes, raw.range, raw.offset);
    let acceleration = volts_to_acceleration(&voltage, gain);

    Ok(PhysicalSeries {
        channel: raw.channel,
        sample_rate: raw.sample_rate,
        voltage,
        acceleration,
    })
}
