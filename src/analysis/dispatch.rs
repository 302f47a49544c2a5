use log::warn;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::resonance::{self, FitOptions};
use super::spectral::{self, Estimator};
use super::xy::{xy_transform, XyCalibration, XyResult};
use crate::core::{Channel, ChannelError, PhysicalSeries, ResultBundle, SeriesKey, XyError};

/// One requested analysis. Each is an independent flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisMode {
    TimeDomain,
    FrequencyDomain,
    Resonance,
    /// Two-channel force/displacement transform
    XyTransform,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModeSet(BTreeSet<AnalysisMode>);

impl ModeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, mode: AnalysisMode) -> Self {
        self.0.insert(mode);
        self
    }

    pub fn insert(&mut self, mode: AnalysisMode) -> bool {
        self.0.insert(mode)
    }

    pub fn contains(&self, mode: AnalysisMode) -> bool {
        self.0.contains(&mode)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = AnalysisMode> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<AnalysisMode> for ModeSet {
    fn from_iter<I: IntoIterator<Item = AnalysisMode>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// What to compute for every channel of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisPlan {
    pub modes: ModeSet,
    pub estimator: Estimator,
    pub fit: FitOptions,
    pub xy: XyCalibration,
}

impl AnalysisPlan {
    fn wants_time_axis(&self) -> bool {
        self.modes.contains(AnalysisMode::TimeDomain) || self.modes.contains(AnalysisMode::Resonance)
    }

    fn wants_voltage(&self) -> bool {
        self.modes.contains(AnalysisMode::TimeDomain) || self.modes.contains(AnalysisMode::XyTransform)
    }
}

/// Run every per-channel analysis the plan requests and assemble the bundle.
///
/// A resonance fit that does not converge is recorded in the bundle and the
/// other analyses still run; a spectral failure discards the whole bundle.
pub fn analyze_channel(
    series: &PhysicalSeries,
    plan: &AnalysisPlan,
) -> Result<ResultBundle, ChannelError> {
    let mut bundle = ResultBundle::new(series.channel, series.sample_rate);
    let time = plan.wants_time_axis().then(|| series.time());

    if let Some(t) = &time {
        bundle.insert(SeriesKey::Time, t.clone());
    }
    if plan.wants_voltage() {
        bundle.insert(SeriesKey::Voltage, series.voltage.clone());
    }
    if plan.modes.contains(AnalysisMode::Resonance) {
        bundle.insert(SeriesKey::Acceleration, series.acceleration.clone());
    }

    if plan.modes.contains(AnalysisMode::FrequencyDomain) {
        let spectrum = spectral::estimate(&series.acceleration, series.sample_rate, plan.estimator)?;
        bundle.estimator = Some(spectrum.estimator);
        bundle.insert(SeriesKey::Frequency, spectrum.frequencies);
        bundle.insert(SeriesKey::PsdAcc, spectrum.psd_acc);
        bundle.insert(SeriesKey::PsdPos, spectrum.psd_pos);
    }

    if plan.modes.contains(AnalysisMode::Resonance) {
        let t = time.unwrap_or_else(|| series.time());
        let outcome = resonance::fit(&t, &series.acceleration, &plan.fit);
        match &outcome {
            Ok(fit) => bundle.insert(SeriesKey::AccFit, fit.params.curve(&t)),
            Err(e) => warn!("{}: resonance fit failed: {}", series.channel, e),
        }
        bundle.resonance = Some(outcome);
    }

    Ok(bundle)
}

/// Force/displacement transform over the two role channels.
pub fn analyze_xy<'a>(
    displacement: Channel,
    force: Channel,
    lookup: impl Fn(Channel) -> Option<&'a PhysicalSeries>,
    calibration: &XyCalibration,
) -> Result<XyResult, XyError> {
    let x = lookup(displacement).ok_or(XyError::MissingSource(displacement))?;
    let y = lookup(force).ok_or(XyError::MissingSource(force))?;
    Ok(xy_transform(x, y, calibration))
}
