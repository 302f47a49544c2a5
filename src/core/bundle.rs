use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Channel, FitConvergenceError};
use crate::analysis::resonance::ResonanceFit;
use crate::analysis::spectral::Estimator;

/// Name of one result series inside a bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKey {
    Time,
    Voltage,
    Acceleration,
    Frequency,
    PsdAcc,
    PsdPos,
    AccFit,
    Distance,
    Force,
}

impl SeriesKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Time => "t",
            Self::Voltage => "t_volt",
            Self::Acceleration => "t_acc",
            Self::Frequency => "f",
            Self::PsdAcc => "psd_acc",
            Self::PsdPos => "psd_pos",
            Self::AccFit => "acc_fit",
            Self::Distance => "distance_mm",
            Self::Force => "force_n",
        }
    }
}

impl fmt::Display for SeriesKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything computed for one channel in one run.
///
/// A bundle is assembled privately by the dispatcher and only published once
/// complete, so readers never observe a half-filled one.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultBundle {
    pub channel: Channel,
    pub sample_rate: f64,
    series: Vec<(SeriesKey, Vec<f64>)>,
    /// Estimator used for the `f`/`psd_*` series, when present
    pub estimator: Option<Estimator>,
    /// Present when resonance analysis was requested
    pub resonance: Option<Result<ResonanceFit, FitConvergenceError>>,
}

impl ResultBundle {
    pub fn new(channel: Channel, sample_rate: f64) -> Self {
        Self {
            channel,
            sample_rate,
            series: Vec::new(),
            estimator: None,
            resonance: None,
        }
    }

    /// Insert or replace a series, keeping first-insertion order.
    pub fn insert(&mut self, key: SeriesKey, values: Vec<f64>) {
        match self.series.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = values,
            None => self.series.push((key, values)),
        }
    }

    pub fn get(&self, key: SeriesKey) -> Option<&[f64]> {
        self.series
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn contains(&self, key: SeriesKey) -> bool {
        self.get(key).is_some()
    }

    pub fn keys(&self) -> impl Iterator<Item = SeriesKey> + '_ {
        self.series.iter().map(|(k, _)| *k)
    }

    pub fn series(&self) -> impl Iterator<Item = (SeriesKey, &[f64])> {
        self.series.iter().map(|(k, v)| (*k, v.as_slice()))
    }

    pub fn max_len(&self) -> usize {
        self.series.iter().map(|(_, v)| v.len()).max().unwrap_or(0)
    }
}

/// Published per-channel bundles in configured channel order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelData {
    entries: Vec<(Channel, ResultBundle)>,
}

impl ChannelData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, bundle: ResultBundle) {
        let channel = bundle.channel;
        match self.entries.iter_mut().find(|(c, _)| *c == channel) {
            Some(slot) => slot.1 = bundle,
            None => self.entries.push((channel, bundle)),
        }
    }

    pub fn get(&self, channel: Channel) -> Option<&ResultBundle> {
        self.entries
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, b)| b)
    }

    pub fn contains(&self, channel: Channel) -> bool {
        self.get(channel).is_some()
    }

    pub fn channels(&self) -> Vec<Channel> {
        self.entries.iter().map(|(c, _)| *c).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, &ResultBundle)> {
        self.entries.iter().map(|(c, b)| (*c, b))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
