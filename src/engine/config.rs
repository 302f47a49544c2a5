use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::analysis::{AnalysisMode, AnalysisPlan, Estimator, FitOptions, ModeSet, XyCalibration};
use crate::core::{Channel, ConfigError};

/// Largest `SEND?` window the digitizer's transfer buffer accepts.
pub const DEFAULT_CHUNK_SIZE: usize = 100_000;

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_gain() -> f64 {
    1.0
}

/// Everything one acquisition run needs to know.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Instrument resource string
    pub address: String,
    /// Transferred in this order; for `xy_transform` the first is the
    /// displacement source and the second the force source
    pub channels: Vec<Channel>,
    pub modes: ModeSet,
    #[serde(default)]
    pub estimator: Estimator,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Amplifier gain applied to every channel without an override
    #[serde(default = "default_gain")]
    pub amp_gain: f64,
    #[serde(default)]
    pub channel_gains: BTreeMap<Channel, f64>,
    #[serde(default)]
    pub xy: XyCalibration,
    #[serde(default)]
    pub fit: FitOptions,
}

impl AcquisitionConfig {
    pub fn new(address: impl Into<String>, channels: Vec<Channel>, modes: ModeSet) -> Self {
        Self {
            address: address.into(),
            channels,
            modes,
            estimator: Estimator::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            amp_gain: default_gain(),
            channel_gains: BTreeMap::new(),
            xy: XyCalibration::default(),
            fit: FitOptions::default(),
        }
    }

    pub fn from_json(config: Value) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_value(config).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let value: Value = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        Ok(Self::from_json(value)?)
    }

    /// Reject configurations that cannot produce a meaningful run. Called
    /// before any instrument I/O.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channels.is_empty() {
            return Err(ConfigError::NoChannels);
        }
        if self.channels.iter().any(|c| c.number() == 0) {
            return Err(ConfigError::InvalidChannel);
        }
        let mut seen = BTreeSet::new();
        for &channel in &self.channels {
            if !seen.insert(channel) {
                return Err(ConfigError::DuplicateChannel(channel));
            }
        }
        if self.modes.is_empty() {
            return Err(ConfigError::NoModes);
        }
        if self.modes.contains(AnalysisMode::XyTransform) && self.channels.len() != 2 {
            return Err(ConfigError::XyChannelCount(self.channels.len()));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::InvalidChunkSize);
        }
        Ok(())
    }

    pub fn gain_for(&self, channel: Channel) -> f64 {
        self.channel_gains
            .get(&channel)
            .copied()
            .unwrap_or(self.amp_gain)
    }

    /// Displacement and force source channels, when the xy transform is requested.
    pub fn xy_roles(&self) -> Option<(Channel, Channel)> {
        match self.channels.as_slice() {
            [displacement, force] if self.modes.contains(AnalysisMode::XyTransform) => {
                Some((*displacement, *force))
            }
            _ => None,
        }
    }

    pub fn plan(&self) -> AnalysisPlan {
        AnalysisPlan {
            modes: self.modes.clone(),
            estimator: self.estimator,
            fit: self.fit.clone(),
            xy: self.xy,
        }
    }
}
