use thiserror::Error;

use super::Channel;

/// Failure reported by an instrument session or transport.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("i/o error: {0}")]
    Io(String),
    #[error("instrument did not answer within the transport timeout")]
    Timeout,
    #[error("instrument rejected `{command}`: {reason}")]
    Rejected { command: String, reason: String },
    #[error("session is closed")]
    Closed,
    #[error("malformed binary block: {0}")]
    MalformedBlock(String),
}

/// The instrument could not be reached or prepared. Fatal to a run.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConnectionError {
    #[error("failed to open {address}: {source}")]
    Open {
        address: String,
        #[source]
        source: SessionError,
    },
    #[error("failed to prepare instrument with `{command}`: {source}")]
    Setup {
        command: String,
        #[source]
        source: SessionError,
    },
}

/// A query or write failed while pulling one channel's waveform.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransferError {
    #[error("{channel}: `{command}` failed: {source}")]
    Command {
        channel: Channel,
        command: String,
        #[source]
        source: SessionError,
    },
    #[error("{channel}: no number in reply to `{command}`: {reply:?}")]
    MalformedReply {
        channel: Channel,
        command: String,
        reply: String,
    },
    #[error("{channel}: expected {expected} samples, received {actual}")]
    LengthMismatch {
        channel: Channel,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConversionError {
    #[error("sampling rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),
    #[error("non-finite calibration: range={range}, offset={offset}")]
    NonFiniteCalibration { range: f64, offset: f64 },
    #[error("amplifier gain must be finite and non-zero, got {0}")]
    InvalidGain(f64),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SpectralError {
    #[error("{0} samples leave no frequency bins after edge trimming")]
    InsufficientSamples(usize),
    #[error("sampling rate must be positive and finite, got {0}")]
    InvalidSampleRate(f64),
}

/// The damped-sinusoid fit did not produce usable parameters.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FitConvergenceError {
    #[error("need at least {required} samples to fit, got {actual}")]
    InsufficientData { required: usize, actual: usize },
    #[error("solver diverged to non-finite parameters after {iterations} iterations")]
    NonFinite { iterations: usize },
    #[error("no convergence within {iterations} iterations (cost {cost:e})")]
    IterationLimit { iterations: usize, cost: f64 },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum XyError {
    #[error("{0} has no voltage series for the force/displacement transform")]
    MissingSource(Channel),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("no channels configured")]
    NoChannels,
    #[error("channel numbers start at 1")]
    InvalidChannel,
    #[error("{0} configured more than once")]
    DuplicateChannel(Channel),
    #[error("xy_transform needs exactly 2 channels, {0} configured")]
    XyChannelCount(usize),
    #[error("chunk size must be at least 1")]
    InvalidChunkSize,
    #[error("no modes requested")]
    NoModes,
    #[error("invalid configuration: {0}")]
    Parse(String),
}

/// Why a single channel has no result bundle.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ChannelError {
    #[error(transparent)]
    Transfer(#[from] TransferError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
    #[error(transparent)]
    Spectral(#[from] SpectralError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum AcquisitionError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Connection(#[from] ConnectionError),
    #[error("an acquisition is already running on this session")]
    RunInProgress,
    #[error("no acquisition has been started")]
    NotStarted,
    #[error("acquisition task failed: {0}")]
    TaskFailed(String),
}
