pub mod bundle;
pub mod channel;
pub mod error;

pub use bundle::{ChannelData, ResultBundle, SeriesKey};
pub use channel::{Channel, PhysicalSeries, RawWaveform};
pub use error::{
    AcquisitionError, ChannelError, ConfigError, ConnectionError, ConversionError,
    FitConvergenceError, SessionError, SpectralError, TransferError, XyError,
};
