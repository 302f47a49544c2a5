pub mod conversion;
pub mod dispatch;
pub mod resonance;
pub mod spectral;
pub mod xy;

pub use conversion::convert;
pub use dispatch::{analyze_channel, analyze_xy, AnalysisMode, AnalysisPlan, ModeSet};
pub use resonance::{DampedSine, FitOptions, ResonanceFit};
pub use spectral::{Estimator, SpectralResult};
pub use xy::{XyCalibration, XyResult};
