pub mod config;
pub mod progress;
pub mod runner;
pub mod session;
pub mod state;
pub mod transfer;

pub use config::{AcquisitionConfig, DEFAULT_CHUNK_SIZE};
pub use progress::{Progress, ProgressSnapshot};
pub use runner::{ChannelOutcome, RunReport, RunShared};
pub use session::AcquisitionSession;
pub use state::{RunState, RunStatus};
