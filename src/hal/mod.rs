pub mod commands;
pub mod discovery;
pub mod lifecycle;
pub mod mock;
pub mod reply;
pub mod traits;

pub use discovery::{list_devices, NO_DEVICES};
pub use lifecycle::{ManagedSession, SessionState};
pub use traits::{InstrumentSession, InstrumentTransport};
