pub mod scope;
pub mod transport;

pub use scope::{ScopeLog, SimulatedScope, SimulatedTrace};
pub use transport::SimulatedTransport;
