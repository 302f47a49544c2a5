use async_trait::async_trait;

use crate::core::SessionError;

/// Command/query link to one opened instrument.
///
/// Sessions are not safe for concurrent use: every exchange of a run happens
/// sequentially through a single `&mut` borrow.
#[async_trait]
pub trait InstrumentSession: Send {
    /// Send a command that produces no reply
    async fn write(&mut self, command: &str) -> Result<(), SessionError>;

    /// Send a query and return the ASCII reply
    async fn query(&mut self, command: &str) -> Result<String, SessionError>;

    /// Send a query whose reply is a binary block of little-endian int16 codes
    async fn query_binary(&mut self, command: &str) -> Result<Vec<i16>, SessionError>;

    /// Release the link
    async fn close(&mut self) -> Result<(), SessionError>;
}

/// Enumerates instrument addresses and opens sessions on them.
#[async_trait]
pub trait InstrumentTransport: Send + Sync {
    /// Unique transport identifier (e.g., "visa-usb", "simulated")
    fn transport_id(&self) -> &str;

    /// Addresses of reachable instruments
    async fn list_resources(&self) -> Result<Vec<String>, SessionError>;

    /// Open a session on `address`
    async fn open(&self, address: &str) -> Result<Box<dyn InstrumentSession>, SessionError>;
}
