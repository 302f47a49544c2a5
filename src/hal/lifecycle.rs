use log::{debug, warn};

use super::InstrumentSession;
use crate::core::SessionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Opened,
    Closed,
    Error(String),
}

/// Wraps an opened session with state tracking so that nothing is sent after
/// `close()` and the last transport failure stays inspectable.
pub struct ManagedSession {
    inner: Box<dyn InstrumentSession>,
    address: String,
    state: SessionState,
}

impl ManagedSession {
    pub fn new(address: impl Into<String>, session: Box<dyn InstrumentSession>) -> Self {
        Self {
            inner: session,
            address: address.into(),
            state: SessionState::Opened,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    fn ensure_open(&self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Err(SessionError::Closed);
        }
        Ok(())
    }

    fn record<T>(&mut self, result: Result<T, SessionError>) -> Result<T, SessionError> {
        if let Err(e) = &result {
            self.state = SessionState::Error(e.to_string());
        }
        result
    }

    pub async fn write(&mut self, command: &str) -> Result<(), SessionError> {
        self.ensure_open()?;
        debug!("{} <- {}", self.address, command);
        let result = self.inner.write(command).await;
        self.record(result)
    }

    pub async fn query(&mut self, command: &str) -> Result<String, SessionError> {
        self.ensure_open()?;
        let result = self.inner.query(command).await;
        if let Ok(reply) = &result {
            debug!("{} <- {} -> {}", self.address, command, reply.trim_end());
        }
        self.record(result)
    }

    pub async fn query_binary(&mut self, command: &str) -> Result<Vec<i16>, SessionError> {
        self.ensure_open()?;
        let result = self.inner.query_binary(command).await;
        if let Ok(codes) = &result {
            debug!("{} <- {} -> {} codes", self.address, command, codes.len());
        }
        self.record(result)
    }

    /// Close the link. Closing twice is a no-op.
    pub async fn close(&mut self) -> Result<(), SessionError> {
        if self.state == SessionState::Closed {
            return Ok(());
        }
        let result = self.inner.close().await;
        self.state = SessionState::Closed;
        if let Err(e) = &result {
            warn!("closing {} failed: {}", self.address, e);
        }
        result
    }
}
