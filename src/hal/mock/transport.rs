use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::SimulatedScope;
use crate::core::SessionError;
use crate::hal::{InstrumentSession, InstrumentTransport};

/// Bus of simulated instruments addressed by resource string.
#[derive(Clone, Default)]
pub struct SimulatedTransport {
    instruments: BTreeMap<String, SimulatedScope>,
    enumeration_fails: bool,
    opens: Arc<AtomicUsize>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instrument(mut self, address: impl Into<String>, scope: SimulatedScope) -> Self {
        self.instruments.insert(address.into(), scope);
        self
    }

    /// Make `list_resources` fail as if the bus driver were missing.
    pub fn with_broken_enumeration(mut self) -> Self {
        self.enumeration_fails = true;
        self
    }

    /// Number of successful and attempted `open` calls.
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstrumentTransport for SimulatedTransport {
    fn transport_id(&self) -> &str {
        "simulated"
    }

    async fn list_resources(&self) -> Result<Vec<String>, SessionError> {
        if self.enumeration_fails {
            return Err(SessionError::Io("resource manager unavailable".to_string()));
        }
        Ok(self.instruments.keys().cloned().collect())
    }

    async fn open(&self, address: &str) -> Result<Box<dyn InstrumentSession>, SessionError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.instruments
            .get(address)
            .cloned()
            .map(|scope| {
                scope.reopen();
                Box::new(scope) as Box<dyn InstrumentSession>
            })
            .ok_or_else(|| SessionError::Io(format!("no instrument at {}", address)))
    }
}
