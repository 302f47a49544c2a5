use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::analysis::conversion::{CODE_SCALE, FULL_SCALE};
use crate::core::{Channel, SessionError};
use crate::hal::reply::{decode_block, encode_block};
use crate::hal::InstrumentSession;

/// Waveform held in one simulated input.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedTrace {
    pub codes: Vec<i16>,
    pub sample_rate: f64,
    pub range: f64,
    pub offset: f64,
    pub min_record: i64,
}

impl SimulatedTrace {
    pub fn new(codes: Vec<i16>, sample_rate: f64, range: f64, offset: f64) -> Self {
        Self {
            codes,
            sample_rate,
            range,
            offset,
            min_record: 0,
        }
    }

    /// Quantize voltages with the digitizer's code formula.
    pub fn from_volts(volts: &[f64], sample_rate: f64, range: f64, offset: f64) -> Self {
        let codes = volts
            .iter()
            .map(|v| {
                let code = ((v - offset) * FULL_SCALE / (range * CODE_SCALE)).round();
                code.clamp(i16::MIN as f64, i16::MAX as f64) as i16
            })
            .collect();
        Self::new(codes, sample_rate, range, offset)
    }
}

/// Everything the simulated instrument has been asked to do.
#[derive(Debug, Clone, Default)]
pub struct ScopeLog {
    pub commands: Vec<String>,
    /// (channel, start, end) of every served `SEND?`
    pub send_requests: Vec<(Channel, usize, usize)>,
    pub closed: bool,
}

impl ScopeLog {
    pub fn sends_for(&self, channel: Channel) -> usize {
        self.send_requests
            .iter()
            .filter(|(c, _, _)| *c == channel)
            .count()
    }
}

type Probe = Arc<Mutex<Box<dyn FnMut() + Send>>>;

/// In-memory oscilloscope that speaks the waveform command set.
#[derive(Clone)]
pub struct SimulatedScope {
    traces: HashMap<Channel, SimulatedTrace>,
    log: Arc<Mutex<ScopeLog>>,
    max_block: usize,
    latency: Duration,
    send_failures: HashMap<Channel, usize>,
    failing_prefixes: Vec<String>,
    length_replies: HashMap<Channel, String>,
    probe: Option<Probe>,
    trace: Option<Channel>,
    window: Option<(usize, usize)>,
}

impl Default for SimulatedScope {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedScope {
    pub fn new() -> Self {
        Self {
            traces: HashMap::new(),
            log: Arc::new(Mutex::new(ScopeLog::default())),
            max_block: 100_000,
            latency: Duration::ZERO,
            send_failures: HashMap::new(),
            failing_prefixes: Vec::new(),
            length_replies: HashMap::new(),
            probe: None,
            trace: None,
            window: None,
        }
    }

    pub fn with_trace(mut self, channel: Channel, trace: SimulatedTrace) -> Self {
        self.traces.insert(channel, trace);
        self
    }

    /// Largest `SEND?` window the instrument accepts.
    pub fn with_max_block(mut self, samples: usize) -> Self {
        self.max_block = samples;
        self
    }

    /// Delay before answering each `SEND?`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Fail the `SEND?` that would deliver chunk `chunk` of `channel`.
    pub fn fail_transfer(mut self, channel: Channel, chunk: usize) -> Self {
        self.send_failures.insert(channel, chunk);
        self
    }

    /// Fail any write or query that starts with `prefix`.
    pub fn fail_command(mut self, prefix: impl Into<String>) -> Self {
        self.failing_prefixes.push(prefix.into().to_uppercase());
        self
    }

    /// Answer `:WAVEFORM:LENGTH?` on `channel` with `reply` instead of the
    /// trace length.
    pub fn with_length_reply(mut self, channel: Channel, reply: impl Into<String>) -> Self {
        self.length_replies.insert(channel, reply.into());
        self
    }

    /// Run `probe` just before every `SEND?` is answered.
    pub fn with_probe(mut self, probe: impl FnMut() + Send + 'static) -> Self {
        self.probe = Some(Arc::new(Mutex::new(Box::new(probe))));
        self
    }

    /// Shared handle to the exchange log; clones of this scope share it.
    pub fn log(&self) -> Arc<Mutex<ScopeLog>> {
        self.log.clone()
    }

    /// Mark the link open again, as a fresh `open` on a real bus would.
    pub fn reopen(&self) {
        self.lock_log().closed = false;
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, ScopeLog> {
        self.log
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check(&self, command: &str) -> Result<String, SessionError> {
        if self.lock_log().closed {
            return Err(SessionError::Closed);
        }
        let normalized = command.trim().to_uppercase();
        self.lock_log().commands.push(command.to_string());
        if self.failing_prefixes.iter().any(|p| normalized.starts_with(p.as_str())) {
            return Err(SessionError::Io(format!("injected failure on `{}`", command)));
        }
        Ok(normalized)
    }

    fn current(&self, command: &str) -> Result<(Channel, &SimulatedTrace), SessionError> {
        let channel = self.trace.ok_or_else(|| rejected(command, "no trace selected"))?;
        let trace = self
            .traces
            .get(&channel)
            .ok_or_else(|| rejected(command, "trace has no module installed"))?;
        Ok((channel, trace))
    }
}

fn rejected(command: &str, reason: &str) -> SessionError {
    SessionError::Rejected {
        command: command.to_string(),
        reason: reason.to_string(),
    }
}

fn argument<T: std::str::FromStr>(normalized: &str, command: &str) -> Result<T, SessionError> {
    normalized
        .split_whitespace()
        .nth(1)
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| rejected(command, "bad argument"))
}

#[async_trait]
impl InstrumentSession for SimulatedScope {
    async fn write(&mut self, command: &str) -> Result<(), SessionError> {
        let normalized = self.check(command)?;

        if normalized.starts_with(":WAVEFORM:TRACE ") {
            let n: u32 = argument(&normalized, command)?;
            self.trace = Some(Channel(n));
            self.window = None;
        } else if normalized.starts_with(":WAVEFORM:RECORD ") {
            let _: i64 = argument(&normalized, command)?;
        } else if normalized.starts_with(":WAVEFORM:START ") {
            let mut bounds = normalized
                .split(';')
                .map(|part| part.split_whitespace().nth(1).and_then(|s| s.parse::<usize>().ok()));
            match (bounds.next().flatten(), bounds.next().flatten()) {
                (Some(start), Some(end)) => self.window = Some((start, end)),
                _ => return Err(rejected(command, "bad window")),
            }
        } else if !matches!(
            normalized.as_str(),
            ":STOP" | ":START" | ":WAVEFORM:FORMAT WORD" | ":WAVEFORM:BYTEORDER LSBFIRST"
        ) {
            return Err(rejected(command, "unknown command"));
        }
        Ok(())
    }

    async fn query(&mut self, command: &str) -> Result<String, SessionError> {
        let normalized = self.check(command)?;
        let (channel, trace) = self.current(command)?;

        let reply = match normalized.as_str() {
            ":WAVEFORM:RECORD? MINIMUM" => format!(":WAVEFORM:RECORD {}", trace.min_record),
            ":WAVEFORM:LENGTH?" => match self.length_replies.get(&channel) {
                Some(reply) => reply.clone(),
                None => format!(":WAVEFORM:LENGTH {}", trace.codes.len()),
            },
            ":WAVEFORM:SRATE?" => format!(":WAVEFORM:SRATE {:E}", trace.sample_rate),
            ":WAVEFORM:OFFSET?" => format!(":WAVEFORM:OFFSET {:E}", trace.offset),
            ":WAVEFORM:RANGE?" => format!(":WAVEFORM:RANGE {:E}", trace.range),
            _ => return Err(rejected(command, "unknown query")),
        };
        Ok(reply)
    }

    async fn query_binary(&mut self, command: &str) -> Result<Vec<i16>, SessionError> {
        let normalized = self.check(command)?;
        if normalized != ":WAVEFORM:SEND?" {
            return Err(rejected(command, "not a binary query"));
        }
        let (channel, trace) = self.current(command)?;
        let (start, end) = self.window.ok_or_else(|| rejected(command, "no window set"))?;
        if end < start || end >= trace.codes.len() {
            return Err(rejected(command, "window outside record"));
        }
        if end - start + 1 > self.max_block {
            return Err(rejected(command, "window exceeds transfer buffer"));
        }
        let block = encode_block(&trace.codes[start..=end]);

        if let Some(probe) = &self.probe {
            let mut probe = probe.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            (*probe)();
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let delivered = self.lock_log().sends_for(channel);
        if self.send_failures.get(&channel) == Some(&delivered) {
            return Err(SessionError::Timeout);
        }
        self.lock_log().send_requests.push((channel, start, end));

        decode_block(&block)
    }

    async fn close(&mut self) -> Result<(), SessionError> {
        self.lock_log().closed = true;
        Ok(())
    }
}
