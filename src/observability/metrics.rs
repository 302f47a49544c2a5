use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::core::Channel;

/// Counters for one channel's chunked transfer.
#[derive(Debug)]
pub struct TransferMetrics {
    channel: Channel,
    chunks_requested: AtomicU64,
    samples_received: AtomicU64,
    failures: AtomicU64,
    total_latency_us: AtomicU64,
    latency_samples: AtomicU64,
}

impl TransferMetrics {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            chunks_requested: AtomicU64::new(0),
            samples_received: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            total_latency_us: AtomicU64::new(0),
            latency_samples: AtomicU64::new(0),
        }
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn chunks_requested(&self) -> u64 {
        self.chunks_requested.load(Ordering::Relaxed)
    }

    pub fn samples_received(&self) -> u64 {
        self.samples_received.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Mark a `SEND?` as issued and start its latency clock.
    pub fn start_chunk(&self) -> Instant {
        self.chunks_requested.fetch_add(1, Ordering::Relaxed);
        Instant::now()
    }

    pub fn finish_chunk(&self, start: Instant, samples: usize) {
        let latency_us = start.elapsed().as_micros() as u64;
        self.samples_received.fetch_add(samples as u64, Ordering::Relaxed);
        self.total_latency_us.fetch_add(latency_us, Ordering::Relaxed);
        self.latency_samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn avg_chunk_latency_us(&self) -> u64 {
        let samples = self.latency_samples.load(Ordering::Relaxed);
        if samples == 0 {
            return 0;
        }
        self.total_latency_us.load(Ordering::Relaxed) / samples
    }
}
