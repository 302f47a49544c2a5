use std::collections::BTreeMap;
use std::sync::Arc;

use super::TransferMetrics;
use crate::core::Channel;

#[derive(Debug, Clone, PartialEq)]
pub struct MetricsSnapshot {
    pub channel: Channel,
    pub chunks_requested: u64,
    pub samples_received: u64,
    pub failures: u64,
    pub avg_chunk_latency_us: u64,
}

/// Transfer metrics of one run, keyed by channel.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollector {
    metrics: BTreeMap<Channel, Arc<TransferMetrics>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Metrics for `channel`, created on first use.
    pub fn channel(&mut self, channel: Channel) -> Arc<TransferMetrics> {
        self.metrics
            .entry(channel)
            .or_insert_with(|| Arc::new(TransferMetrics::new(channel)))
            .clone()
    }

    pub fn get(&self, channel: Channel) -> Option<Arc<TransferMetrics>> {
        self.metrics.get(&channel).cloned()
    }

    pub fn snapshot(&self) -> Vec<MetricsSnapshot> {
        self.metrics
            .values()
            .map(|m| MetricsSnapshot {
                channel: m.channel(),
                chunks_requested: m.chunks_requested(),
                samples_received: m.samples_received(),
                failures: m.failures(),
                avg_chunk_latency_us: m.avg_chunk_latency_us(),
            })
            .collect()
    }
}
