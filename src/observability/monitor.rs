use super::MetricsCollector;

/// Renders the transfer metrics of a run as a text report.
pub struct RunMonitor {
    collector: MetricsCollector,
}

impl RunMonitor {
    pub fn new(collector: MetricsCollector) -> Self {
        Self { collector }
    }

    pub fn generate_report(&self) -> String {
        let snapshot = self.collector.snapshot();

        if snapshot.is_empty() {
            return "No channels transferred".to_string();
        }

        let mut report = String::from("=== Transfer Metrics ===\n");

        for metrics in &snapshot {
            report.push_str(&format!(
                "\n[{}]\n  Chunks: {} requested\n  Samples: {} received\n  Failures: {}\n  Avg Chunk Latency: {}μs\n",
                metrics.channel,
                metrics.chunks_requested,
                metrics.samples_received,
                match metrics.failures {
                    0 => "0 failures".to_string(),
                    1 => "1 failure".to_string(),
                    n => format!("{} failures", n),
                },
                metrics.avg_chunk_latency_us
            ));
        }

        report
    }

    pub fn collector(&self) -> &MetricsCollector {
        &self.collector
    }
}
