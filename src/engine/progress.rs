use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

/// Point-in-time view of a run's progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Index of the channel being transferred, counting from 0
    pub iteration: usize,
    /// Fraction of the current channel's samples received, in [0, 1]
    pub fraction: f64,
    pub total_channels: usize,
    pub done: bool,
}

impl ProgressSnapshot {
    /// Fraction of the whole run, in [0, 1].
    pub fn overall(&self) -> f64 {
        if self.done {
            return 1.0;
        }
        if self.total_channels == 0 {
            return 0.0;
        }
        ((self.iteration as f64 + self.fraction) / self.total_channels as f64).clamp(0.0, 1.0)
    }
}

/// Lock-free progress cell written by the acquisition task and polled by
/// observers.
///
/// Iteration and fraction share one word (high and low 32 bits, the fraction
/// as `f32` bits) so a reader never pairs a new channel index with the
/// previous channel's fraction.
#[derive(Debug, Default)]
pub struct Progress {
    position: AtomicU64,
    total_channels: AtomicUsize,
    done: AtomicBool,
}

fn pack(iteration: usize, fraction: f32) -> u64 {
    ((iteration as u64) << 32) | u64::from(fraction.to_bits())
}

fn unpack(bits: u64) -> (usize, f32) {
    ((bits >> 32) as usize, f32::from_bits(bits as u32))
}

impl Progress {
    pub fn new() -> Self {
        Self::default()
    }

    /// Zero everything for a run over `total_channels` channels.
    pub fn reset(&self, total_channels: usize) {
        self.done.store(false, Ordering::Release);
        self.total_channels.store(total_channels, Ordering::Release);
        self.position.store(pack(0, 0.0), Ordering::Release);
    }

    pub fn begin_channel(&self, iteration: usize) {
        self.position.store(pack(iteration, 0.0), Ordering::Release);
    }

    /// Record the current channel's fraction. Values lower than the last one
    /// stored are ignored.
    pub fn set_fraction(&self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0) as f32;
        let _ = self
            .position
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                let (iteration, current) = unpack(bits);
                (fraction > current).then(|| pack(iteration, fraction))
            });
    }

    pub fn finish(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let done = self.done.load(Ordering::Acquire);
        let (iteration, fraction) = unpack(self.position.load(Ordering::Acquire));
        ProgressSnapshot {
            iteration,
            fraction: f64::from(fraction),
            total_channels: self.total_channels.load(Ordering::Acquire),
            done,
        }
    }
}
