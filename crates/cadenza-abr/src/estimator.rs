use std::{collections::VecDeque, time::Duration};

use crate::AbrOptions;

/// Trait for throughput estimation strategies.
///
/// Allows testing `AbrEngine` with mock estimators.
#[cfg_attr(test, unimock::unimock(api = EstimatorMock))]
pub trait Estimator {
    /// Record one completed segment download.
    fn record_sample(&mut self, bytes: u64, elapsed: Duration);

    /// Estimated throughput in bits per second, `None` before any sample.
    fn estimate_bps(&self) -> Option<f64>;

    /// Drop all recorded samples.
    fn reset(&mut self);
}

/// Harmonic mean over the most recent per-segment throughput samples.
///
/// The harmonic mean is dominated by the slowest samples, so a single fast
/// burst (e.g. a CDN cache hit) cannot inflate the estimate.
#[derive(Clone, Debug)]
pub struct BandwidthEstimator {
    samples: VecDeque<f64>,
    capacity: usize,
}

impl BandwidthEstimator {
    const MIN_ELAPSED_MS: f64 = 0.5;

    pub fn new(opts: &AbrOptions) -> Self {
        Self::with_capacity(opts.bandwidth_history_len)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn record_sample(&mut self, bytes: u64, elapsed: Duration) {
        if bytes == 0 {
            tracing::trace!("bandwidth sample ignored: zero bytes");
            return;
        }

        let elapsed_ms = (elapsed.as_secs_f64() * 1000.0).max(Self::MIN_ELAPSED_MS);
        #[expect(clippy::cast_precision_loss)] // byte counts far below 2^52
        let bps = bytes as f64 * 8000.0 / elapsed_ms;

        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(bps);
    }

    pub fn estimate_bps(&self) -> Option<f64> {
        if self.samples.is_empty() {
            return None;
        }
        let inverse_sum: f64 = self.samples.iter().map(|bps| 1.0 / bps).sum();
        #[expect(clippy::cast_precision_loss)] // window length is tiny
        let n = self.samples.len() as f64;
        Some(n / inverse_sum)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn reset(&mut self) {
        self.samples.clear();
    }
}

impl Estimator for BandwidthEstimator {
    fn record_sample(&mut self, bytes: u64, elapsed: Duration) {
        self.record_sample(bytes, elapsed);
    }

    fn estimate_bps(&self) -> Option<f64> {
        self.estimate_bps()
    }

    fn reset(&mut self) {
        self.reset();
    }
}
