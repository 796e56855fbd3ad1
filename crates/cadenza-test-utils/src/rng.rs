//! Seeded link conditions for reproducible estimator and engine runs.

use std::time::Duration;

/// One simulated segment download.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Download {
    pub bytes: u64,
    pub elapsed: Duration,
}

impl Download {
    /// Throughput of this download in bits per second, as the estimator sees it.
    pub fn bps(&self) -> f64 {
        let ms = (self.elapsed.as_secs_f64() * 1000.0).max(0.5);
        self.bytes as f64 * 8000.0 / ms
    }
}

/// Link whose throughput jumps uniformly within `[min_bps, max_bps)`.
///
/// Same seed, same sequence. Iterating yields downloads of 200 ms to 4 s.
#[derive(Clone, Debug)]
pub struct LinkTrace {
    state: u64,
    min_bps: f64,
    max_bps: f64,
}

impl LinkTrace {
    const MIN_DOWNLOAD_MS: f64 = 200.0;
    const MAX_DOWNLOAD_MS: f64 = 4_000.0;

    #[must_use]
    pub fn new(seed: u64, min_bps: f64, max_bps: f64) -> Self {
        // xorshift has a fixed point at zero
        let state = seed.wrapping_mul(0x9E37_79B9_7F4A_7C15) | 1;
        Self {
            state,
            min_bps,
            max_bps,
        }
    }

    /// Next link throughput in bits per second.
    pub fn next_bps(&mut self) -> f64 {
        self.min_bps + (self.max_bps - self.min_bps) * self.unit()
    }

    pub fn next_mbps(&mut self) -> f64 {
        self.next_bps() / 1_000_000.0
    }

    pub fn next_download(&mut self) -> Download {
        let span = Self::MAX_DOWNLOAD_MS - Self::MIN_DOWNLOAD_MS;
        let ms = Self::MIN_DOWNLOAD_MS + span * self.unit();
        let elapsed = Duration::from_millis(ms as u64);
        let bytes = (self.next_bps() * elapsed.as_secs_f64() / 8.0).max(1.0) as u64;
        Download { bytes, elapsed }
    }

    /// xorshift64 step mapped to `[0, 1)`.
    fn unit(&mut self) -> f64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        (x >> 11) as f64 / (1u64 << 53) as f64
    }
}

impl Iterator for LinkTrace {
    type Item = Download;

    fn next(&mut self) -> Option<Download> {
        Some(self.next_download())
    }
}

/// `len` downloads from a seeded [`LinkTrace`].
pub fn download_trace(seed: u64, len: usize, min_bps: f64, max_bps: f64) -> Vec<Download> {
    LinkTrace::new(seed, min_bps, max_bps).take(len).collect()
}
