use std::{collections::VecDeque, ops::Range};

use web_time::Instant;

use crate::AbrOptions;

/// Playhead positions this close before a range start still count as inside it.
const RANGE_START_TOLERANCE_SECS: f64 = 0.1;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BufferSample {
    /// Seconds buffered ahead of the playhead.
    pub level: f64,
    pub at: Instant,
}

/// Rolling history of buffer levels used to detect a draining buffer.
#[derive(Clone, Debug)]
pub struct BufferMonitor {
    samples: VecDeque<BufferSample>,
    capacity: usize,
    min_samples: usize,
    drain_threshold: f64,
}

impl BufferMonitor {
    pub fn new(opts: &AbrOptions) -> Self {
        let capacity = opts.buffer_history_len.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            min_samples: opts.min_drain_samples,
            drain_threshold: opts.drain_threshold,
        }
    }

    pub fn sample(&mut self, level: f64, at: Instant) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(BufferSample {
            level: level.max(0.0),
            at,
        });
    }

    /// Most recent buffer level, if any sample was taken.
    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(|s| s.level)
    }

    /// Seconds of buffer lost per wall-clock second between the oldest and
    /// newest sample. `None` with too few samples or no elapsed time.
    pub fn drain_rate(&self) -> Option<f64> {
        if self.samples.len() < self.min_samples {
            return None;
        }
        let (oldest, newest) = (self.samples.front()?, self.samples.back()?);
        let elapsed = newest.at.saturating_duration_since(oldest.at).as_secs_f64();
        if elapsed <= 0.0 {
            return None;
        }
        Some((oldest.level - newest.level) / elapsed)
    }

    /// Sparse data never reports draining.
    pub fn is_draining(&self) -> bool {
        self.drain_rate()
            .is_some_and(|rate| rate > self.drain_threshold)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}

/// Seconds buffered ahead of `current_time` given the host's buffered ranges.
///
/// Returns 0 when the playhead is outside every range (a stall).
pub fn buffered_ahead(ranges: &[Range<f64>], current_time: f64) -> f64 {
    ranges
        .iter()
        .find(|r| r.start - RANGE_START_TOLERANCE_SECS <= current_time && current_time < r.end)
        .map_or(0.0, |r| r.end - current_time.max(r.start))
}
