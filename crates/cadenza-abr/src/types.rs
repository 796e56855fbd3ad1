use std::{fmt, time::Duration};

use crate::error::{AbrError, AbrResult};

/// Stable identifier of a variant within one manifest.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct VariantId(pub u64);

impl fmt::Display for VariantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl From<u64> for VariantId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// One encoded rendition of the content.
///
/// Immutable once received from the host; the catalog replaces the whole
/// list when the manifest changes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Variant {
    pub id: VariantId,
    /// Declared bandwidth in bits per second.
    pub bandwidth_bps: u64,
    /// Vertical resolution in pixels (0 when unknown).
    pub height: u32,
    pub has_video: bool,
}

impl Variant {
    pub fn new(id: u64, bandwidth_bps: u64, height: u32) -> Self {
        Self {
            id: VariantId(id),
            bandwidth_bps,
            height,
            has_video: true,
        }
    }

    /// Audio-only rendition; dropped by the catalog.
    pub fn audio_only(id: u64, bandwidth_bps: u64) -> Self {
        Self {
            id: VariantId(id),
            bandwidth_bps,
            height: 0,
            has_video: false,
        }
    }
}

/// ABR engine configuration.
///
/// Every threshold, percentile and bandwidth margin used by the switch policy
/// lives here so hosts can retune them without touching the algorithm.
#[derive(Clone)]
pub struct AbrOptions {
    /// Throughput samples kept for the harmonic-mean estimate.
    pub bandwidth_history_len: usize,
    /// Buffer samples kept for drain detection.
    pub buffer_history_len: usize,
    /// Minimum buffer samples before a drain trend is reported.
    pub min_drain_samples: usize,
    /// Drain rate (buffered seconds lost per wall-clock second) above which
    /// the buffer counts as draining.
    pub drain_threshold: f64,

    /// Buffer level (seconds) below which the critical rule fires.
    pub critical_buffer_secs: f64,
    /// Buffer level (seconds) below which the urgent rule fires.
    pub downgrade_buffer_secs: f64,
    /// Buffer level (seconds) above which normal upgrades are allowed.
    pub upgrade_buffer_secs: f64,
    /// Buffer level (seconds) above which a high-class network forces an upgrade.
    pub force_upgrade_buffer_secs: f64,
    /// Buffer level (seconds) below which a low-class network drifts toward
    /// `steady_low_percentile`.
    pub steady_low_buffer_secs: f64,
    /// Buffer level (seconds) required for the opportunistic upgrade after a
    /// segment download.
    pub opportunistic_upgrade_buffer_secs: f64,

    /// Critical down-switch clears the buffer only when the new bandwidth is
    /// below this fraction of the previous one.
    pub clear_buffer_ratio: f64,
    /// Safe margin (seconds) attached to critical and safe-mode switches.
    pub critical_safe_margin_secs: u32,

    /// Initial pick percentile on a high-class network.
    pub initial_high_percentile: f64,
    /// Initial pick percentile on a medium-class network.
    pub initial_medium_percentile: f64,
    /// Initial pick percentile on a low or unknown network.
    pub initial_low_percentile: f64,
    /// Urgent target percentile on a low-class network.
    pub urgent_low_percentile: f64,
    /// Steady-state target percentile on a low-class network.
    pub steady_low_percentile: f64,

    /// Urgent step-down keeps going while the target exceeds
    /// `usable * urgent_fit_margin`.
    pub urgent_fit_margin: f64,
    /// Forced upgrades may pick up to `usable * force_upgrade_margin`.
    pub force_upgrade_margin: f64,
    /// Steady state steps down once the current variant exceeds
    /// `usable * steady_downgrade_margin`.
    pub steady_downgrade_margin: f64,
    /// Maximum ranks a non-jumping forced upgrade advances per decision.
    pub max_upgrade_step: usize,
    /// Height cap applied on a low-class network outside urgent decisions.
    pub low_class_max_height: u32,

    /// Minimum interval between switches for non-critical evaluations.
    pub min_switch_interval: Duration,
    /// Periodic monitor tick.
    pub monitor_interval: Duration,
    /// A network-class change triggers re-evaluation when it happened within
    /// this window (start, end) before the tick.
    pub class_change_window: (Duration, Duration),
    /// Minimum time since the last switch for the class-change re-evaluation.
    pub class_change_min_interval: Duration,
    /// Consecutive switch failures that trigger safe mode.
    pub max_consecutive_errors: u32,
}

impl Default for AbrOptions {
    fn default() -> Self {
        Self {
            bandwidth_history_len: 20,
            buffer_history_len: 15,
            min_drain_samples: 5,
            drain_threshold: 0.15,

            critical_buffer_secs: 5.0,
            downgrade_buffer_secs: 8.0,
            upgrade_buffer_secs: 15.0,
            force_upgrade_buffer_secs: 10.0,
            steady_low_buffer_secs: 12.0,
            opportunistic_upgrade_buffer_secs: 12.0,

            clear_buffer_ratio: 0.7,
            critical_safe_margin_secs: 3,

            initial_high_percentile: 0.6,
            initial_medium_percentile: 0.4,
            initial_low_percentile: 0.25,
            urgent_low_percentile: 0.3,
            steady_low_percentile: 0.4,

            urgent_fit_margin: 1.2,
            force_upgrade_margin: 1.1,
            steady_downgrade_margin: 1.3,
            max_upgrade_step: 2,
            low_class_max_height: 720,

            min_switch_interval: Duration::from_secs(5),
            monitor_interval: Duration::from_millis(2000),
            class_change_window: (Duration::from_secs(2), Duration::from_secs(10)),
            class_change_min_interval: Duration::from_secs(2),
            max_consecutive_errors: 3,
        }
    }
}

impl fmt::Debug for AbrOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbrOptions")
            .field("critical_buffer_secs", &self.critical_buffer_secs)
            .field("downgrade_buffer_secs", &self.downgrade_buffer_secs)
            .field("upgrade_buffer_secs", &self.upgrade_buffer_secs)
            .field("drain_threshold", &self.drain_threshold)
            .field("min_switch_interval", &self.min_switch_interval)
            .field("monitor_interval", &self.monitor_interval)
            .field("max_consecutive_errors", &self.max_consecutive_errors)
            .finish_non_exhaustive()
    }
}

impl AbrOptions {
    /// Set the buffer thresholds (critical, downgrade, upgrade) in seconds.
    #[must_use]
    pub fn with_buffer_thresholds(mut self, critical: f64, downgrade: f64, upgrade: f64) -> Self {
        self.critical_buffer_secs = critical;
        self.downgrade_buffer_secs = downgrade;
        self.upgrade_buffer_secs = upgrade;
        self
    }

    #[must_use]
    pub fn with_min_switch_interval(mut self, interval: Duration) -> Self {
        self.min_switch_interval = interval;
        self
    }

    #[must_use]
    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    #[must_use]
    pub fn with_drain_threshold(mut self, threshold: f64) -> Self {
        self.drain_threshold = threshold;
        self
    }

    #[must_use]
    pub fn with_max_consecutive_errors(mut self, limit: u32) -> Self {
        self.max_consecutive_errors = limit;
        self
    }

    /// Check that the options describe a coherent policy.
    ///
    /// # Errors
    ///
    /// Returns [`AbrError::InvalidOptions`] naming the first offending field.
    pub fn validate(&self) -> AbrResult<()> {
        fn invalid(msg: impl Into<String>) -> AbrResult<()> {
            Err(AbrError::InvalidOptions(msg.into()))
        }

        if self.bandwidth_history_len == 0 || self.buffer_history_len == 0 {
            return invalid("history capacities must be non-zero");
        }
        if self.min_drain_samples < 2 {
            return invalid("min_drain_samples must be at least 2");
        }
        if !(self.critical_buffer_secs >= 0.0
            && self.critical_buffer_secs <= self.downgrade_buffer_secs
            && self.downgrade_buffer_secs <= self.upgrade_buffer_secs)
        {
            return invalid("buffer thresholds must satisfy 0 <= critical <= downgrade <= upgrade");
        }
        if !(self.clear_buffer_ratio > 0.0 && self.clear_buffer_ratio <= 1.0) {
            return invalid("clear_buffer_ratio must be in (0, 1]");
        }
        let percentiles = [
            ("initial_high_percentile", self.initial_high_percentile),
            ("initial_medium_percentile", self.initial_medium_percentile),
            ("initial_low_percentile", self.initial_low_percentile),
            ("urgent_low_percentile", self.urgent_low_percentile),
            ("steady_low_percentile", self.steady_low_percentile),
        ];
        if let Some((name, _)) = percentiles.iter().find(|(_, p)| !(0.0..=1.0).contains(p)) {
            return invalid(format!("{name} must be in [0, 1]"));
        }
        let margins = [
            ("urgent_fit_margin", self.urgent_fit_margin),
            ("force_upgrade_margin", self.force_upgrade_margin),
            ("steady_downgrade_margin", self.steady_downgrade_margin),
        ];
        if let Some((name, _)) = margins.iter().find(|(_, m)| !(*m > 0.0)) {
            return invalid(format!("{name} must be positive"));
        }
        if self.max_upgrade_step == 0 {
            return invalid("max_upgrade_step must be at least 1");
        }
        if self.monitor_interval.is_zero() {
            return invalid("monitor_interval must be non-zero");
        }
        if self.class_change_window.0 > self.class_change_window.1 {
            return invalid("class_change_window start must not exceed its end");
        }
        if self.max_consecutive_errors == 0 {
            return invalid("max_consecutive_errors must be at least 1");
        }
        Ok(())
    }
}
