use std::{fmt, time::Duration};

use tracing::{debug, info, trace, warn};
use web_time::Instant;

use crate::{
    AbrDecision, AbrOptions, AbrReason, AbrResult, BandwidthEstimator, BufferMonitor,
    BufferSource, Estimator, FailureAction, FailureTracker, NetworkClassifier, NetworkHintSource,
    NetworkState, PolicyInput, SpeedClass, SwitchFlags, SwitchInstruction, SwitchPolicy,
    SwitchSink, Variant, VariantCatalog, VariantChange, VariantId, VariantObserver,
};

/// Lifecycle position of an engine.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EngineStatus {
    Disabled,
    /// Enabled, no variant selected yet.
    Initial,
    /// Enabled with a current variant.
    Steady,
    /// Terminal; every call is a no-op.
    Released,
}

#[derive(Clone, Debug, Default)]
struct EngineState {
    enabled: bool,
    released: bool,
    current: Option<Variant>,
    last_switch_at: Option<Instant>,
    last_estimate: Option<f64>,
    class_change_handled: bool,
    playback_rate: f64,
}

/// Per-session ABR engine.
///
/// Synchronous and single-owner: the host (or `cadenza-session`) serializes
/// calls. Every time-dependent entry point takes `now` explicitly.
pub struct AbrEngine<E: Estimator> {
    opts: AbrOptions,
    estimator: E,
    buffer: BufferMonitor,
    network: NetworkClassifier,
    catalog: VariantCatalog,
    failures: FailureTracker,
    state: EngineState,
    sink: Option<Box<dyn SwitchSink>>,
    buffer_source: Option<Box<dyn BufferSource>>,
    hints: Option<Box<dyn NetworkHintSource>>,
    observer: Option<VariantObserver>,
}

pub type DefaultAbrEngine = AbrEngine<BandwidthEstimator>;

impl AbrEngine<BandwidthEstimator> {
    /// Create a disabled engine with the harmonic-mean estimator.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AbrError::InvalidOptions`] if `opts` fail validation.
    pub fn new(opts: AbrOptions) -> AbrResult<Self> {
        let estimator = BandwidthEstimator::new(&opts);
        Self::with_estimator(opts, estimator)
    }
}

impl<E: Estimator> AbrEngine<E> {
    /// # Errors
    ///
    /// Returns [`crate::AbrError::InvalidOptions`] if `opts` fail validation.
    pub fn with_estimator(opts: AbrOptions, estimator: E) -> AbrResult<Self> {
        opts.validate()?;
        Ok(Self {
            buffer: BufferMonitor::new(&opts),
            failures: FailureTracker::new(opts.max_consecutive_errors),
            network: NetworkClassifier::new(),
            catalog: VariantCatalog::new(),
            state: EngineState {
                playback_rate: 1.0,
                ..EngineState::default()
            },
            sink: None,
            buffer_source: None,
            hints: None,
            observer: None,
            estimator,
            opts,
        })
    }

    // Host wiring

    /// Register the switch-instruction sink.
    pub fn init(&mut self, sink: impl SwitchSink + 'static) {
        if self.state.released {
            return;
        }
        self.sink = Some(Box::new(sink));
    }

    pub fn attach_buffer_source(&mut self, source: impl BufferSource + 'static) {
        if self.state.released {
            return;
        }
        self.buffer_source = Some(Box::new(source));
    }

    pub fn set_network_hints(&mut self, hints: impl NetworkHintSource + 'static) {
        if self.state.released {
            return;
        }
        self.hints = Some(Box::new(hints));
    }

    pub fn set_variant_observer(&mut self, observer: VariantObserver) {
        if self.state.released {
            return;
        }
        self.observer = Some(observer);
    }

    /// Replace thresholds at runtime. Buffer history restarts; the estimator
    /// window keeps the capacity it was built with.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AbrError::InvalidOptions`]; the previous options stay
    /// in effect.
    pub fn configure(&mut self, opts: AbrOptions) -> AbrResult<()> {
        if self.state.released {
            return Ok(());
        }
        opts.validate()?;
        self.buffer = BufferMonitor::new(&opts);
        self.failures.set_limit(opts.max_consecutive_errors);
        self.opts = opts;
        debug!(opts = ?self.opts, "ABR options reconfigured");
        Ok(())
    }

    // Lifecycle

    pub fn enable(&mut self) {
        if self.state.released || self.state.enabled {
            return;
        }
        self.state.enabled = true;
        info!(variants = self.catalog.len(), "ABR enabled");
    }

    pub fn disable(&mut self) {
        if self.state.released || !self.state.enabled {
            return;
        }
        self.state.enabled = false;
        info!("ABR disabled");
    }

    /// Disable and forget all measurements and the current selection,
    /// keeping the engine reusable.
    pub fn stop(&mut self) {
        if self.state.released {
            return;
        }
        self.estimator.reset();
        self.buffer.clear();
        self.network.reset();
        self.failures = FailureTracker::new(self.opts.max_consecutive_errors);
        self.state = EngineState {
            playback_rate: self.state.playback_rate,
            ..EngineState::default()
        };
        debug!("ABR stopped");
    }

    /// Drop all state. Terminal: later calls are silent no-ops.
    pub fn release(&mut self) {
        if self.state.released {
            return;
        }
        self.estimator.reset();
        self.buffer.clear();
        self.catalog.clear();
        self.network.reset();
        self.sink = None;
        self.buffer_source = None;
        self.hints = None;
        self.observer = None;
        self.state = EngineState {
            released: true,
            ..EngineState::default()
        };
        info!("ABR released");
    }

    // Catalog

    /// Replace the variant catalog. Returns `true` if it materially changed.
    ///
    /// When the current variant disappears, the engine re-anchors to the
    /// closest variant not above its bandwidth and tells the host.
    pub fn set_variants(&mut self, list: impl IntoIterator<Item = Variant>, now: Instant) -> bool {
        if self.state.released {
            return false;
        }
        if !self.catalog.set_variants(list) {
            return false;
        }
        debug!(variants = self.catalog.len(), "ABR catalog updated");

        let Some(current) = self.state.current.clone() else {
            return true;
        };
        if let Some(same) = self.catalog.get(current.id).cloned() {
            self.state.current = Some(same);
            return true;
        }

        let replacement = self
            .catalog
            .variants()
            .iter()
            .rev()
            .find(|v| v.bandwidth_bps <= current.bandwidth_bps)
            .or_else(|| self.catalog.lowest())
            .cloned();
        match replacement {
            Some(target) => {
                let notify = self.state.enabled;
                self.apply(
                    AbrDecision {
                        target,
                        reason: AbrReason::CatalogChanged,
                        clear_buffer: false,
                        safe_margin_secs: 0,
                        changed: true,
                    },
                    now,
                    notify,
                );
            }
            None => {
                warn!(previous = %current.id, "ABR catalog has no video variants left");
                self.state.current = None;
            }
        }
        true
    }

    // Host hooks

    /// Feed one completed download and, when allowed, re-evaluate.
    pub fn segment_downloaded(
        &mut self,
        elapsed: Duration,
        bytes: u64,
        allow_switch: bool,
        now: Instant,
    ) -> Option<SwitchInstruction> {
        if self.state.released {
            trace!("segment_downloaded ignored: engine released");
            return None;
        }
        self.estimator.record_sample(bytes, elapsed);
        self.refresh_network(now);

        if !self.state.enabled || !allow_switch {
            return None;
        }
        if self.failures.is_saturated() || !self.min_interval_elapsed(now) {
            return None;
        }

        let buffer = self.sample_buffer(now);
        let opportunistic = self.network.state().speed_class == SpeedClass::High
            && buffer.is_some_and(|b| b > self.opts.opportunistic_upgrade_buffer_secs)
            && !self.buffer.is_draining();
        let flags = if opportunistic {
            SwitchFlags::force_upgrade()
        } else {
            SwitchFlags::NONE
        };
        self.evaluate(flags, buffer, now, true)
    }

    /// Report that the host failed to activate a variant.
    ///
    /// The variant is blacklisted for the next evaluation; at the failure
    /// limit the lowest variant is forced immediately.
    pub fn notify_switch_error(
        &mut self,
        variant: Option<VariantId>,
        now: Instant,
    ) -> Option<SwitchInstruction> {
        if self.state.released {
            return None;
        }
        let failed = variant.or_else(|| self.state.current.as_ref().map(|v| v.id));
        match self.failures.record_failure(failed) {
            FailureAction::Retry => {
                debug!(
                    failed = ?failed,
                    consecutive = self.failures.consecutive_errors(),
                    "ABR switch failed, variant blacklisted"
                );
                None
            }
            FailureAction::SafeMode => {
                let lowest = self.catalog.lowest()?.clone();
                warn!(
                    failed = ?failed,
                    consecutive = self.failures.consecutive_errors(),
                    fallback = %lowest.id,
                    "ABR entering safe mode"
                );
                if self.state.current.as_ref().is_some_and(|c| c.id == lowest.id) {
                    return None;
                }
                let notify = self.state.enabled;
                Some(self.apply(
                    AbrDecision {
                        target: lowest,
                        reason: AbrReason::SafeMode,
                        clear_buffer: false,
                        safe_margin_secs: self.opts.critical_safe_margin_secs,
                        changed: true,
                    },
                    now,
                    notify,
                ))
            }
        }
    }

    pub fn notify_switch_success(&mut self) {
        if self.state.released {
            return;
        }
        if self.failures.consecutive_errors() > 0 {
            debug!("ABR switch confirmed, failure count reset");
        }
        self.failures.record_success();
    }

    /// Immediate best pick, usable before the periodic monitor starts.
    ///
    /// Updates the current variant but does not call the switch sink: the
    /// caller applies the returned variant itself.
    pub fn choose_variant(&mut self, now: Instant) -> Option<Variant> {
        if self.state.released {
            return None;
        }
        self.refresh_network(now);
        let buffer = self.sample_buffer(now);
        self.evaluate(SwitchFlags::NONE, buffer, now, false);
        self.state.current.clone()
    }

    /// Informational; stored for hosts and future policies.
    pub fn playback_rate_changed(&mut self, rate: f64) {
        if self.state.released {
            return;
        }
        self.state.playback_rate = rate;
    }

    // Periodic monitor

    /// One monitor tick: refresh network and buffer state, then evaluate
    /// according to buffer urgency, switch spacing and recent class changes.
    pub fn tick(&mut self, now: Instant) -> Option<SwitchInstruction> {
        if self.state.released || !self.state.enabled {
            return None;
        }
        self.refresh_network(now);
        let buffer = self.sample_buffer(now);

        if self.failures.is_saturated() {
            trace!(
                consecutive = self.failures.consecutive_errors(),
                "ABR tick skipped: waiting for a successful switch"
            );
            return None;
        }

        let opts = &self.opts;
        if buffer.is_some_and(|b| b < opts.critical_buffer_secs) {
            return self.evaluate(SwitchFlags::critical(), buffer, now, true);
        }
        if buffer.is_some_and(|b| b < opts.downgrade_buffer_secs) {
            return self.evaluate(SwitchFlags::urgent(), buffer, now, true);
        }
        if self.min_interval_elapsed(now) {
            return self.evaluate(SwitchFlags::NONE, buffer, now, true);
        }
        if self.class_change_due(now) {
            debug!(
                class = %self.network.state().speed_class,
                "ABR re-evaluating after class change"
            );
            return self.evaluate(SwitchFlags::NONE, buffer, now, true);
        }
        None
    }

    // Queries

    pub fn current_variant(&self) -> Option<&Variant> {
        self.state.current.as_ref()
    }

    pub fn status(&self) -> EngineStatus {
        if self.state.released {
            EngineStatus::Released
        } else if !self.state.enabled {
            EngineStatus::Disabled
        } else if self.state.current.is_none() {
            EngineStatus::Initial
        } else {
            EngineStatus::Steady
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn is_released(&self) -> bool {
        self.state.released
    }

    pub fn bandwidth_estimate(&self) -> Option<f64> {
        self.estimator.estimate_bps()
    }

    pub fn network_state(&self) -> NetworkState {
        self.network.state()
    }

    pub fn buffer_level(&self) -> Option<f64> {
        self.buffer.latest()
    }

    pub fn is_draining(&self) -> bool {
        self.buffer.is_draining()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.failures.consecutive_errors()
    }

    pub fn last_failed_variant(&self) -> Option<VariantId> {
        self.failures.last_failed()
    }

    pub fn playback_rate(&self) -> f64 {
        self.state.playback_rate
    }

    pub fn variants(&self) -> &[Variant] {
        self.catalog.variants()
    }

    pub fn options(&self) -> &AbrOptions {
        &self.opts
    }

    // Internals

    fn refresh_network(&mut self, now: Instant) {
        let estimate = self.estimator.estimate_bps();
        let hint = self.hints.as_ref().and_then(|h| h.network_hint());
        self.state.last_estimate = estimate;
        if self.network.update(estimate, hint, now) {
            self.state.class_change_handled = false;
        }
    }

    fn sample_buffer(&mut self, now: Instant) -> Option<f64> {
        let level = self.buffer_source.as_ref()?.buffered_ahead();
        self.buffer.sample(level, now);
        Some(level)
    }

    fn min_interval_elapsed(&self, now: Instant) -> bool {
        self.state
            .last_switch_at
            .is_none_or(|t| now.saturating_duration_since(t) >= self.opts.min_switch_interval)
    }

    fn class_change_due(&self, now: Instant) -> bool {
        if self.state.class_change_handled {
            return false;
        }
        let Some(changed_at) = self.network.class_changed_at() else {
            return false;
        };
        let (start, end) = self.opts.class_change_window;
        let since_change = now.saturating_duration_since(changed_at);
        let spaced = self.state.last_switch_at.is_none_or(|t| {
            now.saturating_duration_since(t) >= self.opts.class_change_min_interval
        });
        since_change >= start && since_change <= end && spaced
    }

    fn evaluate(
        &mut self,
        flags: SwitchFlags,
        buffer: Option<f64>,
        now: Instant,
        notify_sink: bool,
    ) -> Option<SwitchInstruction> {
        // any evaluation after a class change already reflects the new class
        if self.network.class_changed_at().is_some_and(|at| at <= now) {
            self.state.class_change_handled = true;
        }
        let decision = {
            let input = PolicyInput {
                variants: self.catalog.variants(),
                current: self.state.current.as_ref(),
                excluded: self.failures.last_failed(),
                network: self.network.state(),
                estimate_bps: self.state.last_estimate,
                buffer_secs: buffer,
                is_draining: self.buffer.is_draining(),
                flags,
            };
            SwitchPolicy::new(&self.opts).decide(&input)?
        };
        if !decision.changed {
            return None;
        }
        Some(self.apply(decision, now, notify_sink))
    }

    fn apply(
        &mut self,
        decision: AbrDecision,
        now: Instant,
        notify_sink: bool,
    ) -> SwitchInstruction {
        let from = self.state.current.as_ref().map(|v| v.id);
        let instruction = SwitchInstruction {
            variant: decision.target,
            clear_buffer: decision.clear_buffer,
            safe_margin_secs: decision.safe_margin_secs,
            reason: decision.reason,
        };

        info!(
            from = ?from,
            to = %instruction.variant.id,
            bandwidth_bps = instruction.variant.bandwidth_bps,
            height = instruction.variant.height,
            reason = ?instruction.reason,
            clear_buffer = instruction.clear_buffer,
            "ABR variant switch"
        );

        self.state.current = Some(instruction.variant.clone());
        self.state.last_switch_at = Some(now);

        if notify_sink {
            if let Some(sink) = self.sink.as_mut() {
                sink.switch_variant(&instruction);
            }
        }
        if let Some(observer) = &self.observer {
            observer(&VariantChange {
                from,
                to: instruction.variant.clone(),
                reason: instruction.reason,
            });
        }
        instruction
    }
}

impl<E: Estimator> fmt::Debug for AbrEngine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AbrEngine")
            .field("status", &self.status())
            .field("current", &self.state.current.as_ref().map(|v| v.id))
            .field("variants", &self.catalog.len())
            .field("network", &self.network.state())
            .field("consecutive_errors", &self.failures.consecutive_errors())
            .field("sink", &self.sink.as_ref().map(|_| "SwitchSink"))
            .finish_non_exhaustive()
    }
}
