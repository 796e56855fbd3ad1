//! Switch policy: the pure decision function behind every ABR evaluation.
//!
//! Given the catalog, the current variant, network and buffer readings, the
//! policy picks at most one target. Rules are checked in order and the first
//! one that matches wins:
//!
//! 1. critical buffer: drop to the lowest candidate
//! 2. urgent buffer: step down (percentile drop on a low-class network)
//! 3. first selection: percentile pick by speed class
//! 4. forced upgrade: toward the best candidate within a widened margin
//! 5. normal upgrade: one rank toward the best candidate within budget
//! 6. steady state: preemptive step down when over budget

use crate::{AbrOptions, NetworkState, SpeedClass, Variant, VariantId};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AbrReason {
    /// First selection of the session.
    Initial,
    /// Buffer below the critical threshold (or caller-flagged critical).
    Critical,
    /// Buffer below the downgrade threshold (or caller-flagged urgent).
    Urgent,
    /// High-class network with a comfortable buffer, or caller-forced upgrade.
    ForcedUpgrade,
    /// Healthy, non-draining buffer with spare bandwidth.
    UpSwitch,
    /// Current variant exceeds the usable bandwidth by the steady margin.
    DownSwitch,
    /// Low-class network drifting toward its steady percentile.
    LowNetwork,
    /// Current variant left the candidate set (blacklisted or capped).
    Restricted,
    /// Repeated switch failures forced the lowest variant.
    SafeMode,
    /// Catalog update removed the current variant.
    CatalogChanged,
    AlreadyOptimal,
}

/// One policy outcome. `changed` is false when `target` is already current.
#[derive(Clone, Debug, PartialEq)]
pub struct AbrDecision {
    pub target: Variant,
    pub reason: AbrReason,
    pub clear_buffer: bool,
    pub safe_margin_secs: u32,
    pub changed: bool,
}

/// Explicit caller overrides.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct SwitchFlags {
    pub is_urgent: bool,
    pub is_critical: bool,
    pub force_upgrade: bool,
}

impl SwitchFlags {
    pub const NONE: Self = Self {
        is_urgent: false,
        is_critical: false,
        force_upgrade: false,
    };

    pub fn critical() -> Self {
        Self {
            is_critical: true,
            ..Self::NONE
        }
    }

    pub fn urgent() -> Self {
        Self {
            is_urgent: true,
            ..Self::NONE
        }
    }

    pub fn force_upgrade() -> Self {
        Self {
            force_upgrade: true,
            ..Self::NONE
        }
    }
}

/// Everything the policy looks at for one decision.
#[derive(Clone, Debug)]
pub struct PolicyInput<'a> {
    /// Catalog entries in ascending bandwidth order.
    pub variants: &'a [Variant],
    pub current: Option<&'a Variant>,
    /// Last variant that failed to activate.
    pub excluded: Option<VariantId>,
    pub network: NetworkState,
    pub estimate_bps: Option<f64>,
    /// Seconds buffered ahead of the playhead; `None` without a buffer source.
    pub buffer_secs: Option<f64>,
    pub is_draining: bool,
    pub flags: SwitchFlags,
}

#[derive(Clone, Copy, Debug)]
pub struct SwitchPolicy<'a> {
    opts: &'a AbrOptions,
}

impl<'a> SwitchPolicy<'a> {
    pub fn new(opts: &'a AbrOptions) -> Self {
        Self { opts }
    }

    /// Decide the next variant. Returns `None` only when there is no
    /// candidate at all.
    pub fn decide(&self, input: &PolicyInput<'_>) -> Option<AbrDecision> {
        let opts = self.opts;
        let critical =
            input.flags.is_critical || below(input.buffer_secs, opts.critical_buffer_secs);
        let urgent = input.flags.is_urgent || below(input.buffer_secs, opts.downgrade_buffer_secs);

        let candidates = self.candidates(input, critical || urgent);
        if candidates.is_empty() {
            return None;
        }

        let usable_bps = input.estimate_bps.unwrap_or(0.0).max(0.0) * input.network.safety_factor;
        let current_rank = input.current.map(|c| rank_of(&candidates, c));

        let (rank, reason) = if critical {
            (0, AbrReason::Critical)
        } else if urgent {
            (
                self.urgent_rank(input, &candidates, current_rank, usable_bps),
                AbrReason::Urgent,
            )
        } else if let (Some(current), Some(rank)) = (input.current, current_rank) {
            self.evaluate_from(input, &candidates, current, rank, usable_bps)
        } else {
            (
                self.initial_rank(input, &candidates, usable_bps),
                AbrReason::Initial,
            )
        };

        let target = candidates[rank.min(candidates.len() - 1)].clone();
        let changed = input.current.is_none_or(|c| c.id != target.id);

        let (clear_buffer, safe_margin_secs) = if reason == AbrReason::Critical {
            let clear = input
                .current
                .is_some_and(|prev| bps(&target) < bps(prev) * opts.clear_buffer_ratio);
            (clear, opts.critical_safe_margin_secs)
        } else {
            (false, 0)
        };

        tracing::debug!(
            target = %target.id,
            target_bps = target.bandwidth_bps,
            ?reason,
            changed,
            clear_buffer,
            usable_bps,
            buffer_secs = ?input.buffer_secs,
            class = %input.network.speed_class,
            candidates = candidates.len(),
            "ABR policy: decided"
        );

        Some(AbrDecision {
            target,
            reason,
            clear_buffer,
            safe_margin_secs,
            changed,
        })
    }

    /// Blacklist and height caps, each skipped when it would empty the set.
    fn candidates<'v>(&self, input: &PolicyInput<'v>, pressing: bool) -> Vec<&'v Variant> {
        let mut set: Vec<&Variant> = input.variants.iter().collect();

        if let Some(failed) = input.excluded {
            set = restrict(set, |v| v.id != failed);
        }
        if let Some(max_height) = input.network.network_type.max_height() {
            set = restrict(set, |v| v.height <= max_height);
        }
        if input.network.speed_class == SpeedClass::Low && !pressing {
            let max_height = self.opts.low_class_max_height;
            set = restrict(set, |v| v.height <= max_height);
        }
        set
    }

    fn urgent_rank(
        &self,
        input: &PolicyInput<'_>,
        candidates: &[&Variant],
        current_rank: Option<usize>,
        usable_bps: f64,
    ) -> usize {
        if input.network.speed_class == SpeedClass::Low {
            let target = percentile_rank(candidates.len(), self.opts.urgent_low_percentile);
            return current_rank.map_or(target, |cur| target.min(cur));
        }

        let limit = usable_bps * self.opts.urgent_fit_margin;
        match current_rank {
            Some(cur) => {
                let mut rank = cur.saturating_sub(1);
                while rank > 0 && bps(candidates[rank]) > limit {
                    rank -= 1;
                }
                rank
            }
            None => highest_within(candidates, limit).unwrap_or(0),
        }
    }

    fn initial_rank(
        &self,
        input: &PolicyInput<'_>,
        candidates: &[&Variant],
        usable_bps: f64,
    ) -> usize {
        let opts = self.opts;
        let percentile = match input.network.speed_class {
            SpeedClass::High => opts.initial_high_percentile,
            SpeedClass::Medium => opts.initial_medium_percentile,
            SpeedClass::Low | SpeedClass::Unknown => opts.initial_low_percentile,
        };
        let pick = percentile_rank(candidates.len(), percentile);

        if usable_bps > 0.0 && bps(candidates[pick]) > usable_bps {
            highest_within(candidates, usable_bps).unwrap_or(0)
        } else {
            pick
        }
    }

    /// Upgrade and steady-state rules for a session that already has a variant.
    fn evaluate_from(
        &self,
        input: &PolicyInput<'_>,
        candidates: &[&Variant],
        current: &Variant,
        cur: usize,
        usable_bps: f64,
    ) -> (usize, AbrReason) {
        let opts = self.opts;
        let class = input.network.speed_class;
        let buffer = input.buffer_secs;

        let force_path = input.flags.force_upgrade
            || (class == SpeedClass::High
                && above(buffer, opts.force_upgrade_buffer_secs)
                && !input.is_draining);
        if force_path {
            let target =
                highest_within(candidates, usable_bps * opts.force_upgrade_margin).unwrap_or(0);
            if target > cur {
                let jump = input.flags.force_upgrade || above(buffer, opts.upgrade_buffer_secs);
                let rank = if jump {
                    target
                } else {
                    target.min(cur + opts.max_upgrade_step)
                };
                return (rank, AbrReason::ForcedUpgrade);
            }
        }

        if above(buffer, opts.upgrade_buffer_secs) && !input.is_draining {
            if let Some(optimal) = highest_within(candidates, usable_bps) {
                if optimal > cur {
                    return (cur + 1, AbrReason::UpSwitch);
                }
            }
        }

        if usable_bps > 0.0
            && cur > 0
            && bps(candidates[cur]) > usable_bps * opts.steady_downgrade_margin
        {
            return (cur - 1, AbrReason::DownSwitch);
        }

        if class == SpeedClass::Low && below(buffer, opts.steady_low_buffer_secs) {
            let target = percentile_rank(candidates.len(), opts.steady_low_percentile);
            if target < cur {
                return (cur - 1, AbrReason::LowNetwork);
            }
        }

        let reason = if candidates[cur].id == current.id {
            AbrReason::AlreadyOptimal
        } else {
            AbrReason::Restricted
        };
        (cur, reason)
    }
}

fn below(buffer: Option<f64>, threshold: f64) -> bool {
    buffer.is_some_and(|b| b < threshold)
}

fn above(buffer: Option<f64>, threshold: f64) -> bool {
    buffer.is_some_and(|b| b > threshold)
}

#[expect(clippy::cast_precision_loss)] // bitrate precision loss is negligible for ABR
fn bps(v: &Variant) -> f64 {
    v.bandwidth_bps as f64
}

fn restrict<'v>(set: Vec<&'v Variant>, keep: impl Fn(&Variant) -> bool) -> Vec<&'v Variant> {
    let kept: Vec<&Variant> = set.iter().copied().filter(|v| keep(v)).collect();
    if kept.is_empty() { set } else { kept }
}

/// Rank of `current` among `candidates`; if it was filtered out, the highest
/// candidate not above its bandwidth.
fn rank_of(candidates: &[&Variant], current: &Variant) -> usize {
    candidates
        .iter()
        .position(|v| v.id == current.id)
        .or_else(|| {
            candidates
                .iter()
                .rposition(|v| v.bandwidth_bps <= current.bandwidth_bps)
        })
        .unwrap_or(0)
}

fn highest_within(candidates: &[&Variant], limit_bps: f64) -> Option<usize> {
    candidates.iter().rposition(|v| bps(v) <= limit_bps)
}

/// `floor(len * p)`, clamped to the last index.
#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    reason = "percentile of a short candidate list"
)]
fn percentile_rank(len: usize, percentile: f64) -> usize {
    let rank = (len as f64 * percentile.clamp(0.0, 1.0)).floor() as usize;
    rank.min(len.saturating_sub(1))
}
