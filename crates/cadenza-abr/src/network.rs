use std::fmt;

use web_time::Instant;

/// Platform-reported connection type (Network Information API style).
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum NetworkType {
    #[default]
    Unknown,
    Slow2g,
    Cellular2g,
    Cellular3g,
    Cellular4g,
}

impl NetworkType {
    /// Parse an `effectiveType` string. Unrecognized values map to `Unknown`.
    pub fn from_effective_type(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "slow-2g" | "slow2g" | "slow" => Self::Slow2g,
            "2g" => Self::Cellular2g,
            "3g" => Self::Cellular3g,
            "4g" => Self::Cellular4g,
            _ => Self::Unknown,
        }
    }

    /// Height cap imposed by this connection type, if any.
    pub fn max_height(self) -> Option<u32> {
        match self {
            Self::Slow2g | Self::Cellular2g => Some(480),
            Self::Cellular3g => Some(720),
            Self::Unknown | Self::Cellular4g => None,
        }
    }

    fn is_2g(self) -> bool {
        matches!(self, Self::Slow2g | Self::Cellular2g)
    }
}

/// Optional platform hint: connection type plus the user's data-saver flag.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct NetworkHint {
    pub effective_type: NetworkType,
    pub save_data: bool,
}

impl NetworkHint {
    pub fn new(effective_type: &str, save_data: bool) -> Self {
        Self {
            effective_type: NetworkType::from_effective_type(effective_type),
            save_data,
        }
    }

    fn is_slow(self) -> bool {
        self.save_data || self.effective_type.is_2g()
    }
}

/// Coarse throughput class derived from the bandwidth estimate.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum SpeedClass {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

impl fmt::Display for SpeedClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Unknown => "unknown",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NetworkState {
    pub network_type: NetworkType,
    pub speed_class: SpeedClass,
    /// Fraction of the estimate considered usable, in (0, 1].
    pub safety_factor: f64,
}

impl Default for NetworkState {
    fn default() -> Self {
        Self {
            network_type: NetworkType::Unknown,
            speed_class: SpeedClass::Unknown,
            safety_factor: NetworkClassifier::UNMEASURED_FACTOR,
        }
    }
}

/// Maps the bandwidth estimate and an optional platform hint to a
/// [`NetworkState`], remembering when the speed class last changed.
#[derive(Clone, Debug, Default)]
pub struct NetworkClassifier {
    state: NetworkState,
    class_changed_at: Option<Instant>,
}

impl NetworkClassifier {
    pub const LOW_MAX_BPS: f64 = 1_000_000.0;
    pub const MEDIUM_MAX_BPS: f64 = 3_000_000.0;
    pub const HIGH_MIN_BPS: f64 = 10_000_000.0;

    const HIGH_FACTOR: f64 = 0.85;
    const MEDIUM_FACTOR: f64 = 0.75;
    const LOW_FACTOR: f64 = 0.6;
    const UNMEASURED_FACTOR: f64 = 0.5;
    const SLOW_HINT_CAP: f64 = 0.4;
    const HINT_3G_CAP: f64 = 0.6;

    pub fn new() -> Self {
        Self::default()
    }

    /// Pure classification of one estimate.
    ///
    /// Estimates between [`Self::MEDIUM_MAX_BPS`] and [`Self::HIGH_MIN_BPS`]
    /// still classify as medium.
    pub fn classify(estimate_bps: Option<f64>, hint: Option<NetworkHint>) -> NetworkState {
        let network_type = hint.map(|h| h.effective_type).unwrap_or_default();

        let (speed_class, mut safety_factor) = match estimate_bps.filter(|bps| *bps > 0.0) {
            None if hint.is_some_and(NetworkHint::is_slow) => {
                (SpeedClass::Low, Self::UNMEASURED_FACTOR)
            }
            None => (SpeedClass::Unknown, Self::UNMEASURED_FACTOR),
            Some(bps) if bps < Self::LOW_MAX_BPS => (SpeedClass::Low, Self::LOW_FACTOR),
            Some(bps) if bps < Self::HIGH_MIN_BPS => (SpeedClass::Medium, Self::MEDIUM_FACTOR),
            Some(_) => (SpeedClass::High, Self::HIGH_FACTOR),
        };

        if let Some(hint) = hint {
            if hint.is_slow() {
                safety_factor = safety_factor.min(Self::SLOW_HINT_CAP);
            } else if hint.effective_type == NetworkType::Cellular3g {
                safety_factor = safety_factor.min(Self::HINT_3G_CAP);
            }
        }

        NetworkState {
            network_type,
            speed_class,
            safety_factor,
        }
    }

    /// Reclassify and remember the time of a speed-class change.
    ///
    /// Returns `true` when the class changed.
    pub fn update(
        &mut self,
        estimate_bps: Option<f64>,
        hint: Option<NetworkHint>,
        now: Instant,
    ) -> bool {
        let next = Self::classify(estimate_bps, hint);
        let changed = next.speed_class != self.state.speed_class;
        if changed {
            tracing::debug!(
                from = %self.state.speed_class,
                to = %next.speed_class,
                safety_factor = next.safety_factor,
                "network class changed"
            );
            self.class_changed_at = Some(now);
        }
        self.state = next;
        changed
    }

    pub fn state(&self) -> NetworkState {
        self.state
    }

    pub fn class_changed_at(&self) -> Option<Instant> {
        self.class_changed_at
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
