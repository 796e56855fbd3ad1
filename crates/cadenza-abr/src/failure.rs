use crate::VariantId;

/// What the engine should do after a reported switch failure.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FailureAction {
    /// Blacklist the variant and let the next evaluation pick another.
    Retry,
    /// Too many failures in a row: fall back to the lowest variant.
    SafeMode,
}

/// Counts consecutive switch failures and remembers the last failing variant.
#[derive(Clone, Debug)]
pub struct FailureTracker {
    consecutive: u32,
    last_failed: Option<VariantId>,
    limit: u32,
}

impl FailureTracker {
    pub fn new(limit: u32) -> Self {
        Self {
            consecutive: 0,
            last_failed: None,
            limit: limit.max(1),
        }
    }

    pub fn record_failure(&mut self, variant: Option<VariantId>) -> FailureAction {
        self.consecutive = self.consecutive.saturating_add(1);
        if variant.is_some() {
            self.last_failed = variant;
        }
        if self.is_saturated() {
            FailureAction::SafeMode
        } else {
            FailureAction::Retry
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
        self.last_failed = None;
    }

    /// Failure limit reached; periodic evaluation backs off until a success.
    pub fn is_saturated(&self) -> bool {
        self.consecutive >= self.limit
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive
    }

    pub fn last_failed(&self) -> Option<VariantId> {
        self.last_failed
    }

    pub(crate) fn set_limit(&mut self, limit: u32) {
        self.limit = limit.max(1);
    }
}
