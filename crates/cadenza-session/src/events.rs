use std::time::Duration;

use cadenza_abr::{AbrReason, Variant, VariantChange, VariantId};
use tokio::sync::broadcast;

/// Session-level notifications.
#[derive(Clone, Debug, PartialEq)]
pub enum AbrEvent {
    VariantChanged {
        from: Option<VariantId>,
        to: Variant,
        reason: AbrReason,
    },
    MonitorStarted {
        interval: Duration,
    },
    MonitorStopped,
    Released,
}

impl From<&VariantChange> for AbrEvent {
    fn from(change: &VariantChange) -> Self {
        Self::VariantChanged {
            from: change.from,
            to: change.to.clone(),
            reason: change.reason,
        }
    }
}

/// Broadcast bus for [`AbrEvent`]s.
///
/// `publish()` is a sync call and works from the monitor task, host threads
/// and engine callbacks alike. If there are no subscribers, events are
/// silently dropped.
#[derive(Clone, Debug)]
pub struct EventBus {
    tx: broadcast::Sender<AbrEvent>,
}

impl EventBus {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, event: impl Into<AbrEvent>) {
        let _ = self.tx.send(event.into());
    }

    /// Slow subscribers receive `RecvError::Lagged(n)` instead of blocking
    /// the engine.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AbrEvent> {
        self.tx.subscribe()
    }
}
