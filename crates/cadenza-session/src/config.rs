use cadenza_abr::AbrOptions;
use tokio_util::sync::CancellationToken;

use crate::EventBus;

/// Configuration for an [`crate::AbrSession`].
#[derive(Clone, Debug)]
pub struct SessionConfig {
    /// Engine thresholds, percentiles and intervals.
    pub abr: AbrOptions,
    /// Parent token; the monitor runs on a child of it.
    pub cancel: Option<CancellationToken>,
    /// Capacity of the events broadcast channel (used when `bus` is not provided).
    pub events_channel_capacity: usize,
    /// Existing bus to publish on, shared with the host's other components.
    pub bus: Option<EventBus>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            abr: AbrOptions::default(),
            cancel: None,
            events_channel_capacity: 32,
            bus: None,
        }
    }
}

impl SessionConfig {
    #[must_use]
    pub fn with_abr(mut self, abr: AbrOptions) -> Self {
        self.abr = abr;
        self
    }

    #[must_use]
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = Some(cancel);
        self
    }

    #[must_use]
    pub fn with_events_channel_capacity(mut self, capacity: usize) -> Self {
        self.events_channel_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_bus(mut self, bus: EventBus) -> Self {
        self.bus = Some(bus);
        self
    }
}
