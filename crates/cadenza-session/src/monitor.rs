//! Cancellable ticker that drives `AbrEngine::tick`.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};

use cadenza_abr::DefaultAbrEngine;
use parking_lot::Mutex;
use tokio::{
    runtime::Handle,
    time::{Instant, MissedTickBehavior},
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use crate::{AbrEvent, EventBus, SessionError, SessionResult};

pub(crate) type SharedEngine = Arc<Mutex<DefaultAbrEngine>>;

/// Running monitor task. Dropping the handle stops it.
///
/// `MonitorStopped` is published exactly once: by `stop`/drop before they
/// return, or by the task itself when the parent token ends it.
#[derive(Debug)]
pub(crate) struct MonitorHandle {
    cancel: CancellationToken,
    interval: Duration,
    stopped: Arc<AtomicBool>,
    bus: EventBus,
}

impl MonitorHandle {
    /// Spawn the ticker on the current tokio runtime.
    ///
    /// The first tick fires one `interval` after the start.
    pub(crate) fn spawn(
        engine: SharedEngine,
        interval: Duration,
        parent: &CancellationToken,
        bus: EventBus,
    ) -> SessionResult<Self> {
        let handle = Handle::try_current().map_err(|_| SessionError::NoRuntime)?;
        let cancel = parent.child_token();
        let stopped = Arc::new(AtomicBool::new(false));
        bus.publish(AbrEvent::MonitorStarted { interval });
        handle.spawn(run(
            engine,
            interval,
            cancel.clone(),
            Arc::clone(&stopped),
            bus.clone(),
        ));
        debug!(?interval, "ABR monitor started");
        Ok(Self {
            cancel,
            interval,
            stopped,
            bus,
        })
    }

    pub(crate) fn interval(&self) -> Duration {
        self.interval
    }

    /// `false` once stopped or once the parent token was cancelled.
    pub(crate) fn is_running(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    pub(crate) fn stop(&self) {
        self.cancel.cancel();
        announce_stop(&self.stopped, &self.bus);
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

fn announce_stop(stopped: &AtomicBool, bus: &EventBus) {
    if !stopped.swap(true, Ordering::AcqRel) {
        debug!("ABR monitor stopped");
        bus.publish(AbrEvent::MonitorStopped);
    }
}

async fn run(
    engine: SharedEngine,
    period: Duration,
    cancel: CancellationToken,
    stopped: Arc<AtomicBool>,
    bus: EventBus,
) {
    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            at = ticker.tick() => {
                let switched = engine.lock().tick(at.into_std());
                if let Some(instruction) = switched {
                    trace!(variant = %instruction.variant.id, "ABR monitor tick switched");
                }
            }
        }
    }

    announce_stop(&stopped, &bus);
}
