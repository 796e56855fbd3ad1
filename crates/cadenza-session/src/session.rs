use std::{sync::Arc, time::Duration};

use cadenza_abr::{
    AbrEngine, AbrOptions, BufferSource, EngineStatus, NetworkHintSource, NetworkState,
    SwitchInstruction, SwitchSink, Variant, VariantChange, VariantId, VariantObserver,
};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use web_time::Instant;

use crate::{
    AbrEvent, EventBus, SessionConfig, SessionError, SessionResult,
    monitor::{MonitorHandle, SharedEngine},
};

/// Runtime clock; follows tokio's paused clock under test.
fn now() -> Instant {
    tokio::time::Instant::now().into_std()
}

/// One playback session: the engine, its monitor task and the event bus.
///
/// All methods take `&self`; the engine lock is held only for the duration
/// of one engine call. Sinks, sources and observers run under that lock and
/// must not call back into the session.
#[derive(Debug)]
pub struct AbrSession {
    engine: SharedEngine,
    bus: EventBus,
    cancel: CancellationToken,
    monitor: Mutex<Option<MonitorHandle>>,
}

impl AbrSession {
    /// # Errors
    ///
    /// Returns [`SessionError::Abr`] if the ABR options are invalid.
    pub fn new(config: SessionConfig) -> SessionResult<Self> {
        let SessionConfig {
            abr,
            cancel,
            events_channel_capacity,
            bus,
        } = config;

        let mut engine = AbrEngine::new(abr)?;
        let bus = bus.unwrap_or_else(|| EventBus::new(events_channel_capacity));
        let observer_bus = bus.clone();
        engine.set_variant_observer(Arc::new(move |change: &VariantChange| {
            observer_bus.publish(change);
        }));

        Ok(Self {
            engine: Arc::new(Mutex::new(engine)),
            bus,
            cancel: cancel.unwrap_or_default(),
            monitor: Mutex::new(None),
        })
    }

    // Host wiring

    pub fn init(&self, sink: impl SwitchSink + 'static) {
        self.engine.lock().init(sink);
    }

    pub fn attach_buffer_source(&self, source: impl BufferSource + 'static) {
        self.engine.lock().attach_buffer_source(source);
    }

    pub fn set_network_hints(&self, hints: impl NetworkHintSource + 'static) {
        self.engine.lock().set_network_hints(hints);
    }

    /// Observer called after every variant change, alongside the bus event.
    pub fn set_variant_observer(&self, observer: VariantObserver) {
        let bus = self.bus.clone();
        self.engine
            .lock()
            .set_variant_observer(Arc::new(move |change: &VariantChange| {
                bus.publish(change);
                observer(change);
            }));
    }

    /// # Errors
    ///
    /// [`SessionError::Abr`] for invalid options, [`SessionError::NoRuntime`]
    /// if a running monitor must be restarted outside a runtime.
    pub fn configure(&self, opts: AbrOptions) -> SessionResult<()> {
        let interval = opts.monitor_interval;
        let mut engine = self.engine.lock();
        if engine.is_released() {
            return Err(SessionError::Released);
        }
        engine.configure(opts)?;

        let mut monitor = self.monitor.lock();
        if monitor
            .as_ref()
            .is_some_and(|m| m.is_running() && m.interval() != interval)
        {
            // old task announces its stop before the new one starts
            if let Some(old) = monitor.take() {
                old.stop();
            }
            *monitor = Some(self.spawn_monitor(interval)?);
        }
        Ok(())
    }

    // Lifecycle

    /// Enable the engine and start the periodic monitor.
    ///
    /// # Errors
    ///
    /// [`SessionError::Released`] after `release()`; [`SessionError::Cancelled`]
    /// once the parent cancellation token fired; [`SessionError::NoRuntime`]
    /// outside a tokio runtime. On error the engine stays disabled.
    pub fn enable(&self) -> SessionResult<()> {
        let mut engine = self.engine.lock();
        if engine.is_released() {
            return Err(SessionError::Released);
        }
        if self.cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let mut monitor = self.monitor.lock();
        if monitor.as_ref().is_none_or(|m| !m.is_running()) {
            *monitor = Some(self.spawn_monitor(engine.options().monitor_interval)?);
        }
        engine.enable();
        Ok(())
    }

    pub fn disable(&self) {
        self.engine.lock().disable();
        self.stop_monitor();
    }

    /// Disable and forget measurements; the session can be enabled again.
    pub fn stop(&self) {
        self.engine.lock().stop();
        self.stop_monitor();
    }

    /// Drop all engine state. Later calls are no-ops.
    pub fn release(&self) {
        {
            let mut engine = self.engine.lock();
            if engine.is_released() {
                return;
            }
            engine.release();
        }
        self.stop_monitor();
        self.bus.publish(AbrEvent::Released);
    }

    // Host hooks

    pub fn set_variants(&self, list: impl IntoIterator<Item = Variant>) -> bool {
        self.engine.lock().set_variants(list, now())
    }

    pub fn segment_downloaded(
        &self,
        elapsed: Duration,
        bytes: u64,
        allow_switch: bool,
    ) -> Option<SwitchInstruction> {
        self.engine
            .lock()
            .segment_downloaded(elapsed, bytes, allow_switch, now())
    }

    pub fn notify_switch_error(&self, variant: Option<VariantId>) -> Option<SwitchInstruction> {
        self.engine.lock().notify_switch_error(variant, now())
    }

    pub fn notify_switch_success(&self) {
        self.engine.lock().notify_switch_success();
    }

    pub fn choose_variant(&self) -> Option<Variant> {
        self.engine.lock().choose_variant(now())
    }

    pub fn playback_rate_changed(&self, rate: f64) {
        self.engine.lock().playback_rate_changed(rate);
    }

    /// Run one monitor step now, for hosts that drive their own timer.
    pub fn tick(&self) -> Option<SwitchInstruction> {
        self.engine.lock().tick(now())
    }

    // Queries

    pub fn current_variant(&self) -> Option<Variant> {
        self.engine.lock().current_variant().cloned()
    }

    pub fn bandwidth_estimate(&self) -> Option<f64> {
        self.engine.lock().bandwidth_estimate()
    }

    pub fn network_state(&self) -> NetworkState {
        self.engine.lock().network_state()
    }

    pub fn status(&self) -> EngineStatus {
        self.engine.lock().status()
    }

    pub fn consecutive_errors(&self) -> u32 {
        self.engine.lock().consecutive_errors()
    }

    pub fn is_monitoring(&self) -> bool {
        self.monitor
            .lock()
            .as_ref()
            .is_some_and(MonitorHandle::is_running)
    }

    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<AbrEvent> {
        self.bus.subscribe()
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    fn spawn_monitor(&self, interval: Duration) -> SessionResult<MonitorHandle> {
        MonitorHandle::spawn(
            Arc::clone(&self.engine),
            interval,
            &self.cancel,
            self.bus.clone(),
        )
    }

    fn stop_monitor(&self) {
        if let Some(monitor) = self.monitor.lock().take() {
            monitor.stop();
        }
    }
}
