//! Fake playback host pieces.

use std::{ops::Range, sync::Arc};

use cadenza_abr::{
    BufferSource, NetworkHint, NetworkHintSource, SwitchInstruction, SwitchSink,
};
use parking_lot::Mutex;

/// Sink that keeps every instruction it receives. Clones share the log.
#[derive(Clone, Debug, Default)]
pub struct RecordingSink {
    log: Arc<Mutex<Vec<SwitchInstruction>>>,
}

impl RecordingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instructions(&self) -> Vec<SwitchInstruction> {
        self.log.lock().clone()
    }

    pub fn last(&self) -> Option<SwitchInstruction> {
        self.log.lock().last().cloned()
    }

    /// Ids of the switched-to variants, in order.
    pub fn ids(&self) -> Vec<u64> {
        self.log.lock().iter().map(|i| i.variant.id.0).collect()
    }

    pub fn len(&self) -> usize {
        self.log.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.log.lock().is_empty()
    }
}

impl SwitchSink for RecordingSink {
    fn switch_variant(&mut self, instruction: &SwitchInstruction) {
        self.log.lock().push(instruction.clone());
    }
}

#[derive(Debug)]
struct BufferState {
    ranges: Vec<Range<f64>>,
    current_time: f64,
}

/// Buffer source whose ranges the test moves by hand.
#[derive(Clone, Debug)]
pub struct ScriptedBuffer {
    state: Arc<Mutex<BufferState>>,
}

impl ScriptedBuffer {
    /// Playhead at 0 with `level` seconds buffered ahead.
    #[must_use]
    pub fn new(level: f64) -> Self {
        Self {
            state: Arc::new(Mutex::new(BufferState {
                ranges: vec![0.0..level],
                current_time: 0.0,
            })),
        }
    }

    /// Keep the playhead, set the contiguous buffered amount ahead of it.
    pub fn set_level(&self, level: f64) {
        let mut state = self.state.lock();
        let t = state.current_time;
        state.ranges = vec![t..t + level];
    }

    pub fn set_ranges(&self, ranges: Vec<Range<f64>>, current_time: f64) {
        let mut state = self.state.lock();
        state.ranges = ranges;
        state.current_time = current_time;
    }
}

impl BufferSource for ScriptedBuffer {
    fn buffered_ranges(&self) -> Vec<Range<f64>> {
        self.state.lock().ranges.clone()
    }

    fn current_time(&self) -> f64 {
        self.state.lock().current_time
    }
}

/// Fixed platform hint.
#[derive(Clone, Copy, Debug)]
pub struct StaticHint(pub NetworkHint);

impl StaticHint {
    #[must_use]
    pub fn new(effective_type: &str, save_data: bool) -> Self {
        Self(NetworkHint::new(effective_type, save_data))
    }
}

impl NetworkHintSource for StaticHint {
    fn network_hint(&self) -> Option<NetworkHint> {
        Some(self.0)
    }
}
