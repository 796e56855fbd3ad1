//! Contract between the engine and the playback host.
//!
//! The host owns transport and the media buffer. The engine only reads
//! buffer state through [`BufferSource`], optionally reads platform hints
//! through [`NetworkHintSource`], and hands decisions to a [`SwitchSink`].

use std::{ops::Range, sync::Arc};

use crate::{AbrReason, NetworkHint, Variant, VariantId, buffer::buffered_ahead};

/// Instruction handed to the host when the engine switches variant.
#[derive(Clone, Debug, PartialEq)]
pub struct SwitchInstruction {
    pub variant: Variant,
    /// Drop already-buffered media of the old variant.
    pub clear_buffer: bool,
    /// Seconds ahead of the playhead to keep when clearing.
    pub safe_margin_secs: u32,
    pub reason: AbrReason,
}

/// Receives switch instructions. Registered once with `AbrEngine::init`.
pub trait SwitchSink: Send {
    fn switch_variant(&mut self, instruction: &SwitchInstruction);
}

impl<F> SwitchSink for F
where
    F: FnMut(&SwitchInstruction) + Send,
{
    fn switch_variant(&mut self, instruction: &SwitchInstruction) {
        self(instruction);
    }
}

/// Read access to the host's media buffer.
pub trait BufferSource: Send {
    /// Buffered time ranges, in seconds of media time.
    fn buffered_ranges(&self) -> Vec<Range<f64>>;

    /// Playhead position in seconds of media time.
    fn current_time(&self) -> f64;

    /// Seconds buffered ahead of the playhead.
    fn buffered_ahead(&self) -> f64 {
        buffered_ahead(&self.buffered_ranges(), self.current_time())
    }
}

/// Optional platform network information.
pub trait NetworkHintSource: Send {
    fn network_hint(&self) -> Option<NetworkHint>;
}

impl<F> NetworkHintSource for F
where
    F: Fn() -> Option<NetworkHint> + Send,
{
    fn network_hint(&self) -> Option<NetworkHint> {
        self()
    }
}

/// Notification for UI quality indicators.
#[derive(Clone, Debug, PartialEq)]
pub struct VariantChange {
    pub from: Option<VariantId>,
    pub to: Variant,
    pub reason: AbrReason,
}

/// Observer called after every variant change.
pub type VariantObserver = Arc<dyn Fn(&VariantChange) + Send + Sync>;
