#![forbid(unsafe_code)]

//! # Cadenza
//!
//! Facade crate for the cadenza adaptive bitrate engine.
//!
//! ## Quick start
//!
//! ```ignore
//! use cadenza::prelude::*;
//!
//! let session = AbrSession::new(SessionConfig::default())?;
//! session.init(|instruction: &SwitchInstruction| player.switch_to(instruction));
//! session.attach_buffer_source(player.buffer());
//! session.set_variants(manifest.variants());
//! session.enable()?;
//!
//! // after every segment download
//! session.segment_downloaded(elapsed, bytes, true);
//! ```

// ── Re-export sub-crates ────────────────────────────────────────────────

pub mod abr {
    pub use cadenza_abr::*;
}

#[cfg(feature = "session")]
pub mod session {
    pub use cadenza_session::*;
}

// ── Prelude ─────────────────────────────────────────────────────────────

pub mod prelude {
    pub use cadenza_abr::{
        AbrEngine, AbrError, AbrOptions, AbrReason, AbrResult, BufferSource, DefaultAbrEngine,
        EngineStatus, NetworkHint, NetworkHintSource, NetworkState, SpeedClass,
        SwitchInstruction, SwitchSink, Variant, VariantChange, VariantId, VariantObserver,
    };
    #[cfg(feature = "session")]
    pub use cadenza_session::{
        AbrEvent, AbrSession, EventBus, SessionConfig, SessionError, SessionResult,
    };
}
