//! Adaptive bitrate (ABR) decision engine for segmented video playback.
//!
//! The engine picks which rendition of an HLS/DASH-style catalog the host
//! should download next. It is transport-agnostic: the host reports
//! completed downloads, exposes its media buffer through [`BufferSource`],
//! and receives [`SwitchInstruction`]s through a [`SwitchSink`].
//!
//! ## Pieces
//!
//! - [`BandwidthEstimator`]: harmonic mean over recent download samples
//! - [`BufferMonitor`]: buffer-level history and drain detection
//! - [`NetworkClassifier`]: speed class and safety factor, tightened by hints
//! - [`SwitchPolicy`]: the ordered decision rules
//! - [`AbrEngine`]: lifecycle, host hooks, failure handling and the monitor tick
//!
//! ## Example
//!
//! ```rust
//! use std::time::Duration;
//!
//! use cadenza_abr::{AbrEngine, AbrOptions, Variant, VariantId};
//! use web_time::Instant;
//!
//! let mut engine = AbrEngine::new(AbrOptions::default()).unwrap();
//! let now = Instant::now();
//! engine.set_variants(
//!     vec![
//!         Variant::new(1, 500_000, 360),
//!         Variant::new(2, 1_500_000, 720),
//!         Variant::new(3, 4_000_000, 1080),
//!     ],
//!     now,
//! );
//!
//! // three 1-second downloads at 4 Mbps
//! for _ in 0..3 {
//!     engine.segment_downloaded(Duration::from_secs(1), 500_000, false, now);
//! }
//!
//! let pick = engine.choose_variant(now).unwrap();
//! assert_eq!(pick.id, VariantId(2));
//! ```

#![forbid(unsafe_code)]

mod buffer;
mod catalog;
mod controller;
mod error;
mod estimator;
mod failure;
mod host;
mod network;
mod policy;
mod types;

pub use buffer::{BufferMonitor, BufferSample, buffered_ahead};
pub use catalog::VariantCatalog;
pub use controller::{AbrEngine, DefaultAbrEngine, EngineStatus};
pub use error::{AbrError, AbrResult};
pub use estimator::{BandwidthEstimator, Estimator};
pub use failure::{FailureAction, FailureTracker};
pub use host::{
    BufferSource, NetworkHintSource, SwitchInstruction, SwitchSink, VariantChange,
    VariantObserver,
};
pub use network::{NetworkClassifier, NetworkHint, NetworkState, NetworkType, SpeedClass};
pub use policy::{AbrDecision, AbrReason, PolicyInput, SwitchFlags, SwitchPolicy};
pub use types::{AbrOptions, Variant, VariantId};
