#![forbid(unsafe_code)]
#![expect(
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    reason = "test utility crate: numeric casts are acceptable for trace generation"
)]

//! Shared test utilities for the cadenza workspace.

pub mod fixtures;
pub mod host;
pub mod rng;

pub use fixtures::*;
pub use host::{RecordingSink, ScriptedBuffer, StaticHint};
pub use rng::*;
