//! All integration tests for cadenza
#![expect(
    clippy::unwrap_used,
    reason = "integration test crate: unwraps are acceptable in test code"
)]

mod cadenza_abr;
mod cadenza_session;
