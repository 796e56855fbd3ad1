//! Engine-level integration tests.

mod properties;
mod scenarios;
mod simulation;
