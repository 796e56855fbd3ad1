//! Session runtime tests with a paused tokio clock.

mod monitor;
