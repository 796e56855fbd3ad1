#![forbid(unsafe_code)]

//! Runtime wrapper around [`cadenza_abr::AbrEngine`].
//!
//! [`AbrSession`] shares one engine between the host's hooks and a periodic
//! monitor task, and republishes variant changes on an [`EventBus`].

mod config;
mod error;
mod events;
mod monitor;
mod session;

pub use config::SessionConfig;
pub use error::{SessionError, SessionResult};
pub use events::{AbrEvent, EventBus};
pub use session::AbrSession;
