use thiserror::Error;

/// Errors surfaced by engine construction and reconfiguration.
///
/// Runtime playback paths never fail: they degrade toward the lowest variant
/// instead.
#[derive(Debug, Error)]
pub enum AbrError {
    #[error("Invalid ABR options: {0}")]
    InvalidOptions(String),
}

pub type AbrResult<T> = Result<T, AbrError>;
