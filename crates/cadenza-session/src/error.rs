use cadenza_abr::AbrError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("ABR error: {0}")]
    Abr(#[from] AbrError),

    #[error("No tokio runtime available to drive the ABR monitor")]
    NoRuntime,

    #[error("Session cancellation token was cancelled")]
    Cancelled,

    #[error("Session released")]
    Released,
}

pub type SessionResult<T> = Result<T, SessionError>;
