use crate::codec::CodecError;
use crate::tlog::TlogError;
use std::time::Duration;

/// Errors raised while talking to the vehicle
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("vehicle link failed: {0}")]
    Link(#[from] std::io::Error),

    #[error("speed multiplier must be finite and greater than 0, got {0}")]
    InvalidSpeedMultiplier(f64),

    #[error("no heartbeat from the vehicle within {0:?}")]
    HeartbeatTimeout(Duration),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// A broken log invalidates the run, so this is never swallowed.
    #[error(transparent)]
    Log(#[from] TlogError),
}
