use thiserror::Error;

use matchup_shared::{EngineError, SessionId};
use matchup_sync::SyncError;

/// Errors surfaced to the UI layer.
#[derive(Error, Debug)]
pub enum ClientError {
    /// No identity is signed in; every session operation needs one.
    #[error("No identity is signed in")]
    NotSignedIn,

    /// The session is not in the current in-memory list.
    #[error("Unknown session: {0}")]
    UnknownSession(SessionId),

    /// The signed-in identity is not allowed to perform this action.
    #[error("Not allowed to perform this action")]
    NotAllowed,

    /// Engine validation or invariant failure.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// Synchronizer failure (local cache or serialization).
    #[error(transparent)]
    Sync(#[from] SyncError),
}
