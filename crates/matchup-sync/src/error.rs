use thiserror::Error;

use matchup_store::StoreError;

/// Errors produced by the synchronizer itself.
///
/// Remote failures are deliberately absent: they degrade a write to
/// cache-only rather than failing it (see
/// [`PersistOutcome`](crate::PersistOutcome)).
#[derive(Error, Debug)]
pub enum SyncError {
    /// Local cache failure.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Record (de)serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A poisoned cache lock; another task panicked while holding it.
    #[error("Cache lock poisoned")]
    LockPoisoned,
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, SyncError>;
