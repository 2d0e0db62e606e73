//! # matchup-sync
//!
//! Bridges the pure membership engine to durable storage: remote-preferred
//! writes with local-cache fallback, remote-first reads with offline
//! fallback, and reconciliation of push-based remote updates against a
//! last-seen snapshot map.
//!
//! Also hosts the narrow seams to external collaborators: the remote session
//! store, the authentication provider, the group directory and the notifier.

pub mod collab;
pub mod remote;
pub mod synchronizer;

mod error;

pub use collab::{
    AuthProvider, CachedGroupDirectory, FixedIdentity, GroupDirectory, LogNotifier, Notifier,
};
pub use error::SyncError;
pub use remote::{MemoryRemote, RemoteError, RemoteStore, MESSAGES_COLLECTION, SESSIONS_COLLECTION};
pub use synchronizer::{
    PersistOutcome, SessionChange, SubscriptionHandle, SyncUpdate, Synchronizer,
};
