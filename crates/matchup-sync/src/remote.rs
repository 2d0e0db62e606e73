//! The remote session store seam.
//!
//! The remote store is the authoritative multi-writer home of sessions and
//! messages. It is addressed by collection name, does point reads/writes
//! with last-write-wins semantics (no version token, by design), and pushes
//! the full current collection to subscribers on every change.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::debug;

/// Collection holding session ("partie") records.
pub const SESSIONS_COLLECTION: &str = "parties";
/// Collection holding session chat messages.
pub const MESSAGES_COLLECTION: &str = "messages";

/// Failures surfaced by remote store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// The remote store rejected the caller's credentials for this record.
    #[error("Permission denied by the remote store")]
    PermissionDenied,

    /// The remote store is unreachable or refusing service.
    #[error("Remote store unavailable")]
    Unavailable,

    /// Transport-level failure.
    #[error("Network error: {0}")]
    Network(String),
}

/// Authoritative multi-writer record store.
///
/// Records are raw JSON values; shape tolerance is the local layer's job
/// (see `matchup_store::repair`), never the transport's.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Read every record of a collection.
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, RemoteError>;

    /// Write (create or overwrite) one record. Last write wins.
    async fn write_one(&self, collection: &str, id: &str, record: Value)
        -> Result<(), RemoteError>;

    /// Hard-delete one record. Deleting a missing record is not an error.
    async fn delete_one(&self, collection: &str, id: &str) -> Result<(), RemoteError>;

    /// Subscribe to a collection. Every change pushes the full current
    /// collection, in the order the store applied the changes.
    fn subscribe(&self, collection: &str) -> broadcast::Receiver<Vec<Value>>;
}

// ---------------------------------------------------------------------------
// In-memory backend
// ---------------------------------------------------------------------------

/// In-memory [`RemoteStore`] used by tests and offline development.
///
/// Mutations push a full-collection snapshot to subscribers, mimicking the
/// production store's subscription primitive. [`MemoryRemote::fail_with`]
/// makes every subsequent read/write/delete fail, to exercise the degraded
/// cache-only paths.
pub struct MemoryRemote {
    collections: Mutex<HashMap<String, BTreeMap<String, Value>>>,
    senders: Mutex<HashMap<String, broadcast::Sender<Vec<Value>>>>,
    failure: Mutex<Option<RemoteError>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self {
            collections: Mutex::new(HashMap::new()),
            senders: Mutex::new(HashMap::new()),
            failure: Mutex::new(None),
        }
    }

    /// Make every subsequent operation fail with `error`.
    pub fn fail_with(&self, error: RemoteError) {
        *self.failure.lock().expect("failure lock") = Some(error);
    }

    /// Clear a failure installed by [`MemoryRemote::fail_with`].
    pub fn heal(&self) {
        *self.failure.lock().expect("failure lock") = None;
    }

    fn check(&self) -> Result<(), RemoteError> {
        match &*self.failure.lock().expect("failure lock") {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }

    fn sender(&self, collection: &str) -> broadcast::Sender<Vec<Value>> {
        self.senders
            .lock()
            .expect("senders lock")
            .entry(collection.to_string())
            .or_insert_with(|| broadcast::channel(64).0)
            .clone()
    }

    fn snapshot(&self, collection: &str) -> Vec<Value> {
        self.collections
            .lock()
            .expect("collections lock")
            .get(collection)
            .map(|records| records.values().cloned().collect())
            .unwrap_or_default()
    }

    fn push(&self, collection: &str) {
        let snapshot = self.snapshot(collection);
        // Send fails when nobody subscribed yet; that's fine.
        let _ = self.sender(collection).send(snapshot);
    }
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn read_all(&self, collection: &str) -> Result<Vec<Value>, RemoteError> {
        self.check()?;
        Ok(self.snapshot(collection))
    }

    async fn write_one(
        &self,
        collection: &str,
        id: &str,
        record: Value,
    ) -> Result<(), RemoteError> {
        self.check()?;
        self.collections
            .lock()
            .expect("collections lock")
            .entry(collection.to_string())
            .or_default()
            .insert(id.to_string(), record);
        debug!(collection, id, "memory remote write");
        self.push(collection);
        Ok(())
    }

    async fn delete_one(&self, collection: &str, id: &str) -> Result<(), RemoteError> {
        self.check()?;
        self.collections
            .lock()
            .expect("collections lock")
            .entry(collection.to_string())
            .or_default()
            .remove(id);
        self.push(collection);
        Ok(())
    }

    fn subscribe(&self, collection: &str) -> broadcast::Receiver<Vec<Value>> {
        self.sender(collection).subscribe()
    }
}
