//! The session synchronizer: optimistic local mutation, remote persistence
//! with cache fallback, and reconciliation of push updates against a
//! last-seen snapshot map.
//!
//! The snapshot map is keyed by session id and updated both by local
//! mutations (so a write's own echo push stays silent) and by incoming
//! pushes (remote state is authoritative once received and supersedes
//! unconfirmed local optimism for the same id).

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use matchup_shared::{Message, Session, SessionId};
use matchup_store::{repair, Database};

use crate::error::{Result, SyncError};
use crate::remote::{RemoteError, RemoteStore, MESSAGES_COLLECTION, SESSIONS_COLLECTION};

// ---------------------------------------------------------------------------
// Outcome / update types
// ---------------------------------------------------------------------------

/// Result of a write: remote durability achieved, or degraded to cache-only.
///
/// Degraded is still success -- the data is never dropped -- but the caller
/// is expected to surface the reason to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Written remotely and mirrored to the local cache.
    Synced,
    /// Remote write failed; the record lives only in the local cache until a
    /// later write succeeds.
    CachedOnly { reason: RemoteError },
}

impl PersistOutcome {
    pub fn is_degraded(&self) -> bool {
        matches!(self, PersistOutcome::CachedOnly { .. })
    }
}

/// One session's externally-visible change between two pushes.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionChange {
    /// Last-seen snapshot, `None` for a session first seen in this push.
    pub previous: Option<Session>,
    pub current: Session,
}

/// A reconciled push update, delivered to the subscription callback.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncUpdate {
    /// The full current collection, newest schedule first.
    pub sessions: Vec<Session>,
    /// Per-session diffs against the last-seen snapshots. Empty on the first
    /// push (initialization is not a change).
    pub changes: Vec<SessionChange>,
    /// Sessions that disappeared from the collection (cancelled remotely).
    pub removed: Vec<SessionId>,
}

struct SnapshotState {
    /// False until a remote read or push has seeded the map; the first push
    /// after seeding-by-nothing emits no diffs.
    primed: bool,
    sessions: HashMap<SessionId, Session>,
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Orchestrates reads and writes across the remote store and local cache.
pub struct Synchronizer {
    remote: Arc<dyn RemoteStore>,
    cache: Arc<Mutex<Database>>,
    snapshot: Arc<Mutex<SnapshotState>>,
}

impl Synchronizer {
    pub fn new(remote: Arc<dyn RemoteStore>, cache: Arc<Mutex<Database>>) -> Self {
        Self {
            remote,
            cache,
            snapshot: Arc::new(Mutex::new(SnapshotState {
                primed: false,
                sessions: HashMap::new(),
            })),
        }
    }

    /// Shared handle to the local cache.
    pub fn cache(&self) -> Arc<Mutex<Database>> {
        self.cache.clone()
    }

    fn cache_db(&self) -> Result<MutexGuard<'_, Database>> {
        self.cache.lock().map_err(|_| SyncError::LockPoisoned)
    }

    /// The last-seen snapshot for one session, if any.
    pub fn last_seen(&self, id: SessionId) -> Option<Session> {
        self.snapshot
            .lock()
            .ok()
            .and_then(|s| s.sessions.get(&id).cloned())
    }

    /// Persist a session: remote write first, local cache always.
    ///
    /// A remote failure degrades the result to [`PersistOutcome::CachedOnly`]
    /// instead of erroring; only a local cache failure is a hard error. The
    /// snapshot map is updated either way so the write's own echo push does
    /// not read as an external change.
    pub async fn persist(&self, session: &Session) -> Result<PersistOutcome> {
        let record = serde_json::to_value(session)?;
        let remote_result = self
            .remote
            .write_one(SESSIONS_COLLECTION, &session.id.to_string(), record)
            .await;

        self.cache_db()?.upsert_session(session)?;

        if let Ok(mut snap) = self.snapshot.lock() {
            snap.sessions.insert(session.id, session.clone());
        }

        match remote_result {
            Ok(()) => Ok(PersistOutcome::Synced),
            Err(reason) => {
                warn!(session = %session.id, error = %reason, "remote write failed, cached locally");
                Ok(PersistOutcome::CachedOnly { reason })
            }
        }
    }

    /// Hard-delete a session and its chat, remotely and locally.
    pub async fn delete(&self, id: SessionId) -> Result<PersistOutcome> {
        let remote_result = self
            .remote
            .delete_one(SESSIONS_COLLECTION, &id.to_string())
            .await;

        {
            let db = self.cache_db()?;
            db.delete_session(id)?;
            db.delete_messages_for_session(id)?;
        }

        if let Ok(mut snap) = self.snapshot.lock() {
            snap.sessions.remove(&id);
        }

        match remote_result {
            Ok(()) => Ok(PersistOutcome::Synced),
            Err(reason) => {
                warn!(session = %id, error = %reason, "remote delete failed, removed locally");
                Ok(PersistOutcome::CachedOnly { reason })
            }
        }
    }

    /// Persist one chat message: remote write first, local cache always.
    pub async fn persist_message(&self, message: &Message) -> Result<PersistOutcome> {
        let record = serde_json::to_value(message)?;
        let remote_result = self
            .remote
            .write_one(MESSAGES_COLLECTION, &message.id.to_string(), record)
            .await;

        self.cache_db()?.insert_message(message)?;

        match remote_result {
            Ok(()) => Ok(PersistOutcome::Synced),
            Err(reason) => {
                warn!(message = %message.id, error = %reason, "remote write failed, cached locally");
                Ok(PersistOutcome::CachedOnly { reason })
            }
        }
    }

    /// A session's cached chat, chronological.
    pub fn messages_for(&self, session_id: SessionId) -> Result<Vec<Message>> {
        Ok(self.cache_db()?.list_messages_for_session(session_id)?)
    }

    /// Load every session: remote first, full local-cache fallback.
    ///
    /// A successful remote read repairs each record, mirrors the collection
    /// into the cache (upserts and deletions both) and primes the snapshot
    /// map. On remote failure the cache contents are served as-is (already
    /// repaired on read).
    pub async fn load_all(&self) -> Result<Vec<Session>> {
        match self.remote.read_all(SESSIONS_COLLECTION).await {
            Ok(records) => {
                let mut sessions = repair_records(&records);

                {
                    let db = self.cache_db()?;
                    db.upsert_sessions(&sessions)?;
                    // A session cancelled remotely while no subscription was
                    // running must not resurrect from the cache later.
                    for cached in db.list_sessions()? {
                        if !sessions.iter().any(|s| s.id == cached.id) {
                            db.delete_session(cached.id)?;
                            db.delete_messages_for_session(cached.id)?;
                        }
                    }
                }

                if let Ok(mut snap) = self.snapshot.lock() {
                    snap.sessions = sessions.iter().map(|s| (s.id, s.clone())).collect();
                    snap.primed = true;
                }

                sessions.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
                Ok(sessions)
            }
            Err(error) => {
                info!(error = %error, "remote read failed, serving local cache");
                Ok(self.cache_db()?.list_sessions()?)
            }
        }
    }

    /// Register a push listener on the sessions collection.
    ///
    /// Every remote change delivers the full collection; the synchronizer
    /// diffs it against the last-seen snapshots, mirrors it into the cache
    /// and hands the caller a [`SyncUpdate`]. The first push seeds the
    /// snapshots and carries no diffs. The returned handle unsubscribes
    /// idempotently; `on_update` is never invoked after `unsubscribe`
    /// returns.
    pub fn subscribe<F>(&self, on_update: F) -> SubscriptionHandle
    where
        F: Fn(SyncUpdate) + Send + 'static,
    {
        let mut rx = self.remote.subscribe(SESSIONS_COLLECTION);
        let cancelled = Arc::new(AtomicBool::new(false));
        let flag = cancelled.clone();
        let cache = self.cache.clone();
        let snapshot = self.snapshot.clone();

        let task = tokio::spawn(async move {
            loop {
                let records = match rx.recv().await {
                    Ok(records) => records,
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Each push is a full snapshot, so the next one heals us.
                        warn!(skipped, "subscription lagged, waiting for next push");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                };

                if flag.load(Ordering::SeqCst) {
                    break;
                }

                let update = match reconcile(&cache, &snapshot, &records) {
                    Ok(update) => update,
                    Err(error) => {
                        warn!(error = %error, "failed to reconcile push update");
                        continue;
                    }
                };

                if flag.load(Ordering::SeqCst) {
                    break;
                }
                on_update(update);
            }
            debug!("subscription task ended");
        });

        SubscriptionHandle { cancelled, task }
    }
}

/// Repair a pushed or fetched record set, skipping what cannot be repaired.
fn repair_records(records: &[serde_json::Value]) -> Vec<Session> {
    records
        .iter()
        .filter_map(|record| match repair(record) {
            Some(session) => Some(session),
            None => {
                warn!("skipping unrepairable remote record");
                None
            }
        })
        .collect()
}

/// Diff one full-collection push against the last-seen snapshots, replace
/// them (remote is authoritative), and mirror the result into the cache.
fn reconcile(
    cache: &Arc<Mutex<Database>>,
    snapshot: &Arc<Mutex<SnapshotState>>,
    records: &[serde_json::Value],
) -> Result<SyncUpdate> {
    let mut sessions = repair_records(records);

    let (changes, removed) = {
        let mut snap = snapshot.lock().map_err(|_| SyncError::LockPoisoned)?;

        let mut changes = Vec::new();
        let mut removed: Vec<SessionId> = Vec::new();

        if snap.primed {
            for session in &sessions {
                let previous = snap.sessions.get(&session.id);
                if previous != Some(session) {
                    changes.push(SessionChange {
                        previous: previous.cloned(),
                        current: session.clone(),
                    });
                }
            }
            removed = snap
                .sessions
                .keys()
                .filter(|id| !sessions.iter().any(|s| s.id == **id))
                .copied()
                .collect();
        }

        snap.sessions = sessions.iter().map(|s| (s.id, s.clone())).collect();
        snap.primed = true;

        (changes, removed)
    };

    {
        let db = cache.lock().map_err(|_| SyncError::LockPoisoned)?;
        db.upsert_sessions(&sessions)?;
        for id in &removed {
            db.delete_session(*id)?;
            db.delete_messages_for_session(*id)?;
        }
    }

    sessions.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
    Ok(SyncUpdate {
        sessions,
        changes,
        removed,
    })
}

// ---------------------------------------------------------------------------
// Subscription handle
// ---------------------------------------------------------------------------

/// Handle to an active push subscription.
///
/// [`SubscriptionHandle::unsubscribe`] may be called any number of times;
/// after the first call returns, the callback fires no more. Dropping the
/// handle unsubscribes too.
pub struct SubscriptionHandle {
    cancelled: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

impl SubscriptionHandle {
    pub fn unsubscribe(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
        self.task.abort();
    }
}

impl Drop for SubscriptionHandle {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
