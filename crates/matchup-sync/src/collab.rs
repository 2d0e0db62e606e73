//! Seams to external collaborators: authentication, the group directory and
//! the notifier. The core consumes these through narrow traits and never
//! learns how they are implemented.

use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::warn;

use matchup_engine::SessionEvent;
use matchup_shared::{GroupId, UserId};
use matchup_store::Database;

// ---------------------------------------------------------------------------
// Authentication
// ---------------------------------------------------------------------------

/// Source of the signed-in identity. Identity is an opaque handle; the core
/// threads it explicitly into every engine call instead of reading ambient
/// state.
pub trait AuthProvider: Send + Sync {
    /// The currently signed-in identity, if any.
    fn current_identity(&self) -> Option<UserId>;

    /// Watch sign-in / sign-out transitions.
    fn identity_changes(&self) -> watch::Receiver<Option<UserId>>;
}

/// Trivial [`AuthProvider`] holding one mutable identity. Suits tests, dev
/// builds and single-account desktop use.
pub struct FixedIdentity {
    tx: watch::Sender<Option<UserId>>,
}

impl FixedIdentity {
    pub fn signed_in(user: UserId) -> Self {
        Self {
            tx: watch::channel(Some(user)).0,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            tx: watch::channel(None).0,
        }
    }

    /// Replace the signed-in identity, notifying watchers.
    pub fn set(&self, identity: Option<UserId>) {
        self.tx.send_replace(identity);
    }
}

impl AuthProvider for FixedIdentity {
    fn current_identity(&self) -> Option<UserId> {
        self.tx.borrow().clone()
    }

    fn identity_changes(&self) -> watch::Receiver<Option<UserId>> {
        self.tx.subscribe()
    }
}

// ---------------------------------------------------------------------------
// Group directory
// ---------------------------------------------------------------------------

/// Membership lookups against the group directory.
pub trait GroupDirectory: Send + Sync {
    /// Member identities of one group.
    fn members(&self, group: &GroupId) -> Vec<UserId>;

    /// Ids of every group the user belongs to.
    fn memberships(&self, user: &UserId) -> Vec<GroupId>;
}

/// [`GroupDirectory`] answering from the local cache, so visibility checks
/// keep working offline. Lookup failures degrade to "no memberships" rather
/// than erroring; a missing cache entry must never block a listing.
pub struct CachedGroupDirectory {
    cache: Arc<Mutex<Database>>,
}

impl CachedGroupDirectory {
    pub fn new(cache: Arc<Mutex<Database>>) -> Self {
        Self { cache }
    }
}

impl GroupDirectory for CachedGroupDirectory {
    fn members(&self, group: &GroupId) -> Vec<UserId> {
        let Ok(db) = self.cache.lock() else {
            return Vec::new();
        };
        match db.get_group(*group) {
            Ok(g) => g.members,
            Err(e) => {
                warn!(group = %group, error = %e, "group lookup failed, treating as empty");
                Vec::new()
            }
        }
    }

    fn memberships(&self, user: &UserId) -> Vec<GroupId> {
        let Ok(db) = self.cache.lock() else {
            return Vec::new();
        };
        db.group_memberships(user).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Fire-and-forget delivery of notification-worthy events. The core never
/// awaits delivery confirmation; transport guarantees are the collaborator's
/// problem.
pub trait Notifier: Send + Sync {
    fn emit(&self, recipient: &UserId, event: &SessionEvent);
}

/// Notifier that only logs. Default for headless runs.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn emit(&self, recipient: &UserId, event: &SessionEvent) {
        tracing::info!(recipient = %recipient, event = ?event, "notification");
    }
}
