//! The [`Client`]: orchestration of engine, synchronizer and collaborators.
//!
//! The in-memory session list is mutated only by user-action handlers and
//! the subscription callback. Handlers re-read it after every await point
//! rather than trusting a pre-await snapshot; capacity is re-checked inside
//! the engine at acceptance time for the same reason.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tracing::{debug, info};

use matchup_engine::membership::{self, CreateSessionParams, Outcome};
use matchup_engine::{notify, visibility};
use matchup_shared::{Message, MessageId, Session, SessionId, UserId};
use matchup_sync::{
    AuthProvider, GroupDirectory, Notifier, PersistOutcome, SubscriptionHandle, Synchronizer,
};

use crate::error::ClientError;

/// Result of a user action that can legitimately be a no-op (capacity races
/// and duplicate requests are normal concurrent usage, not failures).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The action changed the session; carries the persistence result.
    Applied(PersistOutcome),
    /// The action had no effect. The next push update corrects any stale
    /// view that prompted it.
    Noop,
}

/// Per-process entry point for everything the UI does with sessions.
pub struct Client {
    auth: Arc<dyn AuthProvider>,
    notifier: Arc<dyn Notifier>,
    groups: Arc<dyn GroupDirectory>,
    sync: Arc<Synchronizer>,
    sessions: Arc<Mutex<HashMap<SessionId, Session>>>,
}

impl Client {
    pub fn new(
        auth: Arc<dyn AuthProvider>,
        notifier: Arc<dyn Notifier>,
        groups: Arc<dyn GroupDirectory>,
        sync: Synchronizer,
    ) -> Self {
        Self {
            auth,
            notifier,
            groups,
            sync: Arc::new(sync),
            sessions: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    fn me(&self) -> Result<UserId, ClientError> {
        self.auth.current_identity().ok_or(ClientError::NotSignedIn)
    }

    /// Current in-memory snapshot of one session.
    fn session(&self, id: SessionId) -> Result<Session, ClientError> {
        self.sessions
            .lock()
            .ok()
            .and_then(|map| map.get(&id).cloned())
            .ok_or(ClientError::UnknownSession(id))
    }

    fn remember(&self, session: &Session) {
        if let Ok(mut map) = self.sessions.lock() {
            map.insert(session.id, session.clone());
        }
    }

    fn forget(&self, id: SessionId) {
        if let Ok(mut map) = self.sessions.lock() {
            map.remove(&id);
        }
    }

    // ------------------------------------------------------------------
    // Listing
    // ------------------------------------------------------------------

    /// Load every session, remote-first with cache fallback, and make it the
    /// current in-memory list.
    pub async fn load_sessions(&self) -> Result<Vec<Session>, ClientError> {
        let sessions = self.sync.load_all().await?;
        if let Ok(mut map) = self.sessions.lock() {
            *map = sessions.iter().map(|s| (s.id, s.clone())).collect();
        }
        Ok(sessions)
    }

    /// The sessions the signed-in user may currently see, newest schedule
    /// first. Sessions organized by a blocked identity are hidden unless the
    /// user already participates.
    pub fn visible_sessions(&self) -> Result<Vec<Session>, ClientError> {
        let me = self.me()?;
        let my_groups = self.groups.memberships(&me);
        let blocked = self
            .sync
            .cache()
            .lock()
            .ok()
            .and_then(|db| db.get_block_list(&me).ok())
            .unwrap_or_default();

        let map = self
            .sessions
            .lock()
            .map_err(|_| matchup_sync::SyncError::LockPoisoned)?;

        let mut visible: Vec<Session> = map
            .values()
            .filter(|s| visibility::can_view(s, &me, &my_groups))
            .filter(|s| {
                s.is_participant(&me)
                    || s.organizer().map_or(true, |o| !blocked.contains(&o.user))
            })
            .cloned()
            .collect();

        visible.sort_by(|a, b| b.scheduled_at.cmp(&a.scheduled_at));
        Ok(visible)
    }

    /// Whether the signed-in user may request to join a session right now.
    /// Re-evaluated on each call; group membership changes between listing
    /// and action.
    pub fn can_join(&self, id: SessionId) -> Result<bool, ClientError> {
        let me = self.me()?;
        let session = self.session(id)?;
        Ok(visibility::can_join(&session, &me, &self.groups.memberships(&me)))
    }

    // ------------------------------------------------------------------
    // Membership operations
    // ------------------------------------------------------------------

    /// Create a session with the signed-in user as permanent organizer.
    pub async fn create_session(
        &self,
        params: CreateSessionParams,
    ) -> Result<(Session, PersistOutcome), ClientError> {
        let me = self.me()?;
        let session = membership::create_session(params, &me, Utc::now())?;

        let outcome = self.sync.persist(&session).await?;
        self.remember(&session);

        info!(session = %session.id, organizer = %me, "session created");
        Ok((session, outcome))
    }

    /// Request to join a session. Idempotent; a no-op when the user already
    /// participates, already asked, the session is complete, or visibility
    /// gates them out.
    pub async fn request_join(&self, id: SessionId) -> Result<ActionOutcome, ClientError> {
        let me = self.me()?;
        let session = self.session(id)?;
        let my_groups = self.groups.memberships(&me);

        match membership::request_join(&session, &me, &my_groups, Utc::now()) {
            Outcome::Changed(next) => {
                let outcome = self.sync.persist(&next).await?;
                self.remember(&next);
                debug!(session = %id, user = %me, "join requested");
                Ok(ActionOutcome::Applied(outcome))
            }
            Outcome::Unchanged => Ok(ActionOutcome::Noop),
        }
    }

    /// Accept a pending request (organizer only). The acceptance
    /// notification reaches the player through their own device's push
    /// subscription (see [`Client::start_sync`]); emitting it here too would
    /// deliver it twice. Nothing changes when the capacity race was lost and
    /// the request stays pending.
    pub async fn accept_request(
        &self,
        id: SessionId,
        player: &UserId,
    ) -> Result<ActionOutcome, ClientError> {
        let me = self.me()?;
        let session = self.session(id)?;
        if !session.is_organizer(&me) {
            return Err(ClientError::NotAllowed);
        }

        match membership::accept_request(&session, player) {
            Outcome::Changed(next) => {
                let outcome = self.sync.persist(&next).await?;
                self.remember(&next);
                info!(session = %id, player = %player, "request accepted");
                Ok(ActionOutcome::Applied(outcome))
            }
            Outcome::Unchanged => Ok(ActionOutcome::Noop),
        }
    }

    /// Remove a participant: self-withdrawal, or any player when the
    /// signed-in user organizes the session. The organizer themselves can
    /// only cancel.
    pub async fn remove_participant(
        &self,
        id: SessionId,
        player: &UserId,
    ) -> Result<PersistOutcome, ClientError> {
        let me = self.me()?;
        let session = self.session(id)?;
        if *player != me && !session.is_organizer(&me) {
            return Err(ClientError::NotAllowed);
        }

        let next = membership::remove_participant(&session, player)?;
        let outcome = self.sync.persist(&next).await?;
        self.remember(&next);
        Ok(outcome)
    }

    /// Cancel a session outright (organizer only). Hard delete, no
    /// tombstone; the chat goes with it.
    pub async fn cancel_session(&self, id: SessionId) -> Result<PersistOutcome, ClientError> {
        let me = self.me()?;
        let session = self.session(id)?;
        if !session.is_organizer(&me) {
            return Err(ClientError::NotAllowed);
        }

        let outcome = self.sync.delete(id).await?;
        self.forget(id);
        info!(session = %id, "session cancelled");
        Ok(outcome)
    }

    /// Flip a session between group-scoped and community-open (organizer
    /// only). Opening with slots left emits the community notification.
    pub async fn toggle_community_visibility(
        &self,
        id: SessionId,
    ) -> Result<ActionOutcome, ClientError> {
        let me = self.me()?;
        let session = self.session(id)?;
        if !session.is_organizer(&me) {
            return Err(ClientError::NotAllowed);
        }

        match membership::toggle_community_visibility(&session) {
            Outcome::Changed(next) => {
                let outcome = self.sync.persist(&next).await?;
                self.remember(&next);
                for event in notify::diff(Some(&session), &next, &me) {
                    self.notifier.emit(&me, &event);
                }
                Ok(ActionOutcome::Applied(outcome))
            }
            Outcome::Unchanged => Ok(ActionOutcome::Noop),
        }
    }

    // ------------------------------------------------------------------
    // Chat
    // ------------------------------------------------------------------

    /// Append a chat message to a session the user can see.
    pub async fn send_message(
        &self,
        id: SessionId,
        body: impl Into<String>,
    ) -> Result<(Message, PersistOutcome), ClientError> {
        let me = self.me()?;
        // Confirms the session is in the current list.
        self.session(id)?;

        let message = Message {
            id: MessageId::new(),
            session_id: id,
            author: me,
            body: body.into(),
            created_at: Utc::now(),
        };
        let outcome = self.sync.persist_message(&message).await?;
        Ok((message, outcome))
    }

    /// A session's cached chat, chronological.
    pub fn messages_for(&self, id: SessionId) -> Result<Vec<Message>, ClientError> {
        Ok(self.sync.messages_for(id)?)
    }

    // ------------------------------------------------------------------
    // Push updates
    // ------------------------------------------------------------------

    /// Start consuming push updates: every reconciled push replaces the
    /// in-memory list, and per-session diffs are run through the
    /// notification trigger for the signed-in identity.
    ///
    /// The returned handle unsubscribes idempotently; dropping it
    /// unsubscribes too.
    pub fn start_sync(&self) -> SubscriptionHandle {
        let sessions = self.sessions.clone();
        let notifier = self.notifier.clone();
        let auth = self.auth.clone();

        self.sync.subscribe(move |update| {
            if let Ok(mut map) = sessions.lock() {
                *map = update.sessions.iter().map(|s| (s.id, s.clone())).collect();
            }

            let Some(me) = auth.current_identity() else {
                return;
            };
            for change in &update.changes {
                for event in notify::diff(change.previous.as_ref(), &change.current, &me) {
                    notifier.emit(&me, &event);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use matchup_engine::SessionEvent;
    use matchup_shared::{Group, GroupId, SessionFormat, Visibility};
    use matchup_store::Database;
    use matchup_sync::{CachedGroupDirectory, FixedIdentity, MemoryRemote, RemoteError};

    /// Notifier that records every emitted event.
    struct RecordingNotifier {
        events: Mutex<Vec<(UserId, SessionEvent)>>,
    }

    impl RecordingNotifier {
        fn new() -> Self {
            Self {
                events: Mutex::new(Vec::new()),
            }
        }

        fn recorded(&self) -> Vec<(UserId, SessionEvent)> {
            self.events.lock().unwrap().clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn emit(&self, recipient: &UserId, event: &SessionEvent) {
            self.events
                .lock()
                .unwrap()
                .push((recipient.clone(), event.clone()));
        }
    }

    fn params(capacity: u32, group_id: GroupId, visibility: Visibility) -> CreateSessionParams {
        CreateSessionParams {
            group_id,
            group_name: "Padel Lyon 7".to_string(),
            zone: "Lyon".to_string(),
            scheduled_at: Utc::now(),
            format: SessionFormat::Double,
            capacity,
            venue: None,
            visibility,
        }
    }

    /// A client for `identity` with its own cache, sharing `remote`.
    fn client_for(
        identity: &str,
        remote: Arc<MemoryRemote>,
    ) -> (Client, Arc<RecordingNotifier>, Arc<Mutex<Database>>) {
        let cache = Arc::new(Mutex::new(Database::open_in_memory().unwrap()));
        let notifier = Arc::new(RecordingNotifier::new());
        let client = Client::new(
            Arc::new(FixedIdentity::signed_in(identity.into())),
            notifier.clone(),
            Arc::new(CachedGroupDirectory::new(cache.clone())),
            Synchronizer::new(remote, cache.clone()),
        );
        (client, notifier, cache)
    }

    fn seed_group(cache: &Arc<Mutex<Database>>, members: &[&str]) -> GroupId {
        let group = Group {
            id: GroupId::new(),
            name: "Padel Lyon 7".to_string(),
            zone: "Lyon".to_string(),
            members: members.iter().map(|m| UserId::new(*m)).collect(),
        };
        cache.lock().unwrap().upsert_group(&group).unwrap();
        group.id
    }

    #[tokio::test]
    async fn create_then_join_then_accept() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, alice_notify, alice_cache) = client_for("alice", remote.clone());
        let (bob, bob_notify, bob_cache) = client_for("bob", remote.clone());

        let group_id = seed_group(&alice_cache, &["alice", "bob"]);
        seed_group(&bob_cache, &[]); // bob's own cache has an unrelated group

        let (session, outcome) = alice
            .create_session(params(4, group_id, Visibility::Community))
            .await
            .unwrap();
        assert_eq!(outcome, PersistOutcome::Synced);

        bob.load_sessions().await.unwrap();
        assert!(bob.can_join(session.id).unwrap());
        assert_eq!(
            bob.request_join(session.id).await.unwrap(),
            ActionOutcome::Applied(PersistOutcome::Synced)
        );
        // Second request is a no-op.
        assert_eq!(bob.request_join(session.id).await.unwrap(), ActionOutcome::Noop);

        alice.load_sessions().await.unwrap();
        let outcome = alice
            .accept_request(session.id, &"bob".into())
            .await
            .unwrap();
        assert_eq!(outcome, ActionOutcome::Applied(PersistOutcome::Synced));

        // Notification is the push subscription's job; the organizer's own
        // process emits nothing for either side.
        assert!(alice_notify.recorded().is_empty());
        assert!(bob_notify.recorded().is_empty());
        let accepted = alice.load_sessions().await.unwrap();
        assert!(accepted[0].is_participant(&"bob".into()));
        assert!(accepted[0].requests.is_empty());
    }

    #[tokio::test]
    async fn group_scoped_join_requires_membership() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, _, alice_cache) = client_for("alice", remote.clone());
        let (mallory, _, _) = client_for("mallory", remote.clone());

        let group_id = seed_group(&alice_cache, &["alice", "bob"]);
        let (session, _) = alice
            .create_session(params(4, group_id, Visibility::Group))
            .await
            .unwrap();

        mallory.load_sessions().await.unwrap();
        // Globally listable, but not joinable without membership.
        assert!(!mallory.visible_sessions().unwrap().is_empty());
        assert!(!mallory.can_join(session.id).unwrap());
        assert_eq!(
            mallory.request_join(session.id).await.unwrap(),
            ActionOutcome::Noop
        );
    }

    #[tokio::test]
    async fn capacity_race_keeps_loser_pending() {
        let remote = Arc::new(MemoryRemote::new());
        let (a, _, cache) = client_for("A", remote.clone());
        let group_id = seed_group(&cache, &["A", "B", "C"]);

        let (session, _) = a
            .create_session(params(2, group_id, Visibility::Community))
            .await
            .unwrap();

        let (b, _, _) = client_for("B", remote.clone());
        let (c, _, _) = client_for("C", remote.clone());
        b.load_sessions().await.unwrap();
        c.load_sessions().await.unwrap();
        b.request_join(session.id).await.unwrap();
        c.request_join(session.id).await.unwrap();

        a.load_sessions().await.unwrap();
        assert_eq!(
            a.accept_request(session.id, &"B".into()).await.unwrap(),
            ActionOutcome::Applied(PersistOutcome::Synced)
        );
        // One slot existed; C's acceptance loses the race but stays pending.
        assert_eq!(
            a.accept_request(session.id, &"C".into()).await.unwrap(),
            ActionOutcome::Noop
        );

        let current = a.load_sessions().await.unwrap();
        assert_eq!(current[0].participants.len(), 2);
        assert_eq!(current[0].requests.len(), 1);
        assert!(current[0].has_pending_request(&"C".into()));
    }

    #[tokio::test]
    async fn toggle_emits_opened_to_community() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, notify, cache) = client_for("alice", remote);
        let group_id = seed_group(&cache, &["alice"]);

        let (session, _) = alice
            .create_session(params(4, group_id, Visibility::Group))
            .await
            .unwrap();
        alice.toggle_community_visibility(session.id).await.unwrap();

        let events = notify.recorded();
        assert_eq!(events.len(), 1);
        assert_eq!(
            events[0].1,
            SessionEvent::OpenedToCommunity {
                session_id: session.id,
                group_name: "Padel Lyon 7".to_string(),
                remaining_slots: 3,
            }
        );

        // Toggling back emits nothing.
        alice.toggle_community_visibility(session.id).await.unwrap();
        assert_eq!(notify.recorded().len(), 1);
    }

    #[tokio::test]
    async fn offline_create_survives_in_cache() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, _, cache) = client_for("alice", remote.clone());
        let group_id = seed_group(&cache, &["alice"]);

        remote.fail_with(RemoteError::Unavailable);
        let (session, outcome) = alice
            .create_session(params(4, group_id, Visibility::Community))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            PersistOutcome::CachedOnly {
                reason: RemoteError::Unavailable
            }
        );

        // Still offline: loadAll serves the cache with the mutation applied.
        let loaded = alice.load_sessions().await.unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].id, session.id);
    }

    #[tokio::test]
    async fn only_the_organizer_cancels_and_never_leaves() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, _, cache) = client_for("alice", remote.clone());
        let (bob, _, _) = client_for("bob", remote.clone());
        let group_id = seed_group(&cache, &["alice", "bob"]);

        let (session, _) = alice
            .create_session(params(4, group_id, Visibility::Community))
            .await
            .unwrap();
        bob.load_sessions().await.unwrap();

        assert!(matches!(
            bob.cancel_session(session.id).await,
            Err(ClientError::NotAllowed)
        ));
        assert!(matches!(
            alice.remove_participant(session.id, &"alice".into()).await,
            Err(ClientError::Engine(_))
        ));

        alice.cancel_session(session.id).await.unwrap();
        assert!(alice.load_sessions().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_round_trip() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, _, cache) = client_for("alice", remote);
        let group_id = seed_group(&cache, &["alice"]);

        let (session, _) = alice
            .create_session(params(4, group_id, Visibility::Community))
            .await
            .unwrap();

        alice.send_message(session.id, "on joue ce soir?").await.unwrap();
        alice.send_message(session.id, "18h au terrain 2").await.unwrap();

        let messages = alice.messages_for(session.id).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].body, "on joue ce soir?");
        assert_eq!(messages[0].author, "alice".into());
    }

    #[tokio::test]
    async fn blocked_organizer_is_hidden() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, _, _) = client_for("alice", remote.clone());
        let (bob, _, bob_cache) = client_for("bob", remote.clone());
        seed_group(&bob_cache, &["bob"]);

        alice
            .create_session(params(4, GroupId::new(), Visibility::Community))
            .await
            .unwrap();
        bob.load_sessions().await.unwrap();
        assert_eq!(bob.visible_sessions().unwrap().len(), 1);

        bob_cache
            .lock()
            .unwrap()
            .set_block_list(&"bob".into(), &["alice".into()])
            .unwrap();
        assert!(bob.visible_sessions().unwrap().is_empty());
    }

    #[tokio::test]
    async fn push_update_notifies_the_accepted_player() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, _, alice_cache) = client_for("alice", remote.clone());
        let (bob, bob_notify, _) = client_for("bob", remote.clone());
        let group_id = seed_group(&alice_cache, &["alice", "bob"]);

        let (session, _) = alice
            .create_session(params(4, group_id, Visibility::Community))
            .await
            .unwrap();

        bob.load_sessions().await.unwrap();
        bob.request_join(session.id).await.unwrap();
        let handle = bob.start_sync();

        // Another device (alice's) accepts bob.
        alice.load_sessions().await.unwrap();
        alice.accept_request(session.id, &"bob".into()).await.unwrap();

        // Wait for the push to reach bob's subscription task.
        let mut accepted = Vec::new();
        for _ in 0..100 {
            accepted = bob_notify.recorded();
            if !accepted.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(
            accepted,
            vec![(
                UserId::new("bob"),
                SessionEvent::JoinedAccepted {
                    session_id: session.id,
                    group_name: "Padel Lyon 7".to_string(),
                }
            )]
        );

        // And exactly once: no second copy arrives from the organizer's side.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(bob_notify.recorded().len(), 1);

        // Bob's in-memory list now shows him as participant.
        let visible = bob.visible_sessions().unwrap();
        assert!(visible[0].is_participant(&"bob".into()));

        handle.unsubscribe();
    }

    #[tokio::test]
    async fn stale_view_is_corrected_by_next_push() {
        let remote = Arc::new(MemoryRemote::new());
        let (alice, _, alice_cache) = client_for("alice", remote.clone());
        let (carol, _, _) = client_for("carol", remote.clone());
        let group_id = seed_group(&alice_cache, &["alice", "bob", "carol"]);

        let (session, _) = alice
            .create_session(params(2, group_id, Visibility::Community))
            .await
            .unwrap();

        carol.load_sessions().await.unwrap();
        let handle = carol.start_sync();

        // Bob fills the last slot while carol still sees an open session.
        let (bob, _, _) = client_for("bob", remote.clone());
        bob.load_sessions().await.unwrap();
        bob.request_join(session.id).await.unwrap();
        alice.load_sessions().await.unwrap();
        alice.accept_request(session.id, &"bob".into()).await.unwrap();

        // Carol's join attempt against the corrected state is a clean no-op.
        let mut full = false;
        for _ in 0..100 {
            if let Ok(s) = carol.session(session.id) {
                if s.is_full() {
                    full = true;
                    break;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(full);
        assert_eq!(
            carol.request_join(session.id).await.unwrap(),
            ActionOutcome::Noop
        );

        handle.unsubscribe();
    }
}
