//! The membership state machine: every mutation of a session's participant
//! and request lists goes through here.
//!
//! Each operation takes a session snapshot and returns either a fully valid
//! next snapshot or [`Outcome::Unchanged`]. Capacity races and duplicate
//! requests are normal concurrent-usage outcomes, not errors, so they come
//! back as `Unchanged` rather than `Err`. Cancellation is a storage-level
//! hard delete and has no engine counterpart: there is no partial-cancel
//! state to model.

use chrono::{DateTime, Utc};
use tracing::debug;

use matchup_shared::{
    EngineError, GroupId, Participant, PendingRequest, Session, SessionFormat, SessionId, UserId,
    Visibility,
};

use crate::visibility::can_join;

/// Result of an engine mutation that can legitimately be a no-op.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// The operation produced a new session snapshot.
    Changed(Session),
    /// The operation had no effect; the caller's snapshot is still current.
    Unchanged,
}

impl Outcome {
    /// The new snapshot, if the operation changed anything.
    pub fn into_session(self) -> Option<Session> {
        match self {
            Outcome::Changed(session) => Some(session),
            Outcome::Unchanged => None,
        }
    }
}

/// Parameters for [`create_session`].
#[derive(Debug, Clone)]
pub struct CreateSessionParams {
    pub group_id: GroupId,
    pub group_name: String,
    pub zone: String,
    pub scheduled_at: DateTime<Utc>,
    pub format: SessionFormat,
    pub capacity: u32,
    pub venue: Option<String>,
    pub visibility: Visibility,
}

/// Create a new session with `creator` as its permanent organizer.
///
/// Fails with [`EngineError::Validation`] when the capacity is zero, or when
/// a profile-targeted session has an empty target or targets the creator.
pub fn create_session(
    params: CreateSessionParams,
    creator: &UserId,
    now: DateTime<Utc>,
) -> Result<Session, EngineError> {
    if params.capacity == 0 {
        return Err(EngineError::Validation(
            "capacity must be greater than zero".to_string(),
        ));
    }

    if let Visibility::Targeted { target } = &params.visibility {
        if target.as_str().is_empty() {
            return Err(EngineError::Validation(
                "a profile-targeted session requires a target identity".to_string(),
            ));
        }
        if target == creator {
            return Err(EngineError::Validation(
                "a session cannot target its own creator".to_string(),
            ));
        }
    }

    Ok(Session {
        id: SessionId::new(),
        group_id: params.group_id,
        group_name: params.group_name,
        zone: params.zone,
        scheduled_at: params.scheduled_at,
        format: params.format,
        capacity: params.capacity,
        venue: params.venue,
        participants: vec![Participant::organizer(creator.clone())],
        visibility: params.visibility,
        requests: Vec::new(),
        created_at: now,
    })
}

/// Append a pending join request for `user`.
///
/// Idempotent: repeated calls with the same identity leave the request list
/// as a single call would. No-op when the user already holds a slot or a
/// request, when the session is complete, or when visibility gates them out.
pub fn request_join(
    session: &Session,
    user: &UserId,
    user_groups: &[GroupId],
    now: DateTime<Utc>,
) -> Outcome {
    if session.is_participant(user) || session.has_pending_request(user) {
        return Outcome::Unchanged;
    }
    if session.is_full() {
        debug!(session = %session.id, user = %user, "join request on complete session ignored");
        return Outcome::Unchanged;
    }
    if !can_join(session, user, user_groups) {
        return Outcome::Unchanged;
    }

    let mut next = session.clone();
    next.requests.push(PendingRequest {
        user: user.clone(),
        requested_at: now,
    });
    Outcome::Changed(next)
}

/// Accept `user`'s pending request, moving them into the participant list.
///
/// Capacity is re-checked here, not trusted from request time: several
/// requests may race against one open slot, and the losers stay pending for
/// a future opened slot rather than being dropped. At most one request per
/// identity is ever granted, even if the list somehow holds duplicates.
pub fn accept_request(session: &Session, user: &UserId) -> Outcome {
    if !session.has_pending_request(user) {
        return Outcome::Unchanged;
    }
    if session.is_full() {
        debug!(session = %session.id, user = %user, "acceptance lost the capacity race");
        return Outcome::Unchanged;
    }

    let mut next = session.clone();
    next.requests.retain(|r| &r.user != user);
    next.participants.push(Participant::player(user.clone()));
    Outcome::Changed(next)
}

/// Remove `user` from the participant list (self-withdrawal or removal by
/// the organizer; the caller enforces who may ask).
///
/// The organizer can never be removed this way; they cancel the session
/// instead.
pub fn remove_participant(session: &Session, user: &UserId) -> Result<Session, EngineError> {
    if session.is_organizer(user) {
        return Err(EngineError::OrganizerCannotLeave);
    }

    let mut next = session.clone();
    next.participants.retain(|p| &p.user != user);
    Ok(next)
}

/// Flip a session between group-scoped and community-open.
///
/// Profile-targeted sessions are not toggled through this operation; the
/// result is `Unchanged`.
pub fn toggle_community_visibility(session: &Session) -> Outcome {
    let next_visibility = match &session.visibility {
        Visibility::Group => Visibility::Community,
        Visibility::Community => Visibility::Group,
        Visibility::Targeted { .. } => return Outcome::Unchanged,
    };

    let mut next = session.clone();
    next.visibility = next_visibility;
    Outcome::Changed(next)
}
