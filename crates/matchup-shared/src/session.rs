//! Domain model for scheduled match sessions ("parties"), their participants
//! and pending join requests, plus session chat messages and groups.
//!
//! Every struct derives `Serialize` and `Deserialize` so it can be persisted
//! as a JSON payload locally and exchanged with the remote store as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{GroupId, MessageId, SessionId, UserId};

// ---------------------------------------------------------------------------
// Participants and requests
// ---------------------------------------------------------------------------

/// Role a participant holds inside one session.
///
/// Exactly one participant is the organizer; it is set at creation and never
/// reassigned.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Organizer,
    Player,
}

/// An identity occupying a confirmed slot in a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Participant {
    pub user: UserId,
    pub role: Role,
}

impl Participant {
    pub fn organizer(user: UserId) -> Self {
        Self {
            user,
            role: Role::Organizer,
        }
    }

    pub fn player(user: UserId) -> Self {
        Self {
            user,
            role: Role::Player,
        }
    }
}

/// An identity's unconfirmed wish to join, awaiting organizer acceptance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingRequest {
    pub user: UserId,
    pub requested_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Visibility
// ---------------------------------------------------------------------------

/// Who may see and join a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum Visibility {
    /// Only the single targeted identity may see or join.
    Targeted { target: UserId },
    /// Listable by everyone, joinable only by members of the owning group.
    Group,
    /// Open to the whole community.
    Community,
}

// ---------------------------------------------------------------------------
// Session formats
// ---------------------------------------------------------------------------

/// Closed set of match formats.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SessionFormat {
    Single,
    Double,
    Squad,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One scheduled match instance with a fixed slot capacity.
///
/// Invariants (upheld by the membership engine, relied upon everywhere):
/// - `participants.len() <= capacity`
/// - the organizer appears in `participants` exactly once, with
///   [`Role::Organizer`]
/// - no identity appears in both `participants` and `requests`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Session {
    /// Unique session identifier, stable for the session's lifetime.
    pub id: SessionId,
    /// The owning group.
    pub group_id: GroupId,
    /// Denormalized group name, kept for display without a directory lookup.
    pub group_name: String,
    /// Geographic zone the session takes place in.
    pub zone: String,
    /// When the match is scheduled.
    pub scheduled_at: DateTime<Utc>,
    /// Match format tag.
    pub format: SessionFormat,
    /// Total slot capacity, organizer included. Always > 0.
    pub capacity: u32,
    /// Optional venue reference.
    pub venue: Option<String>,
    /// Confirmed slots, in join order. The creator is first.
    pub participants: Vec<Participant>,
    /// Who may see and join this session.
    pub visibility: Visibility,
    /// Outstanding join requests, at most one per identity.
    pub requests: Vec<PendingRequest>,
    /// When the session was created. Immutable.
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// The participant holding the organizer role.
    pub fn organizer(&self) -> Option<&Participant> {
        self.participants.iter().find(|p| p.role == Role::Organizer)
    }

    pub fn is_organizer(&self, user: &UserId) -> bool {
        self.organizer().map(|p| &p.user == user).unwrap_or(false)
    }

    pub fn is_participant(&self, user: &UserId) -> bool {
        self.participants.iter().any(|p| &p.user == user)
    }

    pub fn has_pending_request(&self, user: &UserId) -> bool {
        self.requests.iter().any(|r| &r.user == user)
    }

    /// Open slots left, never negative.
    pub fn remaining_slots(&self) -> u32 {
        self.capacity.saturating_sub(self.participants.len() as u32)
    }

    /// A session is complete when no slot is left. Complete sessions accept
    /// no new requests or acceptances and are hidden from non-participants.
    pub fn is_full(&self) -> bool {
        self.remaining_slots() == 0
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat entry scoped to one session. Append-only: never mutated or deleted
/// individually, only removed when its session is cancelled.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub session_id: SessionId,
    pub author: UserId,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Group
// ---------------------------------------------------------------------------

/// A named collection of member identities, scoped to a zone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Group {
    pub id: GroupId,
    pub name: String,
    pub zone: String,
    pub members: Vec<UserId>,
}

impl Group {
    pub fn has_member(&self, user: &UserId) -> bool {
        self.members.iter().any(|m| m == user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with(capacity: u32, participants: Vec<Participant>) -> Session {
        Session {
            id: SessionId::new(),
            group_id: GroupId::new(),
            group_name: "Les Volants".to_string(),
            zone: "Lyon".to_string(),
            scheduled_at: Utc::now(),
            format: SessionFormat::Double,
            capacity,
            venue: None,
            participants,
            visibility: Visibility::Group,
            requests: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn remaining_slots_never_underflows() {
        let s = session_with(
            1,
            vec![
                Participant::organizer("alice".into()),
                Participant::player("bob".into()),
            ],
        );
        assert_eq!(s.remaining_slots(), 0);
        assert!(s.is_full());
    }

    #[test]
    fn organizer_lookup() {
        let s = session_with(
            4,
            vec![
                Participant::organizer("alice".into()),
                Participant::player("bob".into()),
            ],
        );
        assert!(s.is_organizer(&"alice".into()));
        assert!(!s.is_organizer(&"bob".into()));
        assert!(s.is_participant(&"bob".into()));
        assert_eq!(s.remaining_slots(), 2);
    }
}
