//! The notification trigger: a pure diff of two session snapshots from one
//! viewer's perspective.
//!
//! Request creation is deliberately silent -- notifying on every join attempt
//! would be noise. Only acceptance and community opening are
//! notification-worthy.

use serde::Serialize;

use matchup_shared::{Role, Session, SessionId, UserId, Visibility};

/// A semantic, notification-worthy change between two session snapshots.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SessionEvent {
    /// The viewer was accepted into the session.
    JoinedAccepted {
        session_id: SessionId,
        group_name: String,
    },
    /// A player was accepted into the viewer's session (organizer-facing).
    PlayerAccepted {
        session_id: SessionId,
        player: UserId,
    },
    /// The session was opened to the community while slots remain.
    OpenedToCommunity {
        session_id: SessionId,
        group_name: String,
        remaining_slots: u32,
    },
}

/// Diff `previous` against `current` for `viewer`, producing zero or more
/// events.
///
/// With no prior snapshot (`previous == None`) every diff-based event is
/// suppressed: the first sight of a session is initialization, not a change.
pub fn diff(previous: Option<&Session>, current: &Session, viewer: &UserId) -> Vec<SessionEvent> {
    let Some(previous) = previous else {
        return Vec::new();
    };

    let mut events = Vec::new();

    let viewer_is_organizer = current.is_organizer(viewer);

    // Viewer newly holds a slot (and is not the organizer, who was never
    // "accepted" into their own session).
    if !viewer_is_organizer
        && !previous.is_participant(viewer)
        && current.is_participant(viewer)
    {
        events.push(SessionEvent::JoinedAccepted {
            session_id: current.id,
            group_name: current.group_name.clone(),
        });
    }

    // Organizer-facing: each non-organizer identity that went from absent to
    // present.
    if viewer_is_organizer {
        for p in &current.participants {
            if p.role == Role::Organizer {
                continue;
            }
            if !previous.is_participant(&p.user) {
                events.push(SessionEvent::PlayerAccepted {
                    session_id: current.id,
                    player: p.user.clone(),
                });
            }
        }
    }

    if previous.visibility != Visibility::Community
        && current.visibility == Visibility::Community
        && current.remaining_slots() > 0
    {
        events.push(SessionEvent::OpenedToCommunity {
            session_id: current.id,
            group_name: current.group_name.clone(),
            remaining_slots: current.remaining_slots(),
        });
    }

    events
}
