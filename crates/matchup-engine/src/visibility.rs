//! Visibility predicates: who may see a session, who may join it.
//!
//! Both functions are pure and must be re-evaluated on every attempt --
//! group membership can change between listing a session and acting on it,
//! so callers never cache the answer.

use matchup_shared::{GroupId, Session, UserId, Visibility};

/// Whether `viewer` may see `session` at all.
///
/// Participants always see their own session. Complete sessions are hidden
/// from everyone else regardless of visibility mode. Group-scoped sessions
/// are globally listable; only joining is gated on membership.
pub fn can_view(session: &Session, viewer: &UserId, viewer_groups: &[GroupId]) -> bool {
    if session.is_participant(viewer) {
        return true;
    }
    if session.is_full() {
        return false;
    }
    match &session.visibility {
        Visibility::Community => true,
        Visibility::Group => {
            // Globally listable; membership only gates joining.
            let _ = viewer_groups;
            true
        }
        Visibility::Targeted { target } => target == viewer,
    }
}

/// Whether `viewer` may request to join `session`.
///
/// Joining is moot for participants (they already hold a slot) and
/// impossible for complete sessions.
pub fn can_join(session: &Session, viewer: &UserId, viewer_groups: &[GroupId]) -> bool {
    if session.is_participant(viewer) {
        return false;
    }
    if session.is_full() {
        return false;
    }
    match &session.visibility {
        Visibility::Community => true,
        Visibility::Group => viewer_groups.contains(&session.group_id),
        Visibility::Targeted { target } => target == viewer,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use matchup_shared::{Participant, SessionFormat, SessionId};

    fn base_session(visibility: Visibility) -> Session {
        Session {
            id: SessionId::new(),
            group_id: GroupId::new(),
            group_name: "Padel Lyon 7".to_string(),
            zone: "Lyon".to_string(),
            scheduled_at: Utc::now(),
            format: SessionFormat::Double,
            capacity: 4,
            venue: None,
            participants: vec![Participant::organizer("orga".into())],
            visibility,
            requests: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn community_open_to_all() {
        let s = base_session(Visibility::Community);
        assert!(can_view(&s, &"stranger".into(), &[]));
        assert!(can_join(&s, &"stranger".into(), &[]));
    }

    #[test]
    fn group_scoped_listable_but_join_gated() {
        let s = base_session(Visibility::Group);
        let outsider: UserId = "outsider".into();
        let insider: UserId = "insider".into();

        assert!(can_view(&s, &outsider, &[]));
        assert!(!can_join(&s, &outsider, &[GroupId::new()]));
        assert!(can_join(&s, &insider, &[s.group_id]));
    }

    #[test]
    fn targeted_only_for_target() {
        let s = base_session(Visibility::Targeted {
            target: "invitee".into(),
        });
        assert!(can_view(&s, &"invitee".into(), &[]));
        assert!(can_join(&s, &"invitee".into(), &[]));
        assert!(!can_view(&s, &"someone-else".into(), &[]));
        assert!(!can_join(&s, &"someone-else".into(), &[s.group_id]));
    }

    #[test]
    fn participants_view_but_cannot_rejoin() {
        let s = base_session(Visibility::Targeted {
            target: "invitee".into(),
        });
        assert!(can_view(&s, &"orga".into(), &[]));
        assert!(!can_join(&s, &"orga".into(), &[]));
    }

    #[test]
    fn complete_session_hidden_from_non_participants() {
        let mut s = base_session(Visibility::Community);
        s.capacity = 1;
        assert!(s.is_full());
        assert!(!can_view(&s, &"stranger".into(), &[]));
        assert!(!can_join(&s, &"stranger".into(), &[]));
        // The organizer still sees their own complete session.
        assert!(can_view(&s, &"orga".into(), &[]));
    }
}
