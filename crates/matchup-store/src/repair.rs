//! Normalization of persisted session records.
//!
//! Historical records written by earlier releases lack newer fields and use
//! the original French field names (`organisateurPseudo`, `demandes`,
//! `ouverteCommunaute`, `joueurInvite`). Malformed records are never raised
//! as errors: every missing field is defaulted here, and only records that
//! cannot be addressed at all (no id, no organizer) are skipped.
//!
//! All legacy-shape tolerance in the codebase lives in this one function.

use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use matchup_shared::{
    GroupId, Participant, PendingRequest, Session, SessionFormat, SessionId, UserId, Visibility,
};

/// Repair a raw persisted record into a valid [`Session`].
///
/// Current-format records deserialize directly. Anything else goes through
/// field-by-field defaulting. Returns `None` for records with no usable id
/// or organizer; callers skip those with a warning.
pub fn repair(value: &Value) -> Option<Session> {
    // Fast path: a record in the current shape round-trips untouched.
    if let Ok(session) = serde_json::from_value::<Session>(value.clone()) {
        return Some(session);
    }

    let obj = value.as_object()?;

    let id = obj
        .get("id")
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(SessionId)?;

    let participants = repair_participants(value)?;

    let group_id = obj
        .get("group_id")
        .or_else(|| obj.get("groupeId"))
        .and_then(Value::as_str)
        .and_then(|s| Uuid::parse_str(s).ok())
        .map(GroupId)
        .unwrap_or(GroupId(Uuid::nil()));

    let group_name = string_field(obj, &["group_name", "nomGroupe"]).unwrap_or_default();
    let zone = string_field(obj, &["zone"]).unwrap_or_default();
    let venue = string_field(obj, &["venue", "terrain"]);

    let created_at = date_field(obj, &["created_at", "creeLe"]).unwrap_or(DateTime::UNIX_EPOCH);
    let scheduled_at = date_field(obj, &["scheduled_at", "date"]).unwrap_or(created_at);

    let capacity = obj
        .get("capacity")
        .or_else(|| obj.get("nbJoueurs"))
        .and_then(Value::as_u64)
        .map(|n| n as u32)
        .filter(|n| *n > 0)
        .unwrap_or(2)
        .max(participants.len() as u32);

    Some(Session {
        id,
        group_id,
        group_name,
        zone,
        scheduled_at,
        format: repair_format(obj),
        capacity,
        venue,
        participants,
        visibility: repair_visibility(obj),
        requests: repair_requests(obj),
        created_at,
    })
}

fn string_field(obj: &serde_json::Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .find_map(|n| obj.get(*n))
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn date_field(obj: &serde_json::Map<String, Value>, names: &[&str]) -> Option<DateTime<Utc>> {
    names
        .iter()
        .find_map(|n| obj.get(*n))
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn repair_format(obj: &serde_json::Map<String, Value>) -> SessionFormat {
    match obj.get("format").and_then(Value::as_str) {
        Some("single") | Some("simple") => SessionFormat::Single,
        Some("squad") | Some("equipe") => SessionFormat::Squad,
        _ => SessionFormat::Double,
    }
}

/// An absent participants list is synthesized from the legacy organizer
/// pseudo field. A record with neither is unusable.
fn repair_participants(value: &Value) -> Option<Vec<Participant>> {
    let obj = value.as_object()?;

    if let Some(raw) = obj.get("participants") {
        if let Ok(participants) = serde_json::from_value::<Vec<Participant>>(raw.clone()) {
            if !participants.is_empty() {
                return Some(participants);
            }
        }
    }

    let organizer = string_field(obj, &["organisateurPseudo"])?;
    Some(vec![Participant::organizer(UserId::new(organizer))])
}

fn repair_requests(obj: &serde_json::Map<String, Value>) -> Vec<PendingRequest> {
    if let Some(raw) = obj.get("requests") {
        if let Ok(requests) = serde_json::from_value::<Vec<PendingRequest>>(raw.clone()) {
            return requests;
        }
    }

    // Legacy shape: [{"pseudo": "...", "date": "..."}]
    let Some(raw) = obj.get("demandes").and_then(Value::as_array) else {
        return Vec::new();
    };

    raw.iter()
        .filter_map(|entry| {
            let pseudo = entry.get("pseudo").and_then(Value::as_str)?;
            let requested_at = entry
                .get("date")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or(DateTime::UNIX_EPOCH);
            Some(PendingRequest {
                user: UserId::new(pseudo),
                requested_at,
            })
        })
        .collect()
}

fn repair_visibility(obj: &serde_json::Map<String, Value>) -> Visibility {
    if let Some(raw) = obj.get("visibility") {
        if let Ok(visibility) = serde_json::from_value::<Visibility>(raw.clone()) {
            return visibility;
        }
    }

    if let Some(target) = string_field(obj, &["joueurInvite"]) {
        return Visibility::Targeted {
            target: UserId::new(target),
        };
    }

    match obj.get("ouverteCommunaute").and_then(Value::as_bool) {
        Some(true) => Visibility::Community,
        _ => Visibility::Group,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_session() -> Session {
        Session {
            id: SessionId::new(),
            group_id: GroupId::new(),
            group_name: "Padel Lyon 7".to_string(),
            zone: "Lyon".to_string(),
            scheduled_at: Utc.with_ymd_and_hms(2024, 6, 1, 18, 30, 0).unwrap(),
            format: SessionFormat::Double,
            capacity: 4,
            venue: Some("Terrain 2".to_string()),
            participants: vec![
                Participant::organizer("alice".into()),
                Participant::player("bob".into()),
            ],
            visibility: Visibility::Community,
            requests: vec![PendingRequest {
                user: "carol".into(),
                requested_at: Utc.with_ymd_and_hms(2024, 5, 20, 9, 0, 0).unwrap(),
            }],
            created_at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn current_format_round_trips() {
        let session = sample_session();
        let value = serde_json::to_value(&session).unwrap();
        let repaired = repair(&value).expect("should repair");
        assert_eq!(repaired, session);
    }

    #[test]
    fn targeted_session_round_trips() {
        let mut session = sample_session();
        session.visibility = Visibility::Targeted {
            target: "dave".into(),
        };
        let value = serde_json::to_value(&session).unwrap();
        assert_eq!(repair(&value).unwrap(), session);
    }

    #[test]
    fn legacy_record_is_defaulted() {
        let id = Uuid::new_v4();
        let value = json!({
            "id": id.to_string(),
            "nomGroupe": "Les Volants",
            "zone": "Villeurbanne",
            "date": "2023-11-12T10:00:00+00:00",
            "nbJoueurs": 4,
            "organisateurPseudo": "marcel",
            "ouverteCommunaute": true,
            "demandes": [
                { "pseudo": "jeanne", "date": "2023-11-10T08:00:00+00:00" }
            ],
        });

        let session = repair(&value).expect("legacy record should repair");
        assert_eq!(session.id, SessionId(id));
        assert_eq!(session.group_name, "Les Volants");
        assert_eq!(session.capacity, 4);
        assert_eq!(session.visibility, Visibility::Community);
        assert_eq!(session.participants.len(), 1);
        assert!(session.is_organizer(&"marcel".into()));
        assert_eq!(session.requests.len(), 1);
        assert_eq!(session.requests[0].user, "jeanne".into());
    }

    #[test]
    fn legacy_without_community_flag_is_group_scoped() {
        let value = json!({
            "id": Uuid::new_v4().to_string(),
            "organisateurPseudo": "marcel",
        });
        let session = repair(&value).unwrap();
        assert_eq!(session.visibility, Visibility::Group);
        // Defaults keep the record internally consistent.
        assert!(session.capacity as usize >= session.participants.len());
        assert!(session.requests.is_empty());
    }

    #[test]
    fn legacy_targeted_record() {
        let value = json!({
            "id": Uuid::new_v4().to_string(),
            "organisateurPseudo": "marcel",
            "joueurInvite": "paulette",
        });
        let session = repair(&value).unwrap();
        assert_eq!(
            session.visibility,
            Visibility::Targeted {
                target: "paulette".into()
            }
        );
    }

    #[test]
    fn unaddressable_records_are_skipped() {
        assert!(repair(&json!({ "nomGroupe": "sans id" })).is_none());
        assert!(repair(&json!({ "id": Uuid::new_v4().to_string() })).is_none());
        assert!(repair(&json!("not an object")).is_none());
    }
}
