//! Integration tests: fact lifecycle, email de-duplication, relation
//! idempotency, schema bootstrap.

use memogarden_core::errors::MemoGardenError;
use memogarden_core::models::{
    EndpointType, Evidence, EvidenceSource, Fact, RelationKind, SystemRelation,
};
use memogarden_soil::Soil;

fn email_fact(message_id: &str) -> Fact {
    Fact::new(
        "Email",
        serde_json::json!({
            "rfc_message_id": message_id,
            "from": "a@example.com",
            "subject": "hello",
        }),
    )
}

#[test]
fn create_and_get_fact_round_trip() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    let fact = Fact::new("Note", serde_json::json!({"content": "water the garden"}));
    let uuid = session.create_fact(&fact).unwrap();
    assert_eq!(uuid.len(), 36);

    let stored = session.get_fact(&uuid).unwrap().expect("fact should exist");
    assert_eq!(stored.fact_type, "Note");
    assert_eq!(stored.data["content"], "water the garden");
    assert_eq!(
        stored.integrity_hash.as_deref(),
        Some(fact.compute_integrity_hash().as_str())
    );
}

#[test]
fn get_fact_accepts_tagged_uuid() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    let uuid = session
        .create_fact(&Fact::new("Note", serde_json::json!({"content": "x"})))
        .unwrap();
    let tagged = format!("soil_{uuid}");
    assert!(session.get_fact(&tagged).unwrap().is_some());
}

#[test]
fn integrity_hash_preserved_when_supplied() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    let mut fact = Fact::new("Note", serde_json::json!({"content": "x"}));
    fact.integrity_hash = Some("f".repeat(64));
    let uuid = session.create_fact(&fact).unwrap();

    let stored = session.get_fact(&uuid).unwrap().unwrap();
    assert_eq!(stored.integrity_hash.as_deref(), Some("f".repeat(64).as_str()));
}

#[test]
fn mark_superseded_is_idempotent_for_equal_values_only() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    let original = session
        .create_fact(&Fact::new("Note", serde_json::json!({"v": 1})))
        .unwrap();
    let replacement = session
        .create_fact(&Fact::new("Note", serde_json::json!({"v": 2})))
        .unwrap();
    let other = session
        .create_fact(&Fact::new("Note", serde_json::json!({"v": 3})))
        .unwrap();

    let at = "2026-01-30T10:00:00.000000Z";
    session.mark_superseded(&original, &replacement, at).unwrap();
    // Same values again: fine.
    session.mark_superseded(&original, &replacement, at).unwrap();
    // Diverging re-supersession: refused.
    let err = session.mark_superseded(&original, &other, at).unwrap_err();
    assert!(matches!(err, MemoGardenError::Validation { .. }));

    let stored = session.get_fact(&original).unwrap().unwrap();
    assert_eq!(stored.superseded_by.as_deref(), Some(replacement.as_str()));
    assert_eq!(stored.superseded_at.as_deref(), Some(at));
}

#[test]
fn mark_superseded_missing_fact_is_not_found() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();
    let err = session
        .mark_superseded("no-such-fact", "other", "2026-01-30T10:00:00Z")
        .unwrap_err();
    assert!(matches!(err, MemoGardenError::NotFound { .. }));
}

#[test]
fn email_lookup_returns_first_of_duplicates() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    let mut first = email_fact("<m@x>");
    first.realized_at = "2026-01-30T10:00:00.000000Z".to_string();
    let mut second = email_fact("<m@x>");
    second.realized_at = "2026-01-30T11:00:00.000000Z".to_string();

    let first_uuid = session.create_fact(&first).unwrap();
    session.create_fact(&second).unwrap();

    let found = session
        .find_fact_by_rfc_message_id("<m@x>")
        .unwrap()
        .expect("email should be found");
    assert_eq!(found.uuid, first_uuid);
    assert_eq!(session.count_facts(Some("Email")).unwrap(), 2);
    assert!(session.find_fact_by_rfc_message_id("<absent@x>").unwrap().is_none());
}

#[test]
fn list_facts_newest_first_with_type_filter() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    for (i, t) in [(1, "Note"), (2, "Note"), (3, "Message")] {
        let mut fact = Fact::new(t, serde_json::json!({"n": i}));
        fact.realized_at = format!("2026-01-30T0{i}:00:00.000000Z");
        session.create_fact(&fact).unwrap();
    }

    let notes = session.list_facts(Some("Note"), 100).unwrap();
    assert_eq!(notes.len(), 2);
    assert_eq!(notes[0].data["n"], 2);
    assert_eq!(notes[1].data["n"], 1);

    let all = session.list_facts(None, 2).unwrap();
    assert_eq!(all.len(), 2);
    assert_eq!(all[0].data["n"], 3);
}

#[test]
fn relation_insert_is_idempotent_per_key() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    let relation = SystemRelation::new(
        RelationKind::Cites,
        "src-1",
        EndpointType::Item,
        "tgt-1",
        EndpointType::Entity,
    );
    let first = session.create_relation(&relation).unwrap();

    let duplicate = SystemRelation::new(
        RelationKind::Cites,
        "src-1",
        EndpointType::Item,
        "tgt-1",
        EndpointType::Entity,
    );
    let second = session.create_relation(&duplicate).unwrap();

    assert_eq!(first, second);
    assert_eq!(session.count_relations(Some(RelationKind::Cites)).unwrap(), 1);
}

#[test]
fn replies_to_requires_an_existing_parent() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    let parent = session
        .create_fact(&email_fact("<parent@x>"))
        .unwrap();
    let reply = session.create_fact(&email_fact("<reply@x>")).unwrap();

    let evidence = Evidence::stated(EvidenceSource::SystemInferred);
    let uuid = session
        .create_replies_to(&reply, &parent, Some(evidence.clone()))
        .unwrap()
        .expect("relation should be created");

    // Re-inserting the same edge returns the existing UUID.
    let again = session
        .create_replies_to(&reply, &parent, Some(evidence))
        .unwrap()
        .unwrap();
    assert_eq!(uuid, again);

    assert!(session
        .create_replies_to(&reply, "missing-parent", None)
        .unwrap()
        .is_none());
}

#[test]
fn get_relations_filters_by_source_and_kind() {
    let mut soil = Soil::open_in_memory().unwrap();
    let session = soil.session().unwrap();

    for (kind, source) in [
        (RelationKind::Cites, "a"),
        (RelationKind::Triggers, "a"),
        (RelationKind::Cites, "b"),
    ] {
        let relation =
            SystemRelation::new(kind, source, EndpointType::Item, "t", EndpointType::Item);
        session.create_relation(&relation).unwrap();
    }

    assert_eq!(session.get_relations(Some("a"), None).unwrap().len(), 2);
    assert_eq!(
        session
            .get_relations(Some("a"), Some(RelationKind::Cites))
            .unwrap()
            .len(),
        1
    );
    assert_eq!(session.get_relations(None, None).unwrap().len(), 3);
}

#[test]
fn session_rollback_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("soil.db");

    let mut soil = Soil::open(&path).unwrap();
    {
        let session = soil.session().unwrap();
        session
            .create_fact(&Fact::new("Note", serde_json::json!({"content": "lost"})))
            .unwrap();
        // Dropped without commit.
    }
    let session = soil.session().unwrap();
    assert_eq!(session.count_facts(None).unwrap(), 0);
}

#[test]
fn committed_facts_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("soil.db");

    {
        let mut soil = Soil::open(&path).unwrap();
        let session = soil.session().unwrap();
        session
            .create_fact(&Fact::new("Note", serde_json::json!({"content": "kept"})))
            .unwrap();
        session.commit().unwrap();
    }

    let mut soil = Soil::open(&path).unwrap();
    assert_eq!(soil.schema_version().unwrap().as_deref(), Some("20260130"));
    let session = soil.session().unwrap();
    assert_eq!(session.count_facts(None).unwrap(), 1);
}
