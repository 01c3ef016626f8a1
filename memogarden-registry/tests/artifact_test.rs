//! Integration tests: artifact queries and commit recording.

use memogarden_core::errors::MemoGardenError;
use memogarden_core::hash_chain::compute_content_hash;
use memogarden_registry::delta::ChangeType;
use memogarden_registry::Registry;

fn make_artifact(session: &memogarden_registry::RegistrySession<'_>, content: &str) -> String {
    session
        .entities()
        .create(
            "Artifact",
            None,
            None,
            Some(serde_json::json!({"content": content, "deltas": []})),
        )
        .unwrap()
}

#[test]
fn current_hash_is_the_content_hash() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_artifact(&session, "a\nb\nc");

    let hash = session.artifacts().current_hash(&uuid).unwrap();
    assert_eq!(hash, compute_content_hash("a\nb\nc"));
    assert_eq!(hash.len(), 8);
}

#[test]
fn non_artifact_entities_are_rejected() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = session.entities().create("Scope", None, None, None).unwrap();

    let err = session.artifacts().current_hash(&uuid).unwrap_err();
    assert!(matches!(err, MemoGardenError::Validation { .. }));
}

#[test]
fn get_at_commit_serves_the_current_state() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_artifact(&session, "a\nb\nc");
    let hash = session.artifacts().current_hash(&uuid).unwrap();

    let state = session.artifacts().get_at_commit(&uuid, &hash).unwrap();
    assert_eq!(state.content, "a\nb\nc");
    assert_eq!(state.line_count, 3);
    assert_eq!(state.at_commit, hash);
    assert_eq!(state.artifact_uuid, format!("core_{uuid}"));
    assert!(state.note.is_none());
}

#[test]
fn historical_commits_signal_not_implemented() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_artifact(&session, "a\nb\nc");

    let err = session
        .artifacts()
        .get_at_commit(&uuid, "00000000")
        .unwrap_err();
    assert!(matches!(err, MemoGardenError::NotImplemented { .. }));
}

#[test]
fn diff_of_a_commit_with_itself_is_all_unchanged() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_artifact(&session, "a\nb\nc");
    let hash = session.artifacts().current_hash(&uuid).unwrap();

    let diff = session.artifacts().diff_commits(&uuid, &hash, &hash).unwrap();
    assert_eq!(diff.changes.len(), 3);
    assert!(diff
        .changes
        .iter()
        .all(|c| c.change == ChangeType::Unchanged));
}

#[test]
fn record_commit_appends_delta_and_advances_the_entity_chain() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_artifact(&session, "a\nb\nc");

    let before = session.entities().get(&uuid).unwrap();
    session
        .artifacts()
        .record_commit(&uuid, "soil_delta-1", "a\n[^xyz]\nb")
        .unwrap();

    let after = session.entities().get(&uuid).unwrap();
    assert_eq!(after.version, before.version + 1);
    assert_eq!(after.data["content"], "a\n[^xyz]\nb");
    assert_eq!(after.data["deltas"], serde_json::json!(["delta-1"]));
}

#[test]
fn list_deltas_returns_newest_first_with_limit() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_artifact(&session, "x");

    for i in 0..4 {
        session
            .artifacts()
            .record_commit(&uuid, &format!("delta-{i}"), "x")
            .unwrap();
    }

    let deltas = session.artifacts().list_deltas(&uuid, 2).unwrap();
    assert_eq!(deltas, vec!["delta-3", "delta-2"]);
}
