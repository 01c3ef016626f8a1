//! End-to-end artifact commit: delta application, optimistic locking,
//! audit trail, engagement wiring.

use memogarden_core::errors::MemoGardenError;
use memogarden_core::hash_chain::compute_content_hash;
use memogarden_core::ids;
use memogarden_coordinator::TransactionCoordinator;
use memogarden_registry::Registry;
use memogarden_soil::Soil;

fn setup(dir: &tempfile::TempDir, content: &str) -> (TransactionCoordinator, String, String) {
    let coordinator =
        TransactionCoordinator::new(dir.path().join("soil.db"), dir.path().join("core.db"));
    let artifact_uuid = coordinator
        .cross_database_transaction(|_, core_session| {
            core_session.entities().create(
                "Artifact",
                None,
                None,
                Some(serde_json::json!({"content": content, "deltas": []})),
            )
        })
        .unwrap();
    let h0 = compute_content_hash(content);
    (coordinator, artifact_uuid, h0)
}

#[test]
fn commit_applies_ops_and_records_the_delta() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, artifact_uuid, h0) = setup(&dir, "a\nb\nc");

    let commit = coordinator
        .commit_delta(&artifact_uuid, "+2:^xyz\n-3", &[], &h0, None)
        .unwrap();

    assert_eq!(commit.new_content, "a\n[^xyz]\nb");
    assert_eq!(commit.line_count, 3);
    assert_eq!(commit.previous_hash, h0);
    assert_eq!(commit.new_hash, compute_content_hash("a\n[^xyz]\nb"));
    assert_eq!(commit.artifact_uuid, ids::tag_core(&artifact_uuid));
    assert!(commit.delta_uuid.starts_with("soil_"));

    // The delta fact exists in Soil with the hash pair.
    let mut soil = Soil::open(coordinator.soil_db_path()).unwrap();
    let session = soil.session().unwrap();
    let fact = session.get_fact(&commit.delta_uuid).unwrap().unwrap();
    assert_eq!(fact.fact_type, "ArtifactDelta");
    assert_eq!(fact.data["based_on_hash"], h0);
    assert_eq!(fact.data["result_hash"], commit.new_hash);
    drop(session);

    // The registry carries the new content and the delta reference.
    let mut registry = Registry::open(coordinator.core_db_path()).unwrap();
    let reg_session = registry.session().unwrap();
    let (_, data) = reg_session.artifacts().load(&artifact_uuid).unwrap();
    assert_eq!(data.content, "a\n[^xyz]\nb");
    assert_eq!(data.deltas, vec![ids::strip_prefix(&commit.delta_uuid)]);
    assert_eq!(
        reg_session.artifacts().current_hash(&artifact_uuid).unwrap(),
        commit.new_hash
    );
}

#[test]
fn stale_base_hash_is_a_conflict_and_writes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, artifact_uuid, h0) = setup(&dir, "a\nb\nc");

    coordinator
        .commit_delta(&artifact_uuid, "+2:^xyz\n-3", &[], &h0, None)
        .unwrap();

    // A second writer still holding h0 must be refused.
    let err = coordinator
        .commit_delta(&artifact_uuid, "+1:^abc", &[], &h0, None)
        .unwrap_err();
    match err {
        MemoGardenError::Conflict {
            artifact_uuid: uuid,
            expected_hash,
            actual_hash,
        } => {
            assert_eq!(uuid, artifact_uuid);
            assert_eq!(expected_hash, h0);
            assert_ne!(actual_hash, h0);
        }
        other => panic!("expected conflict, got {other:?}"),
    }

    // Exactly one delta fact, exactly one recorded delta.
    let mut soil = Soil::open(coordinator.soil_db_path()).unwrap();
    let session = soil.session().unwrap();
    assert_eq!(session.count_facts(Some("ArtifactDelta")).unwrap(), 1);
    drop(session);

    let mut registry = Registry::open(coordinator.core_db_path()).unwrap();
    let reg_session = registry.session().unwrap();
    let (_, data) = reg_session.artifacts().load(&artifact_uuid).unwrap();
    assert_eq!(data.deltas.len(), 1);
}

#[test]
fn invalid_ops_reject_before_any_write() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, artifact_uuid, h0) = setup(&dir, "a\nb\nc");

    let err = coordinator
        .commit_delta(&artifact_uuid, "+2:^xyz\nnonsense", &[], &h0, None)
        .unwrap_err();
    assert!(matches!(err, MemoGardenError::Validation { .. }));

    let mut soil = Soil::open(coordinator.soil_db_path()).unwrap();
    let session = soil.session().unwrap();
    assert_eq!(session.count_facts(Some("ArtifactDelta")).unwrap(), 0);
}

#[test]
fn non_artifact_target_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, _, h0) = setup(&dir, "a");
    let scope_uuid = coordinator
        .cross_database_transaction(|_, core_session| {
            core_session.entities().create("Scope", None, None, None)
        })
        .unwrap();

    let err = coordinator
        .commit_delta(&scope_uuid, "+1:^abc", &[], &h0, None)
        .unwrap_err();
    assert!(matches!(err, MemoGardenError::Validation { .. }));
}

#[test]
fn source_message_wires_a_triggers_relation_to_the_delta() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, artifact_uuid, h0) = setup(&dir, "a\nb\nc");

    let commit = coordinator
        .commit_delta(
            &artifact_uuid,
            "~2:^aaa→^bbb",
            &[String::from("^bbb")],
            &h0,
            Some("soil_message-1"),
        )
        .unwrap();

    let mut registry = Registry::open(coordinator.core_db_path()).unwrap();
    let session = registry.session().unwrap();
    let outbound = session.engagement().list_outbound("message-1", true).unwrap();
    assert_eq!(outbound.len(), 1);
    assert_eq!(outbound[0].kind, "triggers");
    assert_eq!(outbound[0].target, ids::strip_prefix(&commit.delta_uuid));
    assert!(session.engagement().is_alive(&outbound[0].uuid).unwrap());
}

#[test]
fn successive_commits_chain_through_content_hashes() {
    let dir = tempfile::tempdir().unwrap();
    let (coordinator, artifact_uuid, h0) = setup(&dir, "one\ntwo");

    let first = coordinator
        .commit_delta(&artifact_uuid, "+3:^abc", &[], &h0, None)
        .unwrap();
    let second = coordinator
        .commit_delta(&artifact_uuid, "-1", &[], &first.new_hash, None)
        .unwrap();

    assert_eq!(first.previous_hash, h0);
    assert_eq!(second.previous_hash, first.new_hash);
    assert_eq!(second.new_content, "two\n[^abc]");

    let mut registry = Registry::open(coordinator.core_db_path()).unwrap();
    let session = registry.session().unwrap();
    let deltas = session.artifacts().list_deltas(&artifact_uuid, 10).unwrap();
    assert_eq!(deltas.len(), 2);
    assert_eq!(deltas[0], ids::strip_prefix(&second.delta_uuid));
}
