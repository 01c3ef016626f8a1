//! Integration tests: cross-database atomicity, commit ordering under
//! injected failure, startup audit, status reporting.

use memogarden_core::errors::MemoGardenError;
use memogarden_core::models::{Fact, SystemStatus};
use memogarden_coordinator::TransactionCoordinator;
use memogarden_registry::Registry;
use memogarden_soil::Soil;

fn coordinator(dir: &tempfile::TempDir) -> TransactionCoordinator {
    TransactionCoordinator::new(dir.path().join("soil.db"), dir.path().join("core.db"))
}

fn soil_fact_count(coordinator: &TransactionCoordinator) -> usize {
    let mut soil = Soil::open(coordinator.soil_db_path()).unwrap();
    let session = soil.session().unwrap();
    session.count_facts(None).unwrap()
}

fn entity_count(coordinator: &TransactionCoordinator) -> usize {
    let mut registry = Registry::open(coordinator.core_db_path()).unwrap();
    let session = registry.session().unwrap();
    let (_, total) = session.entities().query_with_filters(None, true, 1, 0).unwrap();
    total
}

#[test]
fn fresh_databases_are_consistent() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir);
    assert_eq!(coordinator.check_consistency().unwrap(), SystemStatus::Normal);
    assert!(coordinator.find_orphaned_deltas().unwrap().is_empty());
    assert!(coordinator.find_broken_hash_chains().unwrap().is_empty());
}

#[test]
fn successful_transaction_commits_both_sides() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir);

    let entity_uuid = coordinator
        .cross_database_transaction(|soil_session, core_session| {
            soil_session.create_fact(&Fact::new("Note", serde_json::json!({"content": "x"})))?;
            core_session.entities().create("Scope", None, None, None)
        })
        .unwrap();

    assert_eq!(soil_fact_count(&coordinator), 1);
    assert_eq!(entity_count(&coordinator), 1);
    assert!(!entity_uuid.is_empty());
    assert_eq!(coordinator.check_consistency().unwrap(), SystemStatus::Normal);
}

#[test]
fn closure_error_rolls_both_sides_back() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir);

    let err = coordinator
        .cross_database_transaction(|soil_session, core_session| {
            soil_session.create_fact(&Fact::new("Note", serde_json::json!({"content": "x"})))?;
            core_session.entities().create("Scope", None, None, None)?;
            Err::<(), _>(MemoGardenError::validation("caller aborted"))
        })
        .unwrap_err();
    assert!(matches!(err, MemoGardenError::Validation { .. }));

    // Neither write is visible.
    assert_eq!(soil_fact_count(&coordinator), 0);
    assert_eq!(entity_count(&coordinator), 0);
}

#[test]
fn update_entity_writes_the_audit_delta_with_the_state() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir);

    let entity_uuid = coordinator
        .cross_database_transaction(|_, core_session| {
            core_session.entities().create(
                "Transaction",
                None,
                None,
                Some(serde_json::json!({"amount": 100})),
            )
        })
        .unwrap();

    let hash = {
        let mut registry = Registry::open(coordinator.core_db_path()).unwrap();
        let session = registry.session().unwrap();
        session.entities().current_hash(&entity_uuid).unwrap()
    };

    let new_hash = coordinator
        .update_entity(&entity_uuid, serde_json::json!({"amount": 120}), &hash)
        .unwrap();
    assert_ne!(new_hash, hash);

    // The delta fact landed in Soil and references an existing entity.
    let mut soil = Soil::open(coordinator.soil_db_path()).unwrap();
    let session = soil.session().unwrap();
    let deltas = session.list_active_facts_of_type("EntityDelta").unwrap();
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].data["result_hash"], new_hash);
    drop(session);

    assert_eq!(coordinator.check_consistency().unwrap(), SystemStatus::Normal);

    // A stale hash is refused.
    let err = coordinator
        .update_entity(&entity_uuid, serde_json::json!({"amount": 130}), &hash)
        .unwrap_err();
    assert!(matches!(err, MemoGardenError::OptimisticLock { .. }));
}

#[test]
fn core_failure_after_soil_commit_is_the_only_reachable_anomaly() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir);

    let entity_uuid = coordinator
        .cross_database_transaction(|_, core_session| {
            core_session.entities().create(
                "Transaction",
                None,
                None,
                Some(serde_json::json!({"amount": 100})),
            )
        })
        .unwrap();
    let hash = {
        let mut registry = Registry::open(coordinator.core_db_path()).unwrap();
        let session = registry.session().unwrap();
        session.entities().current_hash(&entity_uuid).unwrap()
    };

    // An EntityDelta referencing an entity that will never materialise:
    // inject the failure between the two commit points.
    coordinator.induce_core_commit_failure();
    let missing_entity = "0f0e0d0c-0b0a-0908-0706-050403020100";
    let err = coordinator
        .cross_database_transaction(|soil_session, core_session| {
            soil_session.create_fact(&Fact::new(
                "EntityDelta",
                serde_json::json!({
                    "entity_id": missing_entity,
                    "based_on_hash": hash,
                    "result_hash": "ffffffff",
                }),
            ))?;
            core_session.entities().create("Scope", None, None, None)
        })
        .unwrap_err();

    match err {
        MemoGardenError::Consistency {
            soil_committed,
            core_error,
            ..
        } => {
            assert!(soil_committed);
            assert!(core_error.is_some());
        }
        other => panic!("expected consistency error, got {other:?}"),
    }

    // Soil committed, the registry rolled back.
    assert_eq!(soil_fact_count(&coordinator), 1);
    assert_eq!(entity_count(&coordinator), 1);

    // The audit detects the stranded delta.
    assert_eq!(
        coordinator.check_consistency().unwrap(),
        SystemStatus::Inconsistent
    );
    let orphans = coordinator.find_orphaned_deltas().unwrap();
    assert_eq!(orphans.len(), 1);
    assert_eq!(orphans[0].entity_id, missing_entity);
}

#[test]
fn tampered_hash_forces_safe_mode() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir);

    coordinator
        .cross_database_transaction(|_, core_session| {
            core_session.entities().create("Scope", None, None, None)
        })
        .unwrap();

    // Corrupt the stored chain head behind the kernel's back.
    let conn = rusqlite::Connection::open(coordinator.core_db_path()).unwrap();
    conn.execute("UPDATE entity SET hash = 'deadbeef'", []).unwrap();
    drop(conn);

    assert_eq!(coordinator.check_consistency().unwrap(), SystemStatus::SafeMode);
    assert_eq!(coordinator.find_broken_hash_chains().unwrap().len(), 1);
}

#[test]
fn read_only_gate_wins_over_the_audit() {
    let dir = tempfile::tempdir().unwrap();
    let coordinator = coordinator(&dir);

    assert_eq!(coordinator.system_status().unwrap(), SystemStatus::Normal);
    coordinator.set_read_only(true);
    assert_eq!(coordinator.system_status().unwrap(), SystemStatus::ReadOnly);
    coordinator.set_read_only(false);
    assert_eq!(coordinator.system_status().unwrap(), SystemStatus::Normal);
}
