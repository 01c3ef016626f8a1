//! Integration tests: the fold verb and continued appends.

use memogarden_core::errors::MemoGardenError;
use memogarden_core::models::SummaryAuthor;
use memogarden_registry::Registry;

fn make_log(session: &memogarden_registry::RegistrySession<'_>) -> String {
    session
        .entities()
        .create(
            "ConversationLog",
            None,
            None,
            Some(serde_json::json!({"items": [], "collapsed": false})),
        )
        .unwrap()
}

#[test]
fn fold_attaches_summary_and_collapses() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_log(&session);

    let result = session
        .conversations()
        .fold(&uuid, "done", SummaryAuthor::Operator, None)
        .unwrap();
    assert!(result.collapsed);
    assert_eq!(result.summary.content, "done");
    assert_eq!(result.summary.author, SummaryAuthor::Operator);

    let (_, data) = session.conversations().get(&uuid).unwrap();
    assert!(data.collapsed);
    assert_eq!(data.summary.unwrap().content, "done");
}

#[test]
fn fold_with_fragment_ids() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_log(&session);

    let result = session
        .conversations()
        .fold(
            &uuid,
            "agreed on the plan",
            SummaryAuthor::Agent,
            Some(vec!["^abc".to_string(), "^def".to_string()]),
        )
        .unwrap();
    assert_eq!(
        result.summary.fragment_ids,
        Some(vec!["^abc".to_string(), "^def".to_string()])
    );
}

#[test]
fn empty_summary_is_refused() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_log(&session);

    for summary in ["", "   ", "\n\t"] {
        let err = session
            .conversations()
            .fold(&uuid, summary, SummaryAuthor::System, None)
            .unwrap_err();
        assert!(matches!(err, MemoGardenError::Validation { .. }));
    }
}

#[test]
fn fold_of_a_missing_or_mistyped_log_fails() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();

    let err = session
        .conversations()
        .fold("missing", "s", SummaryAuthor::Operator, None)
        .unwrap_err();
    assert!(matches!(err, MemoGardenError::NotFound { .. }));

    let scope = session.entities().create("Scope", None, None, None).unwrap();
    let err = session
        .conversations()
        .fold(&scope, "s", SummaryAuthor::Operator, None)
        .unwrap_err();
    assert!(matches!(err, MemoGardenError::Validation { .. }));
}

#[test]
fn folded_logs_keep_accepting_items() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_log(&session);

    session
        .conversations()
        .fold(&uuid, "done", SummaryAuthor::Operator, None)
        .unwrap();
    session
        .conversations()
        .append_item(&uuid, "soil_fact-1")
        .unwrap();

    let (_, data) = session.conversations().get(&uuid).unwrap();
    assert!(data.collapsed);
    assert_eq!(data.items, vec!["fact-1"]);
    // The summary survives the append.
    assert_eq!(data.summary.unwrap().content, "done");
}

#[test]
fn fold_advances_the_entity_chain() {
    let mut registry = Registry::open_in_memory().unwrap();
    let session = registry.session().unwrap();
    let uuid = make_log(&session);

    let before = session.entities().get(&uuid).unwrap();
    session
        .conversations()
        .fold(&uuid, "checkpoint", SummaryAuthor::System, None)
        .unwrap();
    let after = session.entities().get(&uuid).unwrap();

    assert_eq!(after.version, before.version + 1);
    assert_eq!(after.previous_hash.as_deref(), Some(before.hash.as_str()));
}
