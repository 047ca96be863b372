//! Recovery Crawler: no-op behavior on a clean intent set, and the
//! `retry_failed` escape hatch (spec §4.6, §8).

mod common;

use filekeep_engine::db::Database;
use filekeep_engine::error::EngineError;
use filekeep_engine::recovery::RecoveryCrawler;
use filekeep_engine::remote::fake::FakeRemoteStore;
use filekeep_engine::transitions::TransitionLayer;
use std::sync::Arc;

#[tokio::test]
async fn recovery_is_a_noop_when_no_intents_are_pending() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();
    common::insert_untracked(db.conn(), "a.txt").await;
    common::insert_indexed(db.conn(), "b.txt", "raw-1", "raw-1:doc-1", 0).await;

    let remote = Arc::new(FakeRemoteStore::new());
    let crawler = RecoveryCrawler::new(db.conn().clone(), remote);
    let report = crawler.run().await.unwrap();

    assert!(report.resumed.is_empty());
    assert!(report.occ_conflicts.is_empty());
    assert!(report.skipped_unknown_intent.is_empty());
}

#[tokio::test]
async fn retry_failed_requeues_every_failed_row_to_untracked() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();
    common::insert_untracked(db.conn(), "a.txt").await;

    let transitions = TransitionLayer::new(db.conn().clone());
    transitions.start_upload("a.txt", 0).await.unwrap();
    transitions.fail_upload("a.txt", 1, "credentials expired").await.unwrap();

    let remote = Arc::new(FakeRemoteStore::new());
    let crawler = RecoveryCrawler::new(db.conn().clone(), remote);
    let report = crawler.retry_failed().await.unwrap();

    assert_eq!(report.requeued, vec!["a.txt".to_string()]);
    let row = transitions.current("a.txt").await.unwrap().unwrap();
    assert_eq!(row.fsm_state, "UNTRACKED");
    assert!(row.failure_reason.is_none());
}

#[tokio::test]
async fn unrecognized_intent_kind_is_skipped_not_panicked_on() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();

    // Hand-construct a row with an intent kind this build doesn't recognize,
    // simulating a downgrade after a future version introduced a new kind.
    use chrono::Utc;
    use filekeep_engine::db::entities;
    use sea_orm::{ActiveModelTrait, Set};
    let row = entities::ActiveModel {
        file_path: Set("weird.txt".to_string()),
        content_hash: Set(None),
        fsm_state: Set("INDEXED".to_string()),
        version: Set(0),
        remote_raw_id: Set(Some("raw-9".to_string())),
        remote_store_doc_id: Set(Some("raw-9:doc-9".to_string())),
        intent_kind: Set(Some("FUTURE_INTENT_KIND".to_string())),
        intent_started_at: Set(Some(Utc::now())),
        intent_steps_done: Set(Some(0)),
        failure_reason: Set(None),
        fsm_updated_at: Set(Utc::now()),
        ai_metadata: Set(None),
    };
    row.insert(db.conn()).await.unwrap();

    let remote = Arc::new(FakeRemoteStore::new());
    let crawler = RecoveryCrawler::new(db.conn().clone(), remote);
    let report = crawler.run().await.unwrap();

    assert_eq!(report.skipped_unknown_intent, vec!["weird.txt".to_string()]);
    assert!(report.resumed.is_empty());
}

/// Guards against accidentally swallowing other recovery errors as OCC
/// conflicts: `EngineError::OCCConflict` is the only variant recovery
/// folds into `occ_conflicts` rather than propagating or logging-and-continuing.
#[test]
fn occ_conflict_is_the_only_variant_with_dedicated_handling() {
    let err = EngineError::OCCConflict { file_path: "a.txt".to_string() };
    assert!(err.is_occ_conflict());
}
