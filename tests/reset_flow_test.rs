//! Spec §8 scenarios 2-3 and §4.3's crash-recovery table: the write-ahead
//! reset intent resumed from each documented `steps_done` checkpoint, plus
//! the ordinary (uninterrupted) reset-then-reupload path.

mod common;

use filekeep_engine::config::EngineConfig;
use filekeep_engine::db::Database;
use filekeep_engine::orchestrator::Orchestrator;
use filekeep_engine::recovery::RecoveryCrawler;
use filekeep_engine::remote::fake::FakeRemoteStore;
use filekeep_engine::remote::RemoteStore;
use filekeep_engine::transitions::TransitionLayer;
use std::sync::Arc;

/// Seed the fake remote with a raw file + store doc and return their ids, so
/// crash scenarios operate on identifiers the remote store actually knows
/// about.
async fn seed_remote_doc(remote: &FakeRemoteStore) -> (String, String) {
    let raw = remote.upload_raw("report.pdf", vec![1, 2, 3]).await.unwrap();
    let handle = remote.import_to_store(&raw.id).await.unwrap();
    let poll = remote.poll_operation(&handle).await.unwrap();
    let doc_id = poll.response.unwrap().store_doc_id.unwrap();
    (raw.id, doc_id)
}

#[tokio::test]
async fn reset_existing_deletes_remote_state_before_reupload() {
    let dir = tempfile::tempdir().unwrap();
    let file_path = dir.path().join("report.pdf");
    common::write_dummy_file(&file_path, 64);
    let file_path = file_path.to_str().unwrap().to_string();

    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();
    let remote = Arc::new(FakeRemoteStore::new());
    let (raw_id, doc_id) = seed_remote_doc(&remote).await;
    common::insert_indexed(db.conn(), &file_path, &raw_id, &doc_id, 0).await;

    let config = EngineConfig::default_with_dir(dir.path().to_path_buf());
    let orchestrator = Orchestrator::new(db.conn().clone(), remote.clone(), config);
    let report = orchestrator.run_batch(10, 5, 4, true).await.unwrap();

    assert_eq!(report.indexed.len(), 1);
    assert!(report.failed.is_empty());
    // The old doc is gone and exactly one new one exists from the reupload.
    assert_eq!(remote.store_doc_count(), 1);
    assert_eq!(remote.raw_file_count(), 1);

    let transitions = TransitionLayer::new(db.conn().clone());
    let row = transitions.current(&file_path).await.unwrap().unwrap();
    assert_eq!(row.fsm_state, "INDEXED");
    assert_ne!(row.remote_store_doc_id.as_deref(), Some(doc_id.as_str()));
}

#[tokio::test]
async fn crash_at_steps_done_zero_is_resumed_from_the_first_step() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();
    let remote = Arc::new(FakeRemoteStore::new());
    let (raw_id, doc_id) = seed_remote_doc(&remote).await;

    common::insert_indexed_with_intent(db.conn(), "a.pdf", &raw_id, &doc_id, 5, 0).await;

    let crawler = RecoveryCrawler::new(db.conn().clone(), remote.clone());
    let report = crawler.run().await.unwrap();

    assert_eq!(report.resumed, vec!["a.pdf".to_string()]);
    assert_eq!(remote.store_doc_count(), 0);
    assert_eq!(remote.raw_file_count(), 0);

    let transitions = TransitionLayer::new(db.conn().clone());
    let row = transitions.current("a.pdf").await.unwrap().unwrap();
    assert_eq!(row.fsm_state, "UNTRACKED");
    assert_eq!(row.version, 6);
    assert!(row.intent_kind.is_none());
}

#[tokio::test]
async fn crash_at_steps_done_one_resumes_from_delete_raw() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();
    let remote = Arc::new(FakeRemoteStore::new());
    let (raw_id, doc_id) = seed_remote_doc(&remote).await;

    // Step 1 (delete_store_doc) already committed remotely before the crash.
    remote.delete_store_doc(&doc_id).await.unwrap();
    common::insert_indexed_with_intent(db.conn(), "a.pdf", &raw_id, &doc_id, 2, 1).await;

    let crawler = RecoveryCrawler::new(db.conn().clone(), remote.clone());
    let report = crawler.run().await.unwrap();

    assert_eq!(report.resumed, vec!["a.pdf".to_string()]);
    assert!(report.occ_conflicts.is_empty());
    assert_eq!(remote.raw_file_count(), 0);

    let transitions = TransitionLayer::new(db.conn().clone());
    let row = transitions.current("a.pdf").await.unwrap().unwrap();
    assert_eq!(row.fsm_state, "UNTRACKED");
}

#[tokio::test]
async fn crash_at_steps_done_two_only_finalizes() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();
    let remote = Arc::new(FakeRemoteStore::new());
    let (raw_id, doc_id) = seed_remote_doc(&remote).await;

    // Both remote deletes already committed; only the DB finalize is left.
    remote.delete_store_doc(&doc_id).await.unwrap();
    remote.delete_raw(&raw_id).await.unwrap();
    common::insert_indexed_with_intent(db.conn(), "a.pdf", &raw_id, &doc_id, 7, 2).await;

    let crawler = RecoveryCrawler::new(db.conn().clone(), remote.clone());
    let report = crawler.run().await.unwrap();

    assert_eq!(report.resumed, vec!["a.pdf".to_string()]);
    let transitions = TransitionLayer::new(db.conn().clone());
    let row = transitions.current("a.pdf").await.unwrap().unwrap();
    assert_eq!(row.fsm_state, "UNTRACKED");
    assert_eq!(row.version, 8);
}

#[tokio::test]
async fn out_of_band_deletion_of_the_store_doc_is_tolerated_as_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();
    let remote = Arc::new(FakeRemoteStore::new());
    let (raw_id, doc_id) = seed_remote_doc(&remote).await;

    // Spec §8 scenario 2: an operator (or a prior crashed run) already
    // deleted the store document out of band before recovery runs.
    remote.simulate_out_of_band_store_doc_deletion(&doc_id);
    common::insert_indexed_with_intent(db.conn(), "a.pdf", &raw_id, &doc_id, 0, 0).await;

    let crawler = RecoveryCrawler::new(db.conn().clone(), remote.clone());
    let report = crawler.run().await.unwrap();

    assert_eq!(report.resumed, vec!["a.pdf".to_string()]);
    assert_eq!(remote.raw_file_count(), 0);
    let transitions = TransitionLayer::new(db.conn().clone());
    let row = transitions.current("a.pdf").await.unwrap().unwrap();
    assert_eq!(row.fsm_state, "UNTRACKED");
}
