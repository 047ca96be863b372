//! Spec §8 scenario 1: happy path upload of a batch of files, then
//! verifier exits 0 with matching counts.

mod common;

use filekeep_engine::config::EngineConfig;
use filekeep_engine::db::Database;
use filekeep_engine::orchestrator::Orchestrator;
use filekeep_engine::remote::fake::FakeRemoteStore;
use filekeep_engine::verifier::Verifier;
use std::sync::Arc;

#[tokio::test]
async fn happy_path_upload_of_fifty_files() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("engine.sqlite3");
    let db = Database::open(&db_path).await.unwrap();

    for i in 0..50 {
        let file_path = dir.path().join(format!("document{i}.txt"));
        common::write_dummy_file(&file_path, 128);
        common::insert_untracked(db.conn(), file_path.to_str().unwrap()).await;
    }

    let remote = Arc::new(FakeRemoteStore::new());
    let mut config = EngineConfig::default_with_dir(dir.path().to_path_buf());
    // The fake store only matches on substring of the uploaded display name;
    // point the verifier at something every seeded file actually contains.
    config.verifier_canonical_query = "document".to_string();
    let orchestrator = Orchestrator::new(db.conn().clone(), remote.clone(), config.clone());

    let report = orchestrator.run_batch(50, 25, 8, false).await.unwrap();

    assert_eq!(report.indexed.len(), 50);
    assert!(report.failed.is_empty());
    assert_eq!(remote.store_doc_count(), 50);

    let verifier = Verifier::new(db.conn().clone(), remote, config);
    let report = verifier.run().await.unwrap();
    assert_eq!(report.exit_code(), 0, "{:#?}", report.assertions);
}

#[tokio::test]
async fn empty_batch_is_a_clean_noop() {
    let dir = tempfile::tempdir().unwrap();
    let db = Database::open(&dir.path().join("engine.sqlite3")).await.unwrap();
    let remote = Arc::new(FakeRemoteStore::new());
    let mut config = EngineConfig::default_with_dir(dir.path().to_path_buf());
    // No files were seeded, so no citations can possibly exist yet.
    config.verifier_min_citations = 0;
    let orchestrator = Orchestrator::new(db.conn().clone(), remote.clone(), config.clone());

    let report = orchestrator.run_batch(10, 5, 4, false).await.unwrap();
    assert!(report.indexed.is_empty());
    assert!(report.failed.is_empty());

    let verifier = Verifier::new(db.conn().clone(), remote, config);
    let report = verifier.run().await.unwrap();
    assert_eq!(report.exit_code(), 0);
}
