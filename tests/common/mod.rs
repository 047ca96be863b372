use chrono::Utc;
use filekeep_engine::db::entities;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::path::Path;

pub async fn insert_untracked(conn: &DatabaseConnection, file_path: &str) {
    let row = entities::ActiveModel {
        file_path: Set(file_path.to_string()),
        content_hash: Set(None),
        fsm_state: Set("UNTRACKED".to_string()),
        version: Set(0),
        remote_raw_id: Set(None),
        remote_store_doc_id: Set(None),
        intent_kind: Set(None),
        intent_started_at: Set(None),
        intent_steps_done: Set(None),
        failure_reason: Set(None),
        fsm_updated_at: Set(Utc::now()),
        ai_metadata: Set(None),
    };
    row.insert(conn).await.unwrap();
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_indexed(
    conn: &DatabaseConnection,
    file_path: &str,
    remote_raw_id: &str,
    remote_store_doc_id: &str,
    version: i64,
) {
    let row = entities::ActiveModel {
        file_path: Set(file_path.to_string()),
        content_hash: Set(None),
        fsm_state: Set("INDEXED".to_string()),
        version: Set(version),
        remote_raw_id: Set(Some(remote_raw_id.to_string())),
        remote_store_doc_id: Set(Some(remote_store_doc_id.to_string())),
        intent_kind: Set(None),
        intent_started_at: Set(None),
        intent_steps_done: Set(None),
        failure_reason: Set(None),
        fsm_updated_at: Set(Utc::now()),
        ai_metadata: Set(None),
    };
    row.insert(conn).await.unwrap();
}

#[allow(clippy::too_many_arguments)]
pub async fn insert_indexed_with_intent(
    conn: &DatabaseConnection,
    file_path: &str,
    remote_raw_id: &str,
    remote_store_doc_id: &str,
    version: i64,
    steps_done: i32,
) {
    let row = entities::ActiveModel {
        file_path: Set(file_path.to_string()),
        content_hash: Set(None),
        fsm_state: Set("INDEXED".to_string()),
        version: Set(version),
        remote_raw_id: Set(Some(remote_raw_id.to_string())),
        remote_store_doc_id: Set(Some(remote_store_doc_id.to_string())),
        intent_kind: Set(Some(entities::INTENT_KIND_RESET.to_string())),
        intent_started_at: Set(Some(Utc::now())),
        intent_steps_done: Set(Some(steps_done)),
        failure_reason: Set(None),
        fsm_updated_at: Set(Utc::now()),
        ai_metadata: Set(None),
    };
    row.insert(conn).await.unwrap();
}

/// Write `len` zero bytes at `path` so the orchestrator's `tokio::fs::read`
/// has something real to upload.
pub fn write_dummy_file(path: &Path, len: usize) {
    std::fs::write(path, vec![0u8; len]).unwrap();
}
