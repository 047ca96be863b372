//! The `files` entity (spec §3).
//!
//! This is the only table the engine writes to. `fsm_state` is stored as
//! plain text, never a library-internal serialization — [`crate::fsm::FsmState`]
//! only touches this column via `as_str`/`from_str`.

use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "files")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub file_path: String,

    /// Content digest, owned by the enrichment component's idempotence
    /// check — never read by any FSM decision in this engine.
    pub content_hash: Option<String>,

    pub fsm_state: String,

    /// OCC token. Every finalize increments this; `write_reset_intent` and
    /// `bump_intent_progress` do not.
    pub version: i64,

    pub remote_raw_id: Option<String>,
    pub remote_store_doc_id: Option<String>,

    pub intent_kind: Option<String>,
    pub intent_started_at: Option<DateTime<Utc>>,
    pub intent_steps_done: Option<i32>,

    pub failure_reason: Option<String>,

    pub fsm_updated_at: DateTime<Utc>,

    /// Sacred: owned exclusively by the external AI-metadata extractor.
    /// No transition method in this engine may write, reset, or delete
    /// this column.
    pub ai_metadata: Option<Vec<u8>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}

/// Well-known value of `intent_kind`. Currently RESET is the only kind of
/// write-ahead intent the engine records (spec §4.3); the column is a plain
/// string rather than an enum so a future intent kind is a data migration,
/// not a schema migration.
pub const INTENT_KIND_RESET: &str = "RESET";

/// Placeholder side table for externally-owned file tags (spec §3
/// [EXPANDED]). Present in the schema so the invariant "only the external
/// enrichment component owns this data" is visible structurally, not just in
/// a comment. No transition method, orchestrator step, or migration in this
/// engine writes to it.
pub mod file_tags {
    use sea_orm::entity::prelude::*;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, serde::Serialize, serde::Deserialize)]
    #[sea_orm(table_name = "file_tags")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub file_path: String,
        #[sea_orm(primary_key, auto_increment = false)]
        pub tag: String,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}
