//! Recovery Crawler (spec §4.6): runs once on engine startup and on
//! explicit request. Scans rows with a non-null intent and resumes or
//! completes the compensation sequence from the first incomplete step
//! (spec §4.3's crash-recovery table), then offers the separate
//! `retry_failed` command that moves FAILED rows back to UNTRACKED.

use crate::db::entities::{self, INTENT_KIND_RESET};
use crate::error::{EngineError, EngineResult};
use crate::fsm::FsmState;
use crate::remote::{delete_raw_idempotent, delete_store_doc_idempotent, retry_remote_call, RemoteStore};
use crate::transitions::TransitionLayer;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Default)]
pub struct RecoveryReport {
    pub resumed: Vec<String>,
    pub occ_conflicts: Vec<String>,
    pub skipped_unknown_intent: Vec<String>,
}

#[derive(Debug, Default)]
pub struct RetryFailedReport {
    pub requeued: Vec<String>,
}

pub struct RecoveryCrawler {
    conn: DatabaseConnection,
    transitions: TransitionLayer,
    remote: Arc<dyn RemoteStore>,
}

impl RecoveryCrawler {
    pub fn new(conn: DatabaseConnection, remote: Arc<dyn RemoteStore>) -> Self {
        let transitions = TransitionLayer::new(conn.clone());
        Self { conn, transitions, remote }
    }

    /// Single pass over every row with a non-null intent (spec §4.6 steps
    /// 1-4). Re-running this on an empty intent set is a no-op (spec §8).
    pub async fn run(&self) -> EngineResult<RecoveryReport> {
        let pending: Vec<entities::Model> = entities::Entity::find()
            .filter(entities::Column::IntentKind.is_not_null())
            .all(&self.conn)
            .await?;

        info!(count = pending.len(), "recovery crawler scanning in-progress intents");

        let mut report = RecoveryReport::default();
        for row in pending {
            match row.intent_kind.as_deref() {
                Some(INTENT_KIND_RESET) => match self.resume_reset(&row).await {
                    Ok(()) => report.resumed.push(row.file_path.clone()),
                    Err(EngineError::OCCConflict { file_path }) => {
                        warn!(%file_path, "occ conflict finalizing reset during recovery, leaving for next pass");
                        report.occ_conflicts.push(file_path);
                    }
                    Err(e) => {
                        warn!(file_path = %row.file_path, error = %e, "recovery step failed, will retry next pass");
                    }
                },
                other => {
                    warn!(file_path = %row.file_path, intent_kind = ?other, "unrecognized intent kind, skipping");
                    report.skipped_unknown_intent.push(row.file_path.clone());
                }
            }
        }
        Ok(report)
    }

    /// Resume a RESET intent from its first incomplete step (spec §4.3
    /// crash-recovery table):
    /// - steps_done=0: replay delete_store_doc, delete_raw, finalize.
    /// - steps_done=1: replay delete_raw, finalize.
    /// - steps_done=2: finalize only.
    async fn resume_reset(&self, row: &entities::Model) -> EngineResult<()> {
        let steps_done = row.intent_steps_done.unwrap_or(0);

        if steps_done < 1 {
            if let Some(store_doc_id) = &row.remote_store_doc_id {
                retry_remote_call("delete_store_doc", || {
                    delete_store_doc_idempotent(self.remote.as_ref(), store_doc_id)
                })
                .await?;
            }
            self.transitions.bump_intent_progress(&row.file_path, 1).await?;
        }

        if steps_done < 2 {
            if let Some(raw_id) = &row.remote_raw_id {
                retry_remote_call("delete_raw", || delete_raw_idempotent(self.remote.as_ref(), raw_id)).await?;
            }
            self.transitions.bump_intent_progress(&row.file_path, 2).await?;
        }

        // `row.version` was read before this pass started; another writer
        // may have advanced it, which is exactly the race `finalize_reset`
        // must detect rather than silently overwrite (spec §4.3).
        let finalized = self.transitions.finalize_reset(&row.file_path, row.version).await?;
        if !finalized {
            return Err(EngineError::OCCConflict { file_path: row.file_path.clone() });
        }
        Ok(())
    }

    /// `retry_failed` (spec §4.6 step 5, §6): move every FAILED row back to
    /// UNTRACKED so it re-enters the normal upload flow at the next batch.
    /// Never invoked automatically — silent auto-retry would mask
    /// permanent errors like expired credentials (spec §4.6).
    pub async fn retry_failed(&self) -> EngineResult<RetryFailedReport> {
        let failed: Vec<entities::Model> = entities::Entity::find()
            .filter(entities::Column::FsmState.eq(FsmState::Failed.as_str()))
            .all(&self.conn)
            .await?;

        let mut report = RetryFailedReport::default();
        for row in failed {
            match self.transitions.retry(&row.file_path, row.version).await {
                Ok(_) => report.requeued.push(row.file_path),
                Err(EngineError::OCCConflict { file_path }) => {
                    warn!(%file_path, "occ conflict retrying failed file, skipping this pass");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(report)
    }
}
