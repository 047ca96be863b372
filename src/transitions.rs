//! Transition Layer (spec §4.2) — the sole authorized writer of the state
//! columns on `files`.
//!
//! Every method here is one legal transition from the FSM graph (spec §4.1).
//! Each issues exactly one OCC-guarded `UPDATE ... WHERE file_path = ? AND
//! version = ?` and returns as soon as it commits — no method here ever
//! opens a transaction that spans a remote call (spec §5). If
//! `rows_affected() == 0` the row's version no longer matches what the
//! caller expected, and `EngineError::OCCConflict` is raised so the caller
//! can re-read and decide whether to retry or abandon the file.
//!
//! This file contains every authorized write site for `fsm_state`: one per
//! transition method below, plus nothing else. A grep for `SET fsm_state`
//! outside this file is a policy violation (spec §6).

use crate::db::entities::{self, INTENT_KIND_RESET};
use crate::error::{EngineError, EngineResult};
use crate::fsm::{Event, FsmState};
use chrono::Utc;
use sea_orm::{DatabaseConnection, DbBackend, EntityTrait, Statement};

pub struct TransitionLayer {
    conn: DatabaseConnection,
}

impl TransitionLayer {
    pub fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Read-only helper: callers use this to capture `expected_version`
    /// before calling a transition. Not gated by the FSM — reads may race,
    /// only writes are OCC-guarded.
    pub async fn current(&self, file_path: &str) -> EngineResult<Option<entities::Model>> {
        entities::Entity::find_by_id(file_path.to_string())
            .one(&self.conn)
            .await
            .map_err(Into::into)
    }

    async fn require_current(&self, file_path: &str) -> EngineResult<entities::Model> {
        self.current(file_path).await?.ok_or_else(|| {
            EngineError::Db(sea_orm::DbErr::RecordNotFound(format!(
                "no file row for {file_path}"
            )))
        })
    }

    fn parse_state(model: &entities::Model) -> EngineResult<FsmState> {
        FsmState::from_str(&model.fsm_state).ok_or_else(|| {
            EngineError::Config(format!(
                "corrupt fsm_state column for {}: {:?}",
                model.file_path, model.fsm_state
            ))
        })
    }

    fn reject_if_intent_in_progress(model: &entities::Model) -> EngineResult<()> {
        if model.intent_kind.is_some() {
            return Err(EngineError::IntentInProgress {
                file_path: model.file_path.clone(),
            });
        }
        Ok(())
    }

    async fn exec(&self, sql: &str, values: Vec<sea_orm::Value>) -> EngineResult<u64> {
        let result = self
            .conn
            .execute(Statement::from_sql_and_values(DbBackend::Sqlite, sql, values))
            .await?;
        Ok(result.rows_affected())
    }

    fn validated_target(from: FsmState, event: Event) -> EngineResult<FsmState> {
        from.validate(event)
            .ok_or(EngineError::IllegalTransition { from, event })
    }

    // ---- UNTRACKED -> UPLOADING --------------------------------------

    pub async fn start_upload(&self, file_path: &str, expected_version: i64) -> EngineResult<i64> {
        let current = self.require_current(file_path).await?;
        Self::reject_if_intent_in_progress(&current)?;
        let from = Self::parse_state(&current)?;
        let to = Self::validated_target(from, Event::StartUpload)?;

        let new_version = expected_version + 1;
        let rows = self
            .exec(
                "UPDATE files SET fsm_state = ?, version = ?, fsm_updated_at = ? \
                 WHERE file_path = ? AND version = ?",
                vec![
                    to.as_str().into(),
                    new_version.into(),
                    Utc::now().into(),
                    file_path.into(),
                    expected_version.into(),
                ],
            )
            .await?;
        Self::check_occ(rows, file_path)?;
        Ok(new_version)
    }

    // ---- UPLOADING -> PROCESSING --------------------------------------

    pub async fn complete_upload(
        &self,
        file_path: &str,
        expected_version: i64,
        remote_raw_id: &str,
    ) -> EngineResult<i64> {
        let current = self.require_current(file_path).await?;
        let from = Self::parse_state(&current)?;
        let to = Self::validated_target(from, Event::CompleteUpload)?;

        let new_version = expected_version + 1;
        let rows = self
            .exec(
                "UPDATE files SET fsm_state = ?, remote_raw_id = ?, version = ?, fsm_updated_at = ? \
                 WHERE file_path = ? AND version = ?",
                vec![
                    to.as_str().into(),
                    remote_raw_id.into(),
                    new_version.into(),
                    Utc::now().into(),
                    file_path.into(),
                    expected_version.into(),
                ],
            )
            .await?;
        Self::check_occ(rows, file_path)?;
        Ok(new_version)
    }

    // ---- PROCESSING -> INDEXED ------------------------------------------

    pub async fn complete_processing(
        &self,
        file_path: &str,
        expected_version: i64,
        remote_store_doc_id: &str,
    ) -> EngineResult<i64> {
        let current = self.require_current(file_path).await?;
        let from = Self::parse_state(&current)?;
        let to = Self::validated_target(from, Event::CompleteProcessing)?;

        let new_version = expected_version + 1;
        let rows = self
            .exec(
                "UPDATE files SET fsm_state = ?, remote_store_doc_id = ?, version = ?, fsm_updated_at = ? \
                 WHERE file_path = ? AND version = ?",
                vec![
                    to.as_str().into(),
                    remote_store_doc_id.into(),
                    new_version.into(),
                    Utc::now().into(),
                    file_path.into(),
                    expected_version.into(),
                ],
            )
            .await?;
        Self::check_occ(rows, file_path)?;
        Ok(new_version)
    }

    // ---- UPLOADING / PROCESSING -> FAILED -------------------------------

    pub async fn fail_upload(
        &self,
        file_path: &str,
        expected_version: i64,
        reason: &str,
    ) -> EngineResult<i64> {
        self.fail_from(file_path, expected_version, reason, Event::FailUpload)
            .await
    }

    pub async fn fail_processing(
        &self,
        file_path: &str,
        expected_version: i64,
        reason: &str,
    ) -> EngineResult<i64> {
        self.fail_from(file_path, expected_version, reason, Event::FailProcessing)
            .await
    }

    async fn fail_from(
        &self,
        file_path: &str,
        expected_version: i64,
        reason: &str,
        event: Event,
    ) -> EngineResult<i64> {
        let current = self.require_current(file_path).await?;
        let from = Self::parse_state(&current)?;
        let to = Self::validated_target(from, event)?;

        let new_version = expected_version + 1;
        let rows = self
            .exec(
                "UPDATE files SET fsm_state = ?, failure_reason = ?, version = ?, fsm_updated_at = ? \
                 WHERE file_path = ? AND version = ?",
                vec![
                    to.as_str().into(),
                    reason.into(),
                    new_version.into(),
                    Utc::now().into(),
                    file_path.into(),
                    expected_version.into(),
                ],
            )
            .await?;
        Self::check_occ(rows, file_path)?;
        Ok(new_version)
    }

    // ---- Write-ahead intent protocol (spec §4.3) ------------------------

    /// Step 1 of reset: record intent, non-version-bumping, OCC-guarded on
    /// `state = INDEXED` and the caller's expected version.
    pub async fn write_reset_intent(&self, file_path: &str, expected_version: i64) -> EngineResult<()> {
        let current = self.require_current(file_path).await?;
        Self::reject_if_intent_in_progress(&current)?;
        let from = Self::parse_state(&current)?;
        // Reset is only ever written against INDEXED; validating the event
        // here also documents that intent-writing obeys the same graph.
        Self::validated_target(from, Event::Reset)?;

        let rows = self
            .exec(
                "UPDATE files SET intent_kind = ?, intent_started_at = ?, intent_steps_done = 0, fsm_updated_at = ? \
                 WHERE file_path = ? AND version = ? AND fsm_state = 'INDEXED' AND intent_kind IS NULL",
                vec![
                    INTENT_KIND_RESET.into(),
                    Utc::now().into(),
                    Utc::now().into(),
                    file_path.into(),
                    expected_version.into(),
                ],
            )
            .await?;
        Self::check_occ(rows, file_path)?;
        Ok(())
    }

    /// Advance the in-progress intent's step counter. Unversioned — the
    /// intent itself is the concurrency token while compensation runs.
    pub async fn bump_intent_progress(&self, file_path: &str, steps_done: i32) -> EngineResult<()> {
        let rows = self
            .exec(
                "UPDATE files SET intent_steps_done = ?, fsm_updated_at = ? \
                 WHERE file_path = ? AND intent_kind IS NOT NULL",
                vec![
                    steps_done.into(),
                    Utc::now().into(),
                    file_path.into(),
                ],
            )
            .await?;
        if rows == 0 {
            return Err(EngineError::Db(sea_orm::DbErr::RecordNotFound(format!(
                "no in-progress intent for {file_path}"
            ))));
        }
        Ok(())
    }

    /// Step 6 of reset: INDEXED -> UNTRACKED, clearing remote identifiers
    /// and the intent, bumping `version`. Returns `false` on OCC mismatch
    /// (rather than raising) because the Recovery Crawler needs to
    /// distinguish "lost the race" from an I/O error and keep going.
    pub async fn finalize_reset(&self, file_path: &str, expected_version: i64) -> EngineResult<bool> {
        let current = self.require_current(file_path).await?;
        let from = Self::parse_state(&current)?;
        let to = Self::validated_target(from, Event::Reset)?;

        let new_version = expected_version + 1;
        let rows = self
            .exec(
                "UPDATE files SET fsm_state = ?, remote_raw_id = NULL, remote_store_doc_id = NULL, \
                 intent_kind = NULL, intent_started_at = NULL, intent_steps_done = NULL, \
                 version = ?, fsm_updated_at = ? \
                 WHERE file_path = ? AND version = ?",
                vec![
                    to.as_str().into(),
                    new_version.into(),
                    Utc::now().into(),
                    file_path.into(),
                    expected_version.into(),
                ],
            )
            .await?;
        Ok(rows > 0)
    }

    /// INDEXED -> FAILED when reset compensation can't be completed.
    pub async fn fail_reset(
        &self,
        file_path: &str,
        expected_version: i64,
        reason: &str,
    ) -> EngineResult<i64> {
        let current = self.require_current(file_path).await?;
        let from = Self::parse_state(&current)?;
        let to = Self::validated_target(from, Event::FailReset)?;

        let new_version = expected_version + 1;
        let rows = self
            .exec(
                "UPDATE files SET fsm_state = ?, failure_reason = ?, \
                 intent_kind = NULL, intent_started_at = NULL, intent_steps_done = NULL, \
                 version = ?, fsm_updated_at = ? \
                 WHERE file_path = ? AND version = ?",
                vec![
                    to.as_str().into(),
                    reason.into(),
                    new_version.into(),
                    Utc::now().into(),
                    file_path.into(),
                    expected_version.into(),
                ],
            )
            .await?;
        Self::check_occ(rows, file_path)?;
        Ok(new_version)
    }

    // ---- FAILED -> UNTRACKED escape (spec §4.6, §6) ---------------------

    /// The single operator-invoked escape from FAILED. Clears all remote
    /// and intent fields so the file re-enters the normal upload flow clean.
    pub async fn retry(&self, file_path: &str, expected_version: i64) -> EngineResult<i64> {
        let current = self.require_current(file_path).await?;
        let from = Self::parse_state(&current)?;
        let to = Self::validated_target(from, Event::Retry)?;

        let new_version = expected_version + 1;
        let rows = self
            .exec(
                "UPDATE files SET fsm_state = ?, remote_raw_id = NULL, remote_store_doc_id = NULL, \
                 intent_kind = NULL, intent_started_at = NULL, intent_steps_done = NULL, \
                 failure_reason = NULL, version = ?, fsm_updated_at = ? \
                 WHERE file_path = ? AND version = ?",
                vec![
                    to.as_str().into(),
                    new_version.into(),
                    Utc::now().into(),
                    file_path.into(),
                    expected_version.into(),
                ],
            )
            .await?;
        Self::check_occ(rows, file_path)?;
        Ok(new_version)
    }

    fn check_occ(rows_affected: u64, file_path: &str) -> EngineResult<()> {
        if rows_affected == 0 {
            return Err(EngineError::OCCConflict {
                file_path: file_path.to_string(),
            });
        }
        Ok(())
    }
}
