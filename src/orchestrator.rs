//! Lifecycle Orchestrator (spec §4.3, §4.4): drives batches of files
//! concurrently through the FSM, running the reset-then-upload flow for
//! files already indexed and surfacing per-file failures without aborting
//! the batch.
//!
//! Concurrency fans out with a `tokio::sync::Semaphore` in the
//! `stream::iter(...).map(...).buffer_unordered(n)` shape used for bounded
//! concurrent fetches elsewhere in the corpus — one permit per in-flight
//! file, no shared mutable state beyond the DB.

use crate::config::EngineConfig;
use crate::db::entities;
use crate::error::{EngineError, EngineResult};
use crate::fsm::FsmState;
use crate::remote::{delete_raw_idempotent, delete_store_doc_idempotent, retry_remote_call, sanitize_display_name, RemoteStore};
use crate::transitions::TransitionLayer;
use futures::stream::{self, StreamExt};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// One file's outcome within a batch.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Indexed { file_path: String, remote_store_doc_id: String },
    Failed { file_path: String, reason: String },
    SkippedOccConflict { file_path: String },
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub indexed: Vec<String>,
    pub failed: Vec<(String, String)>,
    pub occ_conflicts: Vec<String>,
}

impl BatchReport {
    fn absorb(&mut self, outcome: FileOutcome) {
        match outcome {
            FileOutcome::Indexed { file_path, .. } => self.indexed.push(file_path),
            FileOutcome::Failed { file_path, reason } => self.failed.push((file_path, reason)),
            FileOutcome::SkippedOccConflict { file_path } => self.occ_conflicts.push(file_path),
        }
    }
}

pub struct Orchestrator {
    conn: DatabaseConnection,
    transitions: TransitionLayer,
    remote: Arc<dyn RemoteStore>,
    config: EngineConfig,
}

impl Orchestrator {
    pub fn new(conn: DatabaseConnection, remote: Arc<dyn RemoteStore>, config: EngineConfig) -> Self {
        let transitions = TransitionLayer::new(conn.clone());
        Self { conn, transitions, remote, config }
    }

    /// Candidate rows for a batch: UNTRACKED always, plus INDEXED when
    /// `reset_existing` is requested (spec §4.4 step 1).
    pub async fn select_candidates(&self, limit: u64, reset_existing: bool) -> EngineResult<Vec<entities::Model>> {
        let mut query = entities::Entity::find();
        query = if reset_existing {
            query.filter(
                entities::Column::FsmState
                    .eq(FsmState::Untracked.as_str())
                    .or(entities::Column::FsmState.eq(FsmState::Indexed.as_str())),
            )
        } else {
            query.filter(entities::Column::FsmState.eq(FsmState::Untracked.as_str()))
        };
        query
            .order_by_asc(entities::Column::FilePath)
            .limit(limit)
            .all(&self.conn)
            .await
            .map_err(Into::into)
    }

    /// Run one full batch: select candidates, process them with bounded
    /// concurrency, then run a single retry pass over files that ended
    /// FAILED during this same run (spec §4.4 "Retry pass within a batch").
    pub async fn run_batch(
        &self,
        limit: u64,
        batch_size: usize,
        concurrency: usize,
        reset_existing: bool,
    ) -> EngineResult<BatchReport> {
        let candidates = self.select_candidates(limit, reset_existing).await?;
        info!(count = candidates.len(), reset_existing, "batch candidates selected");

        let mut report = BatchReport::default();
        for chunk in candidates.chunks(batch_size.max(1)) {
            let paths: Vec<String> = chunk.iter().map(|m| m.file_path.clone()).collect();
            let outcomes = self.process_many(&paths, concurrency, reset_existing).await;
            for outcome in outcomes {
                report.absorb(outcome);
            }
        }

        if !report.failed.is_empty() {
            let retry_paths: Vec<String> = report.failed.iter().map(|(p, _)| p.clone()).collect();
            info!(count = retry_paths.len(), "retrying files that failed this batch");
            for file_path in &retry_paths {
                // A stale version captured at batch start would fail OCC; a
                // fresh read before retry is mandatory (spec §4.4).
                if let Err(e) = self.retry_one_for_requeue(file_path).await {
                    warn!(%file_path, error = %e, "could not requeue failed file for retry");
                }
            }
            let outcomes = self.process_many(&retry_paths, concurrency, false).await;
            report.failed.clear();
            for outcome in outcomes {
                report.absorb(outcome);
            }
        }

        Ok(report)
    }

    async fn retry_one_for_requeue(&self, file_path: &str) -> EngineResult<()> {
        let current = self
            .transitions
            .current(file_path)
            .await?
            .ok_or_else(|| EngineError::Db(sea_orm::DbErr::RecordNotFound(file_path.to_string())))?;
        if current.fsm_state == FsmState::Failed.as_str() {
            self.transitions.retry(file_path, current.version).await?;
        }
        Ok(())
    }

    async fn process_many(&self, file_paths: &[String], concurrency: usize, reset_existing: bool) -> Vec<FileOutcome> {
        let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
        stream::iter(file_paths.iter().cloned())
            .map(|file_path| {
                let permit = semaphore.clone();
                async move {
                    let _permit = permit.acquire().await.expect("semaphore never closed");
                    self.process_one(&file_path, reset_existing).await
                }
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await
    }

    /// The full per-file flow: reset-then-upload for already-indexed files,
    /// then the normal upload flow (spec §4.3, §4.4).
    async fn process_one(&self, file_path: &str, reset_existing: bool) -> FileOutcome {
        match self.process_one_inner(file_path, reset_existing).await {
            Ok(remote_store_doc_id) => FileOutcome::Indexed {
                file_path: file_path.to_string(),
                remote_store_doc_id,
            },
            Err(EngineError::OCCConflict { file_path }) => {
                warn!(%file_path, "occ conflict, skipping for this batch");
                FileOutcome::SkippedOccConflict { file_path }
            }
            Err(e) => FileOutcome::Failed {
                file_path: file_path.to_string(),
                reason: e.short_reason(),
            },
        }
    }

    async fn process_one_inner(&self, file_path: &str, reset_existing: bool) -> EngineResult<String> {
        let mut current = self
            .transitions
            .current(file_path)
            .await?
            .ok_or_else(|| EngineError::Db(sea_orm::DbErr::RecordNotFound(file_path.to_string())))?;

        if reset_existing && current.fsm_state == FsmState::Indexed.as_str() {
            self.run_reset_flow(file_path, &current).await?;
            current = self
                .transitions
                .current(file_path)
                .await?
                .ok_or_else(|| EngineError::Db(sea_orm::DbErr::RecordNotFound(file_path.to_string())))?;
        }

        self.run_upload_flow(file_path, current.version).await
    }

    /// Reset-then-upload flow for an already-indexed file (spec §4.3): the
    /// write-ahead intent protocol, run to completion before the normal
    /// upload flow begins. Crash-recovery for interrupted runs of this same
    /// sequence is the Recovery Crawler's job, not the orchestrator's.
    async fn run_reset_flow(&self, file_path: &str, current: &entities::Model) -> EngineResult<()> {
        self.transitions.write_reset_intent(file_path, current.version).await?;

        let store_doc_id = current
            .remote_store_doc_id
            .clone()
            .ok_or_else(|| EngineError::Db(sea_orm::DbErr::Custom(format!(
                "invariant violation: {file_path} is INDEXED with no remote_store_doc_id"
            ))))?;
        let raw_id = current.remote_raw_id.clone();

        // Store-document deleted first (spec §4.3: "prevents the permanent,
        // searchable artifact from surviving the transient one").
        retry_remote_call("delete_store_doc", || {
            delete_store_doc_idempotent(self.remote.as_ref(), &store_doc_id)
        })
        .await?;
        self.transitions.bump_intent_progress(file_path, 1).await?;

        if let Some(raw_id) = raw_id {
            retry_remote_call("delete_raw", || delete_raw_idempotent(self.remote.as_ref(), &raw_id)).await?;
        }
        self.transitions.bump_intent_progress(file_path, 2).await?;

        let finalized = self.transitions.finalize_reset(file_path, current.version).await?;
        if !finalized {
            return Err(EngineError::OCCConflict { file_path: file_path.to_string() });
        }
        Ok(())
    }

    /// Normal upload flow (spec §4.4 steps 2-7). `expected_version` is the
    /// version captured immediately before `start_upload`.
    async fn run_upload_flow(&self, file_path: &str, expected_version: i64) -> EngineResult<String> {
        let version = match self.transitions.start_upload(file_path, expected_version).await {
            Ok(v) => v,
            Err(e) => return Err(e),
        };

        let upload_result = self.upload_and_import(file_path).await;
        let (raw_id, handle) = match upload_result {
            Ok(pair) => pair,
            Err(e) => {
                self.transitions
                    .fail_upload(file_path, version, &e.short_reason())
                    .await?;
                return Err(e);
            }
        };

        let version = self
            .transitions
            .complete_upload(file_path, version, &raw_id)
            .await?;

        match self.poll_until_done(file_path, &raw_id, &handle).await {
            Ok(store_doc_id) => {
                self.transitions
                    .complete_processing(file_path, version, &store_doc_id)
                    .await?;
                Ok(store_doc_id)
            }
            Err(e) => {
                self.transitions
                    .fail_processing(file_path, version, &e.short_reason())
                    .await?;
                Err(e)
            }
        }
    }

    async fn upload_and_import(
        &self,
        file_path: &str,
    ) -> EngineResult<(String, crate::remote::OperationHandle)> {
        let bytes = tokio::fs::read(file_path).await?;
        let display_name = sanitize_display_name(
            Path::new(file_path)
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or(file_path),
        );

        let uploaded = retry_remote_call("upload_raw", || {
            let bytes = bytes.clone();
            let display_name = display_name.clone();
            async move { self.remote.upload_raw(&display_name, bytes).await }
        })
        .await?;
        debug!(%file_path, remote_raw_id = %uploaded.id, "uploaded raw file");

        let handle = retry_remote_call("import_to_store", || {
            let id = uploaded.id.clone();
            async move { self.remote.import_to_store(&id).await }
        })
        .await?;

        Ok((uploaded.id, handle))
    }

    /// Poll the import operation until done or the hard deadline elapses
    /// (spec §4.4 step 6, §5 cancellation/timeouts). Past the soft deadline
    /// the primary strategy is supplemented with a store-listing fallback
    /// in case the operation completed without the poll observing it.
    async fn poll_until_done(
        &self,
        file_path: &str,
        raw_id: &str,
        handle: &crate::remote::OperationHandle,
    ) -> EngineResult<String> {
        let started = Instant::now();
        let soft = self.config.poll_soft_deadline();
        let hard = self.config.poll_hard_deadline();

        loop {
            let poll = self.remote.poll_operation(handle).await?;
            if poll.done {
                return self.extract_store_doc_id(file_path, raw_id, poll.response).await;
            }

            if started.elapsed() >= hard {
                error!(%file_path, "processing timeout");
                return Err(EngineError::RemoteFatal("processing timeout".to_string()));
            }

            if started.elapsed() >= soft {
                if let Some(doc) = crate::remote::find_store_doc_for_raw(self.remote.as_ref(), raw_id).await? {
                    warn!(%file_path, "poll never reported done, found store doc via listing fallback");
                    return Ok(doc.name);
                }
            }

            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
    }

    /// Spec §4.4 step 6 / §9 Open Question: prefer the typed completion
    /// field; fall back to the raw payload if it is unexpectedly absent.
    async fn extract_store_doc_id(
        &self,
        file_path: &str,
        raw_id: &str,
        response: Option<crate::remote::OperationResponse>,
    ) -> EngineResult<String> {
        if let Some(resp) = response {
            if let Some(id) = resp.store_doc_id {
                debug!(%file_path, source = "typed_response", "store doc id extracted");
                return Ok(id);
            }
            if let Some(id) = resp.raw.get("store_doc_id").and_then(|v| v.as_str()) {
                warn!(%file_path, source = "raw_payload_fallback", "typed completion field absent, used raw payload");
                return Ok(id.to_string());
            }
        }

        // Neither path surfaced an id; last resort is exact-match listing.
        crate::remote::find_store_doc_for_raw(self.remote.as_ref(), raw_id)
            .await?
            .map(|d| d.name)
            .ok_or_else(|| EngineError::RemoteFatal(format!("operation completed for {raw_id} but no store doc could be found")))
    }
}
