//! Temporal Stability Verifier (spec §4.7): an out-of-process check that
//! reads the database, enumerates remote store documents, and asserts a
//! fixed set of bidirectional invariants. Every assertion is evaluated
//! independently — one failing never suppresses the others (spec §7).

use crate::config::EngineConfig;
use crate::db::entities;
use crate::error::EngineResult;
use crate::fsm::FsmState;
use crate::remote::RemoteStore;
use chrono::Utc;
use rand::seq::SliceRandom;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct AssertionResult {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Default)]
pub struct VerificationReport {
    pub assertions: Vec<AssertionResult>,
}

impl VerificationReport {
    pub fn all_passed(&self) -> bool {
        self.assertions.iter().all(|a| a.passed)
    }

    /// `0` all pass, `1` one or more failed (spec §4.7). `2` (configuration
    /// error) is signaled by an `Err` from [`Verifier::run`] instead, since
    /// it means the check couldn't execute at all.
    pub fn exit_code(&self) -> i32 {
        if self.all_passed() {
            0
        } else {
            1
        }
    }
}

pub struct Verifier {
    conn: DatabaseConnection,
    remote: Arc<dyn RemoteStore>,
    config: EngineConfig,
}

impl Verifier {
    pub fn new(conn: DatabaseConnection, remote: Arc<dyn RemoteStore>, config: EngineConfig) -> Self {
        Self { conn, remote, config }
    }

    pub async fn run(&self) -> EngineResult<VerificationReport> {
        let indexed: Vec<entities::Model> = entities::Entity::find()
            .filter(entities::Column::FsmState.eq(FsmState::Indexed.as_str()))
            .all(&self.conn)
            .await?;
        let store_docs = self.remote.list_store_docs().await?;

        let mut assertions = Vec::new();
        assertions.push(self.assert_count_invariant(&indexed, &store_docs));
        assertions.push(self.assert_no_ghosts(&indexed).await?);
        assertions.push(self.assert_no_orphans(&indexed, &store_docs));
        assertions.push(self.assert_no_stuck_transitions().await?);
        assertions.push(self.assert_search_returns_results().await?);
        assertions.push(self.assert_citation_resolution(&indexed).await?);
        assertions.push(self.assert_per_file_searchability(&indexed).await?);

        Ok(VerificationReport { assertions })
    }

    /// 1. `count(files where fsm_state=INDEXED)` equals `len(list_store_docs())`.
    fn assert_count_invariant(
        &self,
        indexed: &[entities::Model],
        store_docs: &[crate::remote::StoreDocSummary],
    ) -> AssertionResult {
        let passed = indexed.len() == store_docs.len();
        AssertionResult {
            name: "count_invariant",
            passed,
            detail: format!("db_indexed={} store_docs={}", indexed.len(), store_docs.len()),
        }
    }

    /// 2. DB -> Store (no ghosts): every INDEXED row's `remote_store_doc_id`
    /// resolves via `get_store_doc`.
    async fn assert_no_ghosts(&self, indexed: &[entities::Model]) -> EngineResult<AssertionResult> {
        let mut ghosts = Vec::new();
        for row in indexed {
            let Some(doc_id) = &row.remote_store_doc_id else {
                ghosts.push(row.file_path.clone());
                continue;
            };
            if self.remote.get_store_doc(doc_id).await.is_err() {
                ghosts.push(row.file_path.clone());
            }
        }
        Ok(AssertionResultExt::from_violations("db_to_store_no_ghosts", ghosts, "ghost"))
    }

    /// 3. Store -> DB (no orphans): every remote store document's
    /// identifier matches some `remote_store_doc_id` in the DB.
    fn assert_no_orphans(
        &self,
        indexed: &[entities::Model],
        store_docs: &[crate::remote::StoreDocSummary],
    ) -> AssertionResult {
        let known: HashSet<&str> = indexed
            .iter()
            .filter_map(|row| row.remote_store_doc_id.as_deref())
            .collect();
        let orphans: Vec<String> = store_docs
            .iter()
            .filter(|doc| !known.contains(doc.name.as_str()))
            .map(|doc| doc.name.clone())
            .collect();
        AssertionResultExt::from_violations("store_to_db_no_orphans", orphans, "orphan")
    }

    /// 4. No files remain in UPLOADING or PROCESSING older than the
    /// configured stuck-transition threshold.
    async fn assert_no_stuck_transitions(&self) -> EngineResult<AssertionResult> {
        let in_flight: Vec<entities::Model> = entities::Entity::find()
            .filter(
                entities::Column::FsmState
                    .eq(FsmState::Uploading.as_str())
                    .or(entities::Column::FsmState.eq(FsmState::Processing.as_str())),
            )
            .all(&self.conn)
            .await?;

        let threshold = self.config.stuck_transition_threshold();
        let now = Utc::now();
        let stuck: Vec<String> = in_flight
            .into_iter()
            .filter(|row| {
                now.signed_duration_since(row.fsm_updated_at)
                    .to_std()
                    .map(|age| age >= threshold)
                    .unwrap_or(false)
            })
            .map(|row| row.file_path)
            .collect();

        Ok(AssertionResultExt::from_violations("no_stuck_transitions", stuck, "stuck"))
    }

    /// 5. A canonical semantic query returns at least N citations.
    async fn assert_search_returns_results(&self) -> EngineResult<AssertionResult> {
        let citations = self
            .remote
            .search(&self.config.verifier_canonical_query, self.config.verifier_top_m)
            .await?;
        let passed = citations.len() >= self.config.verifier_min_citations;
        Ok(AssertionResult {
            name: "search_returns_results",
            passed,
            detail: format!(
                "query={:?} citations={} min_required={}",
                self.config.verifier_canonical_query,
                citations.len(),
                self.config.verifier_min_citations
            ),
        })
    }

    /// 6. Every citation returned by the canonical query resolves via
    /// exact-match against a `remote_store_doc_id` in the DB. No
    /// substring/LIKE matching (spec §4.7: "has historically created false
    /// positives").
    async fn assert_citation_resolution(&self, indexed: &[entities::Model]) -> EngineResult<AssertionResult> {
        let known: HashSet<&str> = indexed
            .iter()
            .filter_map(|row| row.remote_store_doc_id.as_deref())
            .collect();
        let citations = self
            .remote
            .search(&self.config.verifier_canonical_query, self.config.verifier_top_m)
            .await?;
        let unresolved: Vec<String> = citations
            .into_iter()
            .filter(|c| !known.contains(c.store_doc_id.as_str()))
            .map(|c| c.store_doc_id)
            .collect();
        Ok(AssertionResultExt::from_violations(
            "citation_resolution",
            unresolved,
            "unresolved_citation",
        ))
    }

    /// 7. For K randomly sampled INDEXED files, a targeted query built from
    /// the file's discriminating metadata returns the file in the top-M
    /// results. Categories in `searchability_tolerance.excluded_categories`
    /// are skipped entirely and declared in the detail string; remaining
    /// misses are allowed up to `tolerance_fraction` (spec §4.7, Open
    /// Question resolved per DESIGN.md).
    async fn assert_per_file_searchability(&self, indexed: &[entities::Model]) -> EngineResult<AssertionResult> {
        let tolerance = &self.config.searchability_tolerance;
        let eligible: Vec<&entities::Model> = indexed
            .iter()
            .filter(|row| !tolerance.excluded_categories.contains(&category_of(&row.file_path)))
            .collect();

        let mut rng = rand::thread_rng();
        let sample_size = self.config.verifier_sample_size.min(eligible.len());
        let sample: Vec<&entities::Model> = eligible
            .choose_multiple(&mut rng, sample_size)
            .copied()
            .collect();

        let mut misses = Vec::new();
        for row in sample.iter().copied() {
            let Some(doc_id) = &row.remote_store_doc_id else {
                misses.push(row.file_path.clone());
                continue;
            };
            let query = discriminating_query(&row.file_path);
            let citations = self.remote.search(&query, self.config.verifier_top_m).await?;
            if !citations.iter().any(|c| &c.store_doc_id == doc_id) {
                misses.push(row.file_path.clone());
            }
        }

        let sampled = sample.len();
        let miss_fraction = if sampled == 0 { 0.0 } else { misses.len() as f64 / sampled as f64 };
        let passed = miss_fraction <= tolerance.tolerance_fraction;

        Ok(AssertionResult {
            name: "per_file_searchability",
            passed,
            detail: format!(
                "sampled={sampled} misses={} tolerance_fraction={} excluded_categories={:?}",
                misses.len(),
                tolerance.tolerance_fraction,
                tolerance.excluded_categories
            ),
        })
    }
}

/// Coarse category extraction used only for the tolerance exclusion list:
/// the immediate parent directory name, matching how large numbered runs
/// (podcast episodes, office-hours recordings) are typically laid out on
/// disk one directory per series.
fn category_of(file_path: &str) -> String {
    Path::new(file_path)
        .parent()
        .and_then(|p| p.file_name())
        .and_then(|n| n.to_str())
        .unwrap_or("uncategorized")
        .to_string()
}

fn discriminating_query(file_path: &str) -> String {
    Path::new(file_path)
        .file_stem()
        .and_then(|n| n.to_str())
        .unwrap_or(file_path)
        .replace(['_', '-'], " ")
}

/// Small helper so the "collect violations, pass iff empty" shape isn't
/// repeated by hand in every assertion above.
struct AssertionResultExt;

impl AssertionResultExt {
    fn from_violations(name: &'static str, violations: Vec<String>, noun: &str) -> AssertionResult {
        let passed = violations.is_empty();
        let detail = if passed {
            format!("no {noun}s found")
        } else {
            format!("{} {noun}(s): {}", violations.len(), violations.join(", "))
        };
        AssertionResult { name, passed, detail }
    }
}
