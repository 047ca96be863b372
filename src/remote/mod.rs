//! Remote Client (spec §4.5): a thin wrapper over the four opaque remote
//! store RPCs, with idempotent deletes, retry-with-backoff, and exact-match
//! correlation. The remote store itself is out of scope (spec §1) — this
//! module treats it as the [`RemoteStore`] trait so the rest of the engine
//! never depends on a concrete HTTP client.

mod correlate;
pub mod fake;
pub mod http;
mod rate_limit;
mod retry;

pub use correlate::find_store_doc_for_raw;
pub use rate_limit::RateLimiter;
pub use retry::retry_remote_call;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Result of `upload_raw` (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedRaw {
    pub id: String,
    pub uri: String,
}

/// Opaque handle returned by `import_to_store`; only the remote store
/// understands its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationHandle(pub String);

/// Result of `poll_operation` (spec §4.4 step 6, §9 Open Question).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollResult {
    pub done: bool,
    pub response: Option<OperationResponse>,
}

/// The typed completion payload, plus the raw JSON it was parsed from so a
/// caller can fall back to scraping `store_doc_id` out of the raw payload
/// when the typed field is unexpectedly absent (spec §4.4 step 6, §9).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OperationResponse {
    pub store_doc_id: Option<String>,
    #[serde(default)]
    pub raw: serde_json::Value,
}

/// Summary entry as returned by `list_store_docs` (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDocSummary {
    pub name: String,
    pub display_name: String,
}

/// Full document as returned by `get_store_doc` (spec §6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreDoc {
    pub name: String,
    pub display_name: String,
}

/// A single citation returned by a search query, used by verifier assertion
/// 6 (spec §4.7).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Citation {
    pub store_doc_id: String,
}

/// Which path produced a completed poll result — recorded per spec §9's
/// Open Question so callers can see which path actually fired in practice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionSource {
    TypedResponse,
    RawPayloadFallback,
}

/// The four opaque RPCs exposed by the remote vector-index store (spec §1,
/// §4.5, §6), plus the read operations the verifier needs. Abstracted as a
/// trait so the engine never hard-codes a transport; [`http::HttpRemoteStore`]
/// is the production implementation and [`fake::FakeRemoteStore`] is the
/// deterministic in-memory double used by tests.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn upload_raw(
        &self,
        display_name: &str,
        bytes: Vec<u8>,
    ) -> crate::error::EngineResult<UploadedRaw>;

    async fn import_to_store(&self, raw_id: &str) -> crate::error::EngineResult<OperationHandle>;

    async fn poll_operation(
        &self,
        handle: &OperationHandle,
    ) -> crate::error::EngineResult<PollResult>;

    async fn list_store_docs(&self) -> crate::error::EngineResult<Vec<StoreDocSummary>>;

    async fn get_store_doc(&self, name: &str) -> crate::error::EngineResult<StoreDoc>;

    /// Raw delete as the remote store defines it: `NotFound` propagates as
    /// [`crate::error::EngineError::RemoteNotFound`]. Callers needing the
    /// idempotent contract use [`delete_store_doc_idempotent`].
    async fn delete_store_doc(&self, name: &str) -> crate::error::EngineResult<()>;

    /// Raw delete; see [`delete_store_doc`] for the `NotFound` contract.
    async fn delete_raw(&self, id: &str) -> crate::error::EngineResult<()>;

    async fn search(&self, query: &str, top_k: usize) -> crate::error::EngineResult<Vec<Citation>>;
}

/// Idempotent-delete wrapper for `delete_store_doc` (spec §4.5): "not
/// found" is treated as success, since the desired end state — the
/// store-document being gone — already holds.
pub async fn delete_store_doc_idempotent(
    store: &dyn RemoteStore,
    name: &str,
) -> crate::error::EngineResult<()> {
    match store.delete_store_doc(name).await {
        Err(crate::error::EngineError::RemoteNotFound(_)) => Ok(()),
        other => other,
    }
}

/// Idempotent-delete wrapper for `delete_raw` (spec §4.5).
pub async fn delete_raw_idempotent(
    store: &dyn RemoteStore,
    id: &str,
) -> crate::error::EngineResult<()> {
    match store.delete_raw(id).await {
        Err(crate::error::EngineError::RemoteNotFound(_)) => Ok(()),
        other => other,
    }
}

/// Strip leading/trailing whitespace from a caller-supplied display name
/// before it is sent to `upload_raw` (spec §4.4 step 3: "display_name
/// sanitized"). The remote store echoes it back verbatim and never derives
/// it from the payload.
pub fn sanitize_display_name(raw: &str) -> String {
    raw.trim().to_string()
}
