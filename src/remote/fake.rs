//! Deterministic in-memory [`RemoteStore`] double. No network mocking
//! library is needed because the remote store is already abstracted as a
//! trait at the Remote Client boundary (spec §2 [EXPANDED]) — this mirrors
//! how the teacher crate's job system is tested against in-memory fakes
//! rather than live daemons. Exposed outside `#[cfg(test)]` so the
//! integration tests under `tests/` (a separate crate) can use it too.

use super::{
    Citation, OperationHandle, OperationResponse, PollResult, RemoteStore, StoreDoc,
    StoreDocSummary, UploadedRaw,
};
use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

struct RawFile {
    display_name: String,
    bytes_len: usize,
}

struct StoreDocEntry {
    display_name: String,
}

struct State {
    raw_files: HashMap<String, RawFile>,
    store_docs: HashMap<String, StoreDocEntry>,
    operations: HashMap<String, String>,
    next_id: u64,
}

/// In-memory stand-in for the remote vector-index store. Every document's
/// `name` is `<raw_id>:doc-<n>`, matching the production identity contract
/// used by [`super::find_store_doc_for_raw`].
pub struct FakeRemoteStore {
    state: Mutex<State>,
}

impl Default for FakeRemoteStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeRemoteStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                raw_files: HashMap::new(),
                store_docs: HashMap::new(),
                operations: HashMap::new(),
                next_id: 0,
            }),
        }
    }

    fn next_id(state: &mut State) -> u64 {
        state.next_id += 1;
        state.next_id
    }

    pub fn store_doc_count(&self) -> usize {
        self.state.lock().unwrap().store_docs.len()
    }

    pub fn raw_file_count(&self) -> usize {
        self.state.lock().unwrap().raw_files.len()
    }

    /// Test-only hook simulating out-of-band remote deletion (e.g. an
    /// operator manually removed the document, or a prior crashed run's
    /// `delete_store_doc` already succeeded remotely before the local
    /// intent was recorded as complete) — used to construct spec §8
    /// scenario 2 (crash recovery against an already-deleted remote doc).
    pub fn simulate_out_of_band_store_doc_deletion(&self, name: &str) {
        self.state.lock().unwrap().store_docs.remove(name);
    }
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn upload_raw(&self, display_name: &str, bytes: Vec<u8>) -> EngineResult<UploadedRaw> {
        let mut state = self.state.lock().unwrap();
        let id = format!("raw-{}", Self::next_id(&mut state));
        state.raw_files.insert(
            id.clone(),
            RawFile {
                display_name: display_name.to_string(),
                bytes_len: bytes.len(),
            },
        );
        Ok(UploadedRaw {
            uri: format!("fake://raw/{id}"),
            id,
        })
    }

    async fn import_to_store(&self, raw_id: &str) -> EngineResult<OperationHandle> {
        let mut state = self.state.lock().unwrap();
        if !state.raw_files.contains_key(raw_id) {
            return Err(EngineError::RemoteNotFound(format!("raw file {raw_id}")));
        }
        let op_id = format!("op-{}", Self::next_id(&mut state));
        state.operations.insert(op_id.clone(), raw_id.to_string());
        Ok(OperationHandle(op_id))
    }

    async fn poll_operation(&self, handle: &OperationHandle) -> EngineResult<PollResult> {
        let mut state = self.state.lock().unwrap();
        let raw_id = state
            .operations
            .get(&handle.0)
            .cloned()
            .ok_or_else(|| EngineError::RemoteNotFound(format!("operation {}", handle.0)))?;
        let display_name = state
            .raw_files
            .get(&raw_id)
            .map(|r| r.display_name.clone())
            .unwrap_or_default();

        let doc_id = format!("{raw_id}:doc-{}", Self::next_id(&mut state));
        state.store_docs.insert(
            doc_id.clone(),
            StoreDocEntry {
                display_name: display_name.clone(),
            },
        );

        Ok(PollResult {
            done: true,
            response: Some(OperationResponse {
                store_doc_id: Some(doc_id.clone()),
                raw: serde_json::json!({ "store_doc_id": doc_id }),
            }),
        })
    }

    async fn list_store_docs(&self) -> EngineResult<Vec<StoreDocSummary>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .store_docs
            .iter()
            .map(|(name, entry)| StoreDocSummary {
                name: name.clone(),
                display_name: entry.display_name.clone(),
            })
            .collect())
    }

    async fn get_store_doc(&self, name: &str) -> EngineResult<StoreDoc> {
        let state = self.state.lock().unwrap();
        state
            .store_docs
            .get(name)
            .map(|entry| StoreDoc {
                name: name.to_string(),
                display_name: entry.display_name.clone(),
            })
            .ok_or_else(|| EngineError::RemoteNotFound(format!("store doc {name}")))
    }

    async fn delete_store_doc(&self, name: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.store_docs.remove(name).is_some() {
            Ok(())
        } else {
            Err(EngineError::RemoteNotFound(format!("store doc {name}")))
        }
    }

    async fn delete_raw(&self, id: &str) -> EngineResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.raw_files.remove(id).is_some() {
            Ok(())
        } else {
            Err(EngineError::RemoteNotFound(format!("raw file {id}")))
        }
    }

    async fn search(&self, query: &str, top_k: usize) -> EngineResult<Vec<Citation>> {
        let state = self.state.lock().unwrap();
        let query = query.to_lowercase();
        Ok(state
            .store_docs
            .iter()
            .filter(|(_, entry)| entry.display_name.to_lowercase().contains(&query))
            .take(top_k)
            .map(|(name, _)| Citation {
                store_doc_id: name.clone(),
            })
            .collect())
    }
}
