//! Exact-match correlation between a raw-file id and its derived
//! store-document (spec §4.5): "a store-document's synthetic identifier
//! encodes the raw-file identifier as a prefix followed by a server-assigned
//! suffix. Matching must use exact prefix extraction, never substring
//! containment."

use super::{RemoteStore, StoreDocSummary};
use crate::error::EngineResult;

/// Separator between the raw-file id prefix and the server-assigned suffix
/// in a store-document's `name`.
const ID_SEPARATOR: char = ':';

/// Split a store-document name into its raw-id prefix, if it has the
/// expected `<raw_id>:<suffix>` shape. Returns `None` for names that don't
/// carry a separator at all (malformed or unrelated documents), never a
/// false positive from substring containment.
fn raw_id_prefix(name: &str) -> Option<&str> {
    name.split_once(ID_SEPARATOR).map(|(prefix, _suffix)| prefix)
}

/// List all store-documents and return the one whose identifier's prefix
/// exactly equals `raw_id`. `list_store_docs` pagination is handled inside
/// the [`RemoteStore`] implementation, not here.
pub async fn find_store_doc_for_raw(
    store: &dyn RemoteStore,
    raw_id: &str,
) -> EngineResult<Option<StoreDocSummary>> {
    let docs = store.list_store_docs().await?;
    Ok(docs
        .into_iter()
        .find(|doc| raw_id_prefix(&doc.name) == Some(raw_id)))
}
