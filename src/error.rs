//! Error taxonomy for the file lifecycle engine.
//!
//! Every error a caller can observe is one of the variants below; nothing in
//! this crate uses `panic!`/`unwrap()` for control flow over fallible,
//! externally-triggerable conditions.

use crate::fsm::{Event, FsmState};
use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    /// A transition was attempted that is not present in the FSM graph.
    /// Always a programming error in the caller; never caused by remote or
    /// database state.
    #[error("illegal transition: {event:?} is not valid from state {from:?}")]
    IllegalTransition { from: FsmState, event: Event },

    /// The OCC-guarded UPDATE affected zero rows: another writer changed
    /// `version` first. The caller must re-read state before deciding
    /// whether to retry.
    #[error("optimistic concurrency conflict for {file_path}")]
    OCCConflict { file_path: String },

    /// A retryable remote failure (429/5xx) after backoff was exhausted.
    #[error("remote store transient failure: {0}")]
    RemoteTransient(String),

    /// A non-retryable remote failure. The caller should transition the
    /// file to FAILED with this as the reason.
    #[error("remote store fatal failure: {0}")]
    RemoteFatal(String),

    /// Propagated by read RPCs (`get_store_doc`) when the remote resource
    /// does not exist. Idempotent-delete wrappers normalize this to success
    /// instead of propagating it.
    #[error("remote resource not found: {0}")]
    RemoteNotFound(String),

    /// A transition was requested on a row whose `intent_kind` is non-null.
    /// The caller must run recovery first.
    #[error("file {file_path} has an intent in progress, run recovery first")]
    IntentInProgress { file_path: String },

    #[error("database error: {0}")]
    Db(#[from] sea_orm::DbErr),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl EngineError {
    pub fn is_occ_conflict(&self) -> bool {
        matches!(self, Self::OCCConflict { .. })
    }

    pub fn short_reason(&self) -> String {
        match self {
            Self::RemoteFatal(msg) | Self::RemoteTransient(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}
