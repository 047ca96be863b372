//! Declarative FSM definition (spec §4.1).
//!
//! Validation only: this module contains no I/O and no callbacks that mutate
//! durable state. It exists so a proposed transition can be checked before
//! the Transition Layer issues its OCC-guarded `UPDATE`. Neither INDEXED nor
//! FAILED is terminal — both have outgoing edges (reset, fail_reset, retry) —
//! an earlier revision of this engine modeled them as terminal states and
//! that broke the reset edge; the exhaustive match below is what prevents a
//! repeat.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One of the five FSM states (spec §3, §4.1).
///
/// Persisted as a plain string via [`FsmState::as_str`] / [`FsmState::from_str`];
/// this pair is the only place the tagged union touches the persistence
/// boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FsmState {
    Untracked,
    Uploading,
    Processing,
    Indexed,
    Failed,
}

/// Events that drive transitions (spec §4.1 table, "Event" column).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    StartUpload,
    CompleteUpload,
    CompleteProcessing,
    FailUpload,
    FailProcessing,
    Reset,
    FailReset,
    Retry,
}

impl FsmState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Untracked => "UNTRACKED",
            Self::Uploading => "UPLOADING",
            Self::Processing => "PROCESSING",
            Self::Indexed => "INDEXED",
            Self::Failed => "FAILED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "UNTRACKED" => Some(Self::Untracked),
            "UPLOADING" => Some(Self::Uploading),
            "PROCESSING" => Some(Self::Processing),
            "INDEXED" => Some(Self::Indexed),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    /// Validate a proposed `(from, event)` pair against the legal transition
    /// table (spec §4.1) and return the resulting state. `None` means the
    /// event is illegal from this state — the caller raises
    /// [`crate::error::EngineError::IllegalTransition`].
    pub fn validate(self, event: Event) -> Option<FsmState> {
        use Event::*;
        use FsmState::*;
        match (self, event) {
            (Untracked, StartUpload) => Some(Uploading),
            (Uploading, CompleteUpload) => Some(Processing),
            (Processing, CompleteProcessing) => Some(Indexed),
            (Uploading, FailUpload) => Some(Failed),
            (Processing, FailProcessing) => Some(Failed),
            (Indexed, Reset) => Some(Untracked),
            (Indexed, FailReset) => Some(Failed),
            (Failed, Retry) => Some(Untracked),
            _ => None,
        }
    }
}

impl fmt::Display for FsmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
