//! Crash-safe FSM engine that drives local files through an external
//! vector-index remote store: upload, import, poll, index — and, in
//! reverse, a write-ahead-logged reset back to untracked.
//!
//! Module layout mirrors the component list in the design: the durable
//! store and FSM definition at the bottom, the Transition Layer as the sole
//! writer on top of them, the Remote Client as an independent boundary, and
//! the Orchestrator / Recovery Crawler / Verifier composing all three.

pub mod config;
pub mod db;
pub mod domain;
pub mod error;
pub mod fsm;
pub mod orchestrator;
pub mod recovery;
pub mod remote;
pub mod transitions;
pub mod verifier;

pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
