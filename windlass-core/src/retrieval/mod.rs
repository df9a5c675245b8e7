//! Staged automatic retrieval
//!
//! Used when `autoRetrieve` runs with [`RetrievalStrategy::Staged`]: instead
//! of one long slack-gated raise, the chain comes in by raises sized to the
//! slack the boat has made, then in one final pull once the anchor is close.
//!
//! [`RetrievalStrategy::Staged`]: crate::config::RetrievalStrategy::Staged

pub mod manager;

pub use manager::{RetrievalEvent, RetrievalManager, RetrievalState};
