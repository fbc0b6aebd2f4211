//! Core organizing logic.
//!
//! This module contains:
//! - Sanitizer and PathSynthesizer: metadata to library layout
//! - CacheStore: append-only CSV record of processed files
//! - MoveExecutor: primary + sidecar relocation
//! - Orchestrator: the per-file rescue pipeline
//! - GroupingEngine: thematic reorganization of a category
//! - DiscoveryFilter and RunLock: run plumbing

pub mod cache;
pub mod discovery;
pub mod grouping;
pub mod lock;
pub mod mover;
pub mod orchestrator;
pub mod sanitize;
pub mod synthesizer;

// Re-export commonly used types
pub use cache::{CacheError, CacheStore, CACHE_HEADERS};
pub use discovery::DiscoveryFilter;
pub use grouping::GroupingEngine;
pub use lock::{LockError, RunLock};
pub use mover::{MoveError, MoveExecutor, MoveReport, MoveSet, PlannedMove};
pub use orchestrator::Orchestrator;
pub use sanitize::sanitize;
pub use synthesizer::{Destination, PathSynthesizer, SynthesisError};
